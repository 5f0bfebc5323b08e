//! The host-side connection to one FPGA: owns the data/command socket,
//! the compressor, the ACK tracker, the health engine, and the raster
//! solver. All operations are single-threaded and cooperative — see the
//! crate-level docs for the concurrency contract.

use std::time::{Duration, Instant};

use crate::ack_tracker::AckTracker;
use crate::compress::{CompressOutcome, CompressStats, Compressor};
use crate::error::{GroovyError, Result};
use crate::health::{HealthEngine, HealthSnapshot};
use crate::packetizer::{self, CONT_AUDIO, CONT_BLIT};
use crate::raster::{Modeline, RasterSolver};
use crate::transport;
use crate::wire::command::{encode_audio_header, encode_blit_header, encode_close, encode_init, encode_switchres, Lz4Mode};
use crate::wire::{AckSnapshot, CommandId};
use crate::{SoundChannels, SoundRate};

/// Combined FPGA status and health snapshot returned by `tick`, mirroring
/// the protocol's own combined status/health record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Status {
    pub ack: AckSnapshot,
    pub health: HealthSnapshot,
    pub compress: CompressStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Acked,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Open,
    Closed,
}

pub struct Connection {
    socket: std::net::UdpSocket,
    state: ConnState,
    mtu: u16,
    compressor: Compressor,
    ack_tracker: AckTracker,
    health: HealthEngine,
    raster: RasterSolver,
    last_submit_frame: Option<u32>,
    audio_seq: u32,
}

impl Connection {
    /// Resolves `host`, opens the data/command socket, and sends INIT.
    pub fn connect(host: &str, mtu: u16, rgb_mode: u8, sound_rate: SoundRate, sound_channels: SoundChannels, lz4_mode: Lz4Mode) -> Result<Self> {
        let addr = transport::resolve(host, transport::DATA_PORT)?;
        let socket = transport::connect_data_socket(addr)?;

        let init = encode_init(mtu, rgb_mode, sound_rate.as_byte(), sound_channels.as_byte(), lz4_mode);
        socket.send(&init)?;

        log::debug!("connected to {addr}, mtu={mtu}, lz4_mode={lz4_mode:?}");

        Ok(Self {
            socket,
            state: ConnState::Open,
            mtu,
            compressor: Compressor::new(lz4_mode),
            ack_tracker: AckTracker::new(),
            health: HealthEngine::new(),
            raster: RasterSolver::new(),
            last_submit_frame: None,
            audio_seq: 0,
        })
    }

    fn require_open(&self) -> Result<()> {
        match self.state {
            ConnState::Open => Ok(()),
            ConnState::Closed => Err(GroovyError::State("connection is closed".into())),
        }
    }

    /// Sends CLOSE and marks the connection closed. Safe to call more than
    /// once; subsequent calls are a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state == ConnState::Closed {
            return Ok(());
        }
        let result = self.socket.send(&encode_close());
        self.state = ConnState::Closed;
        log::debug!("disconnected");
        result.map(|_| ()).map_err(GroovyError::from)
    }

    /// Validates and applies a new modeline, transitioning the connection
    /// into timed operation.
    pub fn set_modeline(&mut self, modeline: Modeline) -> Result<()> {
        self.require_open()?;
        modeline.validate().map_err(|e| GroovyError::Argument(e.into()))?;

        self.socket.send(&encode_switchres(&modeline))?;
        self.health.set_frame_period_ns(modeline.frame_period_ns());
        self.raster.set_modeline(modeline);
        Ok(())
    }

    pub fn frame_time_ns(&self) -> u64 {
        self.raster.frame_time_ns()
    }

    /// Compresses, packetizes, and sends a BLIT frame. `sync_wait_ms` is
    /// the caller's own measurement of time spent waiting for this
    /// submission's vsync slot; it is accepted for API parity with the
    /// wire protocol but the health engine's own sync-wait sample is
    /// always derived from the ACK round trip (see the ack tracker).
    pub fn submit(&mut self, data: &[u8], frame: u32, field: u8, vsync_line: u16, sync_wait_ms: f64) -> Result<()> {
        self.require_open()?;
        if data.is_empty() {
            return Err(GroovyError::Argument("submit payload must not be empty".into()));
        }
        if let Some(last) = self.last_submit_frame {
            if frame <= last {
                return Err(GroovyError::Argument(format!(
                    "frame numbers must increase strictly: got {frame}, last was {last}"
                )));
            }
        }
        log::trace!("submit frame={frame} field={field} vsync_line={vsync_line} caller_sync_wait_ms={sync_wait_ms:.2}");

        let outcome = self.compressor.compress(data);
        let (lz4_size, body): (u32, &[u8]) = match &outcome {
            CompressOutcome::Compressed(bytes) => (bytes.len() as u32, bytes),
            CompressOutcome::Raw => (0, data),
        };

        let header = encode_blit_header(frame, vsync_line, lz4_size, field);
        self.send_chunked(CommandId::Blit.as_byte(), CONT_BLIT, &header, body)?;

        self.ack_tracker.record_submit(frame, Instant::now());
        self.last_submit_frame = Some(frame);
        Ok(())
    }

    pub fn submit_audio(&mut self, data: &[u8]) -> Result<()> {
        self.require_open()?;
        if data.is_empty() {
            return Err(GroovyError::Argument("submit_audio payload must not be empty".into()));
        }

        let header = encode_audio_header(data.len() as u32);
        self.send_chunked(CommandId::Audio.as_byte(), CONT_AUDIO, &header, data)?;
        self.audio_seq = self.audio_seq.wrapping_add(1);
        Ok(())
    }

    fn send_chunked(&self, command_id: u8, continuation_id: u8, header: &[u8], body: &[u8]) -> Result<()> {
        let mtu = self.mtu as usize;
        let cont_cap = mtu.saturating_sub(2);
        if cont_cap == 0 {
            return Err(GroovyError::Argument("mtu too small for continuation chunks".into()));
        }
        let remaining_after_first = body.len().saturating_sub(mtu.saturating_sub(1 + header.len()));
        let continuation_chunks = remaining_after_first.div_ceil(cont_cap);
        if continuation_chunks > u8::MAX as usize {
            return Err(GroovyError::Argument("payload too large for configured mtu".into()));
        }

        for packet in packetizer::chunk(command_id, continuation_id, header, body, mtu) {
            self.socket.send(&packet)?;
        }
        Ok(())
    }

    /// Drains any ACKs currently available without blocking, updates the
    /// ACK tracker and health engine, and returns the combined status.
    pub fn tick(&mut self) -> Result<Status> {
        self.require_open()?;
        self.drain_acks()?;
        Ok(Status {
            ack: self.ack_tracker.snapshot(),
            health: self.health.snapshot(),
            compress: self.compressor.stats(),
        })
    }

    fn drain_acks(&mut self) -> Result<()> {
        let mut buf = [0u8; 128];
        loop {
            match self.socket.recv(&mut buf) {
                Ok(n) => self.ingest_ack_bytes(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(()),
                Err(e) => return Err(GroovyError::Transport(e)),
            }
        }
    }

    fn ingest_ack_bytes(&mut self, data: &[u8]) {
        let Some(ack) = AckSnapshot::parse(data) else {
            log::trace!("dropping malformed ack ({} bytes)", data.len());
            return;
        };
        if let Some(stat) = self.ack_tracker.ingest(ack, Instant::now()) {
            self.health.record(stat.sync_wait_ms, stat.vram_ready);
        }
    }

    /// Blocks up to `timeout` for an ACK that advances frame_echo past the
    /// most recently submitted frame, using a single read-timeout-bounded
    /// recv as this connection's only suspension point.
    pub fn wait_sync(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        self.require_open()?;
        let target = self.last_submit_frame.unwrap_or(0);
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 128];

        // The socket is non-blocking everywhere else (tick/submit never
        // wait), but SO_RCVTIMEO has no effect while O_NONBLOCK is set, so
        // this suspension point needs blocking mode for the read timeout
        // below to actually govern the wait. Every exit path restores
        // non-blocking mode before returning.
        self.socket.set_nonblocking(false)?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.socket.set_nonblocking(true)?;
                return Ok(WaitOutcome::TimedOut);
            }
            self.socket.set_read_timeout(Some(remaining))?;

            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    self.ingest_ack_bytes(&buf[..n]);
                    if self.ack_tracker.snapshot().frame_echo >= target {
                        self.socket.set_nonblocking(true)?;
                        return Ok(WaitOutcome::Acked);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    self.socket.set_nonblocking(true)?;
                    return Ok(WaitOutcome::TimedOut);
                }
                Err(e) => {
                    self.socket.set_nonblocking(true)?;
                    return Err(GroovyError::Transport(e));
                }
            }
        }
    }

    pub fn raster_offset_ns(&self, submitted_frame: u32) -> i32 {
        self.raster.raster_offset_ns(
            &self.ack_tracker.snapshot(),
            self.ack_tracker.captured_at(),
            Instant::now(),
            submitted_frame,
        )
    }

    pub fn calc_vsync(&self, margin_ns: u64, emulation_ns: u64, stream_ns: u64) -> u16 {
        self.raster.calc_vsync(
            &self.ack_tracker.snapshot(),
            self.ack_tracker.captured_at(),
            Instant::now(),
            margin_ns,
            emulation_ns,
            stream_ns,
        )
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state == ConnState::Open {
            let _ = self.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    fn paired_connection() -> (Connection, UdpSocket) {
        let fpga = UdpSocket::bind("127.0.0.1:0").unwrap();
        fpga.set_nonblocking(true).unwrap();
        let fpga_addr = fpga.local_addr().unwrap();

        let data_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        data_socket.connect(fpga_addr).unwrap();
        data_socket.set_nonblocking(true).unwrap();

        let conn = Connection {
            socket: data_socket,
            state: ConnState::Open,
            mtu: 1472,
            compressor: Compressor::new(Lz4Mode::Off),
            ack_tracker: AckTracker::new(),
            health: HealthEngine::new(),
            raster: RasterSolver::new(),
            last_submit_frame: None,
            audio_seq: 0,
        };
        (conn, fpga)
    }

    fn ack_bytes(frame_echo: u32, vcount: u16, vram_ready: u8) -> [u8; crate::wire::ack::ACK_FRAME_SIZE] {
        AckSnapshot {
            frame: frame_echo,
            frame_echo,
            vcount,
            vram_ready,
            ..Default::default()
        }
        .to_bytes()
    }

    #[test]
    fn submit_rejects_empty_payload() {
        let (mut conn, _fpga) = paired_connection();
        let err = conn.submit(&[], 1, 0, 0, 0.0).unwrap_err();
        assert!(matches!(err, GroovyError::Argument(_)));
    }

    #[test]
    fn submit_rejects_non_increasing_frame() {
        let (mut conn, _fpga) = paired_connection();
        conn.submit(&[1, 2, 3], 2, 0, 0, 0.0).unwrap();
        let err = conn.submit(&[1, 2, 3], 2, 0, 0, 0.0).unwrap_err();
        assert!(matches!(err, GroovyError::Argument(_)));
    }

    #[test]
    fn tick_ingests_injected_ack_matches_scenario_2() {
        let (mut conn, fpga) = paired_connection();
        let our_addr = conn.socket.local_addr().unwrap();

        conn.submit(&vec![0u8; 307_200], 1, 0, 400, 2.1).unwrap();
        fpga.send_to(&ack_bytes(1, 150, 1), our_addr).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let status = conn.tick().unwrap();
        assert_eq!(status.ack.frame_echo, 1);
        assert_eq!(status.health.vram_ready_rate, 1.0);
    }

    #[test]
    fn operations_after_disconnect_return_state_error() {
        let (mut conn, _fpga) = paired_connection();
        conn.disconnect().unwrap();
        let err = conn.submit(&[1], 1, 0, 0, 0.0).unwrap_err();
        assert!(matches!(err, GroovyError::State(_)));
    }

    #[test]
    fn wait_sync_times_out_without_ack() {
        let (mut conn, _fpga) = paired_connection();
        let outcome = conn.wait_sync(Duration::from_millis(5)).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn wait_sync_returns_acked_once_frame_echo_advances() {
        let (mut conn, fpga) = paired_connection();
        let our_addr = conn.socket.local_addr().unwrap();

        conn.submit(&[1, 2, 3], 1, 0, 0, 0.0).unwrap();
        fpga.send_to(&ack_bytes(1, 10, 1), our_addr).unwrap();

        let outcome = conn.wait_sync(Duration::from_millis(200)).unwrap();
        assert_eq!(outcome, WaitOutcome::Acked);
    }

    #[test]
    fn raster_offset_and_vsync_are_sentinel_before_modeline() {
        let (conn, _fpga) = paired_connection();
        assert_eq!(conn.raster_offset_ns(1), 0);
        assert_eq!(conn.calc_vsync(0, 0, 0), crate::raster::NO_MODELINE_VSYNC);
    }
}
