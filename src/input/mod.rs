//! Input receiver: joystick and PS/2 packets from the FPGA's input
//! stream, deduplicated by `(frame, order)` so a reordered UDP datagram
//! never overwrites a newer one.

mod packet;

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

pub use packet::{JoyState, Ps2State, JOYSTICK_PACKET_SIZE, PS2_PACKET_SIZE};

use crate::error::{GroovyError, Result};

pub const INPUT_PORT: u16 = 32101;

pub const JOY_RIGHT: u16 = 0x1;
pub const JOY_LEFT: u16 = 0x2;
pub const JOY_DOWN: u16 = 0x4;
pub const JOY_UP: u16 = 0x8;
pub const JOY_B1: u16 = 0x10;
pub const JOY_B2: u16 = 0x20;
pub const JOY_B3: u16 = 0x40;
pub const JOY_B4: u16 = 0x80;
pub const JOY_B5: u16 = 0x100;
pub const JOY_B6: u16 = 0x200;
pub const JOY_B7: u16 = 0x400;
pub const JOY_B8: u16 = 0x800;
pub const JOY_B9: u16 = 0x1000;
pub const JOY_B10: u16 = 0x2000;

/// Returns the signed difference `b - a` for frame counters that wrap
/// modulo 2^32, positive when `b` is ahead of `a`.
fn frame_diff(a: u32, b: u32) -> i32 {
    b.wrapping_sub(a) as i32
}

/// Dedup key ordering: a new `(frame, order)` is accepted only if it
/// lexicographically exceeds the stored key, with frame wraparound
/// handled via signed difference.
fn is_newer(stored: (u32, u8), incoming: (u32, u8)) -> bool {
    let diff = frame_diff(stored.0, incoming.0);
    if diff != 0 {
        return diff > 0;
    }
    incoming.1 > stored.1
}

/// Owns the UDP socket bound to the input port and the latest joystick /
/// PS2 state, each with its own dedup key.
pub struct InputHandle {
    socket: UdpSocket,
    joy_key: (u32, u8),
    joy_state: JoyState,
    ps2_key: (u32, u8),
    ps2_state: Ps2State,
}

impl InputHandle {
    /// Binds a local UDP socket and sends a 1-byte hello to the FPGA's
    /// input port to request streaming.
    pub fn bind(host: &str) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_nonblocking(true)?;

        let target: SocketAddr = (host, INPUT_PORT)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| GroovyError::Argument(format!("could not resolve host: {host}")))?;
        socket.send_to(&[0u8], target)?;

        log::debug!("input handle bound, hello sent to {target}");

        Ok(Self {
            socket,
            joy_key: (0, 0),
            joy_state: JoyState::default(),
            ps2_key: (0, 0),
            ps2_state: Ps2State::default(),
        })
    }

    /// Drains pending datagrams without blocking. Returns `true` if at
    /// least one packet was consumed.
    pub fn poll(&mut self) -> bool {
        let mut consumed = false;
        let mut buf = [0u8; 512];

        loop {
            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    consumed = true;
                    self.ingest(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => {
                    log::trace!("input recv error: {e}");
                    break;
                }
            }
        }

        consumed
    }

    /// Dispatches strictly on exact packet length: a joystick packet is
    /// always 24 bytes and a PS2 packet always 48, so there is no
    /// ambiguity to resolve with a type byte. Anything else is noise.
    fn ingest(&mut self, data: &[u8]) {
        match data.len() {
            JOYSTICK_PACKET_SIZE => {
                if let Some(joy) = packet::JoyState::parse(data) {
                    if is_newer(self.joy_key, (joy.frame, joy.order)) {
                        self.joy_key = (joy.frame, joy.order);
                        self.joy_state = joy;
                    }
                }
            }
            PS2_PACKET_SIZE => {
                if let Some(ps2) = packet::Ps2State::parse(data) {
                    if is_newer(self.ps2_key, (ps2.frame, ps2.order)) {
                        self.ps2_key = (ps2.frame, ps2.order);
                        self.ps2_state = ps2;
                    }
                }
            }
            _ => log::trace!("dropping input packet of unexpected length {}", data.len()),
        }
    }

    pub fn joy(&self) -> JoyState {
        self.joy_state
    }

    pub fn ps2(&self) -> Ps2State {
        self.ps2_state
    }

    pub fn close(self) {
        log::debug!("input handle closed");
    }
}
