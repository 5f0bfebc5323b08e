//! Tracks the FPGA's ACK stream: the latest snapshot, and the elapsed
//! sync-wait time between a submit and the ACK that echoes it back.
//!
//! Mirrors the pending-request bookkeeping this codebase already uses for
//! matching timestamped replies to outstanding requests, adapted from a
//! single pending slot to a small map since BLIT frames can be in flight
//! several deep under loss or host jitter.

use std::collections::HashMap;
use std::time::Instant;

use crate::wire::AckSnapshot;

/// Emitted when an ACK advances `frame_echo` past a previously submitted
/// frame, for the health engine to record.
#[derive(Debug, Clone, Copy)]
pub struct FrameStat {
    pub sync_wait_ms: f64,
    pub vram_ready: bool,
}

#[derive(Debug)]
pub struct AckTracker {
    snapshot: AckSnapshot,
    captured_at: Instant,
    submit_times: HashMap<u32, Instant>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self {
            snapshot: AckSnapshot::default(),
            captured_at: Instant::now(),
            submit_times: HashMap::new(),
        }
    }

    pub fn snapshot(&self) -> AckSnapshot {
        self.snapshot
    }

    /// Host time the current snapshot was captured at; the raster solver
    /// projects forward from this instant.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Records the host time a frame was submitted, so a later ACK can
    /// compute its sync-wait.
    pub fn record_submit(&mut self, frame: u32, at: Instant) {
        self.submit_times.insert(frame, at);
    }

    /// Ingests one decoded ACK. Stale ACKs (frame_echo less than the one
    /// currently held) are discarded. Returns a [`FrameStat`] when
    /// frame_echo strictly advances past a submit we have a timestamp for.
    pub fn ingest(&mut self, ack: AckSnapshot, now: Instant) -> Option<FrameStat> {
        if ack.frame_echo < self.snapshot.frame_echo {
            log::trace!("discarding stale ack: frame_echo={} < current={}", ack.frame_echo, self.snapshot.frame_echo);
            return None;
        }

        let advanced = ack.frame_echo > self.snapshot.frame_echo;
        self.snapshot = ack;
        self.captured_at = now;

        if !advanced {
            return None;
        }

        let stat = self.submit_times.remove(&ack.frame_echo).map(|submitted_at| FrameStat {
            sync_wait_ms: now.saturating_duration_since(submitted_at).as_secs_f64() * 1000.0,
            vram_ready: ack.vram_ready != 0,
        });

        // Prune any submit timestamps the FPGA will never echo individually;
        // it only ever reports the latest accepted frame.
        self.submit_times.retain(|&frame, _| frame > ack.frame_echo);

        stat
    }
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}
