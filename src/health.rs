//! Rolling health/statistics engine.
//!
//! Keeps a 128-entry ring of recent sync-wait samples and derives mean,
//! p95, a VRAM-ready rate, and a stall threshold from the modeline's
//! frame period. Writes happen only from `tick`/`submit`; everything else
//! is a read.

const RING_SIZE: usize = 128;
const DEFAULT_STALL_THRESHOLD_MS: f64 = 16.7;

#[derive(Debug, Clone, Copy)]
struct Sample {
    sync_wait_ms: f64,
    vram_ready: bool,
}

#[derive(Debug)]
pub struct HealthEngine {
    ring: [Sample; RING_SIZE],
    pos: usize,
    count: usize,
    frame_period_ns: Option<u64>,
    stalled: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSnapshot {
    pub avg_sync_wait_ms: f64,
    pub p95_sync_wait_ms: f64,
    pub vram_ready_rate: f64,
    pub stall_threshold_ms: f64,
    pub stalled: bool,
}

impl HealthEngine {
    pub fn new() -> Self {
        Self {
            ring: [Sample { sync_wait_ms: 0.0, vram_ready: false }; RING_SIZE],
            pos: 0,
            count: 0,
            frame_period_ns: None,
            stalled: false,
        }
    }

    pub fn set_frame_period_ns(&mut self, frame_period_ns: u64) {
        self.frame_period_ns = Some(frame_period_ns);
    }

    fn stall_threshold_ms(&self) -> f64 {
        match self.frame_period_ns {
            Some(ns) => 1.5 * (ns as f64 / 1_000_000.0),
            None => DEFAULT_STALL_THRESHOLD_MS,
        }
    }

    /// Records a new sync-wait sample, overwriting the oldest entry once
    /// the ring is full. Logs once on each stall state transition rather
    /// than on every sample.
    pub fn record(&mut self, sync_wait_ms: f64, vram_ready: bool) {
        self.ring[self.pos] = Sample { sync_wait_ms, vram_ready };
        self.pos = (self.pos + 1) % RING_SIZE;
        if self.count < RING_SIZE {
            self.count += 1;
        }

        let now_stalled = sync_wait_ms > self.stall_threshold_ms();
        if now_stalled != self.stalled {
            self.stalled = now_stalled;
            if now_stalled {
                log::warn!("connection stalled: sync_wait_ms={sync_wait_ms:.2} threshold_ms={:.2}", self.stall_threshold_ms());
            } else {
                log::debug!("connection recovered from stall");
            }
        }
    }

    fn valid_samples(&self) -> impl Iterator<Item = &Sample> {
        self.ring[..self.count].iter()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        if self.count == 0 {
            return HealthSnapshot {
                stall_threshold_ms: self.stall_threshold_ms(),
                ..Default::default()
            };
        }

        let n = self.count as f64;
        let sum: f64 = self.valid_samples().map(|s| s.sync_wait_ms).sum();
        let avg = sum / n;

        let mut sorted: Vec<f64> = self.valid_samples().map(|s| s.sync_wait_ms).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let p95_idx = ((0.95 * n).ceil() as usize).saturating_sub(1).min(sorted.len() - 1);
        let p95 = sorted[p95_idx];

        let ready_count = self.valid_samples().filter(|s| s.vram_ready).count() as f64;
        let vram_ready_rate = ready_count / n;

        HealthSnapshot {
            avg_sync_wait_ms: avg,
            p95_sync_wait_ms: p95,
            vram_ready_rate,
            stall_threshold_ms: self.stall_threshold_ms(),
            stalled: self.stalled,
        }
    }
}

impl Default for HealthEngine {
    fn default() -> Self {
        Self::new()
    }
}
