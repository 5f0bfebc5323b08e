//! Modeline and the raster/vsync solver.
//!
//! Projects the FPGA's scanline position forward from the last known ACK
//! snapshot and elapsed host time, so the host can decide where in the
//! next frame period the FPGA should latch an incoming BLIT.

use std::time::Instant;

use crate::wire::AckSnapshot;

/// Sentinel scanline returned by `calc_vsync` when no modeline is set.
pub const NO_MODELINE_VSYNC: u16 = 262;

/// Display timing. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modeline {
    pub pixel_clock: f64,
    pub h_active: u16,
    pub h_begin: u16,
    pub h_end: u16,
    pub h_total: u16,
    pub v_active: u16,
    pub v_begin: u16,
    pub v_end: u16,
    pub v_total: u16,
    pub interlaced: bool,
}

impl Modeline {
    /// Validates the invariants from the data model: totals dominate
    /// actives, and the pixel clock is positive.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pixel_clock <= 0.0 {
            return Err("pixel_clock must be > 0");
        }
        if self.h_total < self.h_active {
            return Err("h_total must be >= h_active");
        }
        if self.v_total < self.v_active {
            return Err("v_total must be >= v_active");
        }
        Ok(())
    }

    /// Frame period in nanoseconds: round(h_total * v_total * 1000 / pixel_clock).
    /// Interlaced fields halve the vertical line count per field, not the period.
    pub fn frame_period_ns(&self) -> u64 {
        let num = self.h_total as f64 * self.v_total as f64 * 1000.0;
        (num / self.pixel_clock).round() as u64
    }

    /// Line time in nanoseconds: frame_period_ns / v_total.
    pub fn line_time_ns(&self) -> f64 {
        self.frame_period_ns() as f64 / self.v_total as f64
    }
}

/// Projects the FPGA's raster position forward from a snapshot captured at
/// host time `t0`, and computes the signed offset and target vsync line
/// relative to that projection.
#[derive(Debug)]
pub struct RasterSolver {
    modeline: Option<Modeline>,
}

impl RasterSolver {
    pub fn new() -> Self {
        Self { modeline: None }
    }

    pub fn set_modeline(&mut self, modeline: Modeline) {
        self.modeline = Some(modeline);
    }

    pub fn modeline(&self) -> Option<&Modeline> {
        self.modeline.as_ref()
    }

    pub fn frame_time_ns(&self) -> u64 {
        self.modeline.as_ref().map(|m| m.frame_period_ns()).unwrap_or(0)
    }

    fn project(&self, modeline: &Modeline, snapshot: &AckSnapshot, t0: Instant, now: Instant) -> (f64, i64) {
        let line_time_ns = modeline.line_time_ns();
        let elapsed_ns = now.saturating_duration_since(t0).as_nanos() as f64;
        let advanced_lines = snapshot.vcount as f64 + elapsed_ns / line_time_ns;
        let projected_line = advanced_lines.rem_euclid(modeline.v_total as f64);
        let projected_frame = snapshot.frame as i64 + (advanced_lines / modeline.v_total as f64).floor() as i64;
        (projected_line, projected_frame)
    }

    /// Signed offset, in nanoseconds, between `submitted_frame` and the
    /// FPGA's projected raster position. Positive means the FPGA has not
    /// yet reached the submit point; negative means the host missed it.
    /// Returns 0 when no modeline is set.
    pub fn raster_offset_ns(&self, snapshot: &AckSnapshot, t0: Instant, now: Instant, submitted_frame: u32) -> i32 {
        let Some(modeline) = &self.modeline else {
            return 0;
        };
        let (projected_line, projected_frame) = self.project(modeline, snapshot, t0, now);
        let frame_period_ns = modeline.frame_period_ns() as f64;
        let line_time_ns = modeline.line_time_ns();

        let offset = (submitted_frame as i64 - projected_frame) as f64 * frame_period_ns
            + (0.0 - projected_line) * line_time_ns;
        offset.round() as i32
    }

    /// Chooses a target scanline in `[0, v_total)` such that the FPGA
    /// arrives there at least `margin_ns` after the host finishes
    /// transmitting. Returns [`NO_MODELINE_VSYNC`] when no modeline is set.
    pub fn calc_vsync(
        &self,
        snapshot: &AckSnapshot,
        t0: Instant,
        now: Instant,
        margin_ns: u64,
        emulation_ns: u64,
        stream_ns: u64,
    ) -> u16 {
        let Some(modeline) = &self.modeline else {
            return NO_MODELINE_VSYNC;
        };
        let (projected_line, _) = self.project(modeline, snapshot, t0, now);
        let line_time_ns = modeline.line_time_ns();

        let target_ns = projected_line * line_time_ns + emulation_ns as f64 + stream_ns as f64 + margin_ns as f64;
        // Ceil rather than truncate: the target line must be the first one
        // the FPGA reaches at or after target_ns, otherwise a fractional
        // line rounds down into still-too-early and undercuts margin_ns.
        let line = (target_ns / line_time_ns).ceil().rem_euclid(modeline.v_total as f64);
        line as u16
    }
}

impl Default for RasterSolver {
    fn default() -> Self {
        Self::new()
    }
}
