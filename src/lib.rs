//! Host-side client for the MiSTer FPGA "Groovy" protocol.
//!
//! Streams video frames, audio, and display-mode commands to an FPGA over
//! UDP, and ingests the reverse stream of frame acknowledgements and
//! input-device telemetry, keeping a host-generated raster in phase with
//! the FPGA's scanout.
//!
//! The concurrency model is single-threaded and cooperative: every method
//! on [`Connection`] and [`InputHandle`] must be called from one thread (or
//! externally serialized), there are no background threads or timers, and
//! the only suspension point is [`Connection::wait_sync`]. All other
//! operations drain whatever is immediately available and return.

mod ack_tracker;
mod compress;
mod connection;
mod error;
mod health;
pub mod input;
mod packetizer;
mod raster;
mod transport;
pub mod wire;

pub use compress::CompressStats;
pub use connection::{Connection, Status, WaitOutcome};
pub use error::{GroovyError, Result};
pub use health::HealthSnapshot;
pub use input::InputHandle;
pub use raster::{Modeline, NO_MODELINE_VSYNC};
pub use wire::command::Lz4Mode;
pub use wire::AckSnapshot;

/// Sound sample rate selection for `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundRate {
    Off = 0,
    Hz22050 = 1,
    Hz44100 = 2,
    Hz48000 = 3,
}

impl SoundRate {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Sound channel count selection for `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundChannels {
    Off = 0,
    Mono = 1,
    Stereo = 2,
}

impl SoundChannels {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate major version, parsed from `CARGO_PKG_VERSION_MAJOR` at compile time.
pub const VERSION_MAJOR: u32 = parse_version_component(env!("CARGO_PKG_VERSION_MAJOR"));
/// Crate minor version, parsed from `CARGO_PKG_VERSION_MINOR` at compile time.
pub const VERSION_MINOR: u32 = parse_version_component(env!("CARGO_PKG_VERSION_MINOR"));
/// Crate patch version, parsed from `CARGO_PKG_VERSION_PATCH` at compile time.
pub const VERSION_PATCH: u32 = parse_version_component(env!("CARGO_PKG_VERSION_PATCH"));

const fn parse_version_component(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}
