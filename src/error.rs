//! Crate-wide error type.
//!
//! Mirrors the three error kinds a caller at the C-ABI boundary would see as
//! a `-1` return or a null handle: transport failures from the OS, invalid
//! arguments, and operations attempted in the wrong connection state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroovyError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("invalid state: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, GroovyError>;
