//! Wire codec for the Groovy protocol.
//!
//! Every multi-byte field on the wire is little-endian. Commands are
//! encoded by the host and sent to the FPGA; the ACK frame and input
//! packets are decoded from bytes the FPGA sends back. Decoding never
//! panics: a short or malformed packet yields `None` and is dropped by
//! the caller.

pub mod ack;
pub mod command;

pub use ack::AckSnapshot;
pub use command::{CommandId, Lz4Mode};
