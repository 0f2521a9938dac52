//! `radio-bridge` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup
//! and process exit codes. Packet decoding lives in [`crate::packet`] and
//! [`crate::classify`]; the ingest loop in [`crate::app`] is generic over the
//! radio and the transport so it can be tested with fakes.

pub mod app;
pub mod classify;
pub mod duration;
pub mod message;
pub mod packet;
pub mod pipe_address;
pub mod radio;
pub mod receiver;
pub mod transport;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use classify::{ErrorCode, FixedPoint, describe_error_code};
pub use message::{MessageKind, RadioMessage, Reading};
pub use packet::{PACKET_SIZE, PacketType, RawPacket, decode_bytes, decode_packet};
pub use pipe_address::PipeAddress;
pub use radio::{PaLevel, Radio, RadioError};
pub use receiver::{Receiver, ReceiverError, ReceiverState};
pub use transport::{Endpoint, Publisher, Transport, TransportError};
