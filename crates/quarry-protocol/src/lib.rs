//! Semantic dig-protocol messages and the transport seam.
//!
//! Packets here carry meaning, not framing: bit-level encoding and connection
//! management belong to the transport collaborator behind [`PacketSink`].

pub mod packets;

pub use packets::{CANCEL_FACE_NEUTRAL, DigPacket, DigStatus, PacketSink, TransportError};
