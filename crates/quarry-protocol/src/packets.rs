//! Dig packet model.
//!
//! One status-tagged packet covers the whole exchange: `Begin` opens a
//! session (and reopens it after a forced restart), `Cancel` closes it, and
//! `Finish` claims completion. `Finish` is resent every tick once progress
//! reaches 1 because the server's acknowledgement (the block turning to air)
//! is not guaranteed to arrive promptly.

use serde::{Deserialize, Serialize};

use quarry_core::{BlockFace, BlockPos};

// ---------------------------------------------------------------------------
// DigStatus
// ---------------------------------------------------------------------------

/// Wire status of a dig packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DigStatus {
    /// Start digging the target block.
    Begin = 0,
    /// Stop digging the target block.
    Cancel = 1,
    /// Claim the target block is fully excavated.
    Finish = 2,
}

// ---------------------------------------------------------------------------
// DigPacket
// ---------------------------------------------------------------------------

/// Neutral face value carried by a plain cancellation.
///
/// The server quirk: a cancel caused by an immediately-following dig request
/// on the same position instead carries the new request's face.
pub const CANCEL_FACE_NEUTRAL: u8 = 0;

/// A single message of the dig exchange.
///
/// `face` is the raw wire value so `Cancel` can carry the neutral 0 without
/// pretending it names a real [`BlockFace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigPacket {
    /// What this packet does.
    pub status: DigStatus,
    /// Target block position.
    pub position: BlockPos,
    /// Targeted face, as a wire value.
    pub face: u8,
}

impl DigPacket {
    /// A `Begin` packet for the given face.
    pub fn begin(position: BlockPos, face: BlockFace) -> Self {
        Self {
            status: DigStatus::Begin,
            position,
            face: face.wire(),
        }
    }

    /// A `Cancel` packet with an explicit wire face (neutral 0 unless the
    /// cancel is superseded by a same-position request).
    pub fn cancel(position: BlockPos, face: u8) -> Self {
        Self {
            status: DigStatus::Cancel,
            position,
            face,
        }
    }

    /// A `Finish` packet for the given face.
    pub fn finish(position: BlockPos, face: BlockFace) -> Self {
        Self {
            status: DigStatus::Finish,
            position,
            face: face.wire(),
        }
    }
}

// ---------------------------------------------------------------------------
// PacketSink
// ---------------------------------------------------------------------------

/// Failure from the transport collaborator.
///
/// Any send failure is fatal to the active session: once a packet is lost the
/// protocol state can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection is closed.
    #[error("connection closed")]
    Closed,
    /// The outbound buffer refused the packet.
    #[error("outbound buffer full")]
    Backpressure,
}

/// Outbound packet seam implemented by the transport collaborator.
pub trait PacketSink {
    /// Queues a packet for transmission.
    fn send(&mut self, packet: DigPacket) -> Result<(), TransportError>;
}
