//! BLE transport layer abstraction.
//!
//! Defines the `BleTransport` trait for the GATT link, allowing different
//! implementations (a platform BLE stack binding, mock, loopback). The
//! core only consumes the link's outcomes: the negotiated byte budget and
//! the write/notification events the adapter dispatches back into the
//! session.

use thiserror::Error;

use crate::protocol::{ATT_WRITE_OVERHEAD, TransferMode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("link disconnected")]
    Disconnected,

    #[error("write submission failed: {0}")]
    WriteFailed(String),
}

/// Which GATT characteristic a write is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// Data characteristic carrying encrypted chunks.
    Data,
    /// Control characteristic carrying the completion signal.
    Control,
}

/// ATT write flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Write request; the peer confirms at the ATT layer.
    WithResponse,
    /// Write command; pacing must come from elsewhere (notifications).
    WithoutResponse,
}

/// Abstract GATT transport interface.
///
/// This trait enables:
/// - Mock implementation for state-machine unit testing
/// - Loopback implementation for end-to-end runs without hardware
/// - A platform BLE binding in the embedding application
pub trait BleTransport: Send + Sync {
    /// Negotiated per-write payload budget, known before planning starts.
    fn byte_budget(&self) -> usize;

    /// Queue exactly one write. The session never submits a second data
    /// write before the previous one's completion or notification event
    /// has been delivered back to it.
    fn submit_write(
        &self,
        target: WriteTarget,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), TransportError>;

    /// Ask the adapter to tear the link down.
    fn request_disconnect(&self);

    /// Check if the link is still up.
    fn is_connected(&self) -> bool;
}

/// Per-write payload budget for a link with the given ATT MTU.
///
/// Reserves the fixed ATT write overhead plus this discipline's chunk
/// header, leaving the byte budget the planner may spend on ciphertext.
pub fn payload_budget(mtu: usize, mode: TransferMode) -> usize {
    mtu.saturating_sub(ATT_WRITE_OVERHEAD + mode.header_len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_budget() {
        assert_eq!(payload_budget(23, TransferMode::Ack), 19);
        assert_eq!(payload_budget(23, TransferMode::Notify), 18);
        assert_eq!(payload_budget(247, TransferMode::Ack), 243);
    }

    #[test]
    fn test_payload_budget_saturates() {
        assert_eq!(payload_budget(3, TransferMode::Ack), 0);
        assert_eq!(payload_budget(0, TransferMode::Notify), 0);
    }
}
