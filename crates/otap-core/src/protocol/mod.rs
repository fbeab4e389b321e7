//! Protocol module - wire format definitions for the OTA transfer.

pub mod chunk;
pub mod constants;
pub mod notification;

pub use chunk::{DecodedChunk, decode_chunk, encode_chunk};
pub use constants::*;
pub use notification::Notification;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flow-control discipline negotiated for the data characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Write-with-response; the ATT write confirmation paces the stream.
    #[default]
    Ack,
    /// Write-without-response; a counter-echo notification paces the stream.
    Notify,
}

impl TransferMode {
    /// Data-chunk header length for this discipline.
    pub fn header_len(self) -> usize {
        match self {
            TransferMode::Ack => ACK_HEADER_LEN,
            TransferMode::Notify => NOTIFY_HEADER_LEN,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("notification too short: {actual} bytes, need {}", NOTIFICATION_LEN)]
    ShortNotification { actual: usize },

    #[error("chunk too short: {actual} bytes, need at least {needed} for the header")]
    ShortChunk { actual: usize, needed: usize },

    #[error("ciphertext length {actual} does not match declared plaintext length {declared}")]
    BodyLengthMismatch { declared: usize, actual: usize },
}
