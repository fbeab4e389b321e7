//! Wire-level constants for the OTA transfer protocol.

/// Cipher group width in bytes; every ciphertext body is a whole number of
/// these.
pub const CIPHER_GROUP_SIZE: usize = 4;

/// Largest chunk the one-byte length header can describe, rounded down to a
/// whole number of cipher groups.
pub const MAX_CHUNK_LEN: usize = 252;

/// Data-chunk header length in ack mode: `[len]`.
pub const ACK_HEADER_LEN: usize = 1;

/// Data-chunk header length in notify mode: `[counter][len]`.
pub const NOTIFY_HEADER_LEN: usize = 2;

/// Inbound notification length: `[echoed_counter][status]`.
pub const NOTIFICATION_LEN: usize = 2;

/// Control-characteristic byte written exactly once at transfer end.
pub const TRANSFER_COMPLETE: u8 = 0x01;

/// Notification status meaning "chunk accepted, keep going".
pub const STATUS_OK: u8 = 0x00;

/// First value of the rolling sequence counter. The counter cycles
/// 1..=255 and never takes the value 0.
pub const COUNTER_FIRST: u8 = 1;

/// Fixed ATT overhead reserved out of the link MTU for a write PDU.
pub const ATT_WRITE_OVERHEAD: usize = 3;

/// Default requested block size when the caller expresses no preference.
pub const DEFAULT_BLOCK_SIZE: usize = 240;
