//! Inbound counter-echo notifications (notify mode only).

use super::constants::{NOTIFICATION_LEN, STATUS_OK};
use super::WireError;

/// Peripheral response to a notify-mode data chunk.
///
/// The peripheral echoes the counter it saw and a status byte; anything
/// other than an exact counter echo with [`STATUS_OK`] is fatal to the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub counter: u8,
    pub status: u8,
}

impl Notification {
    /// Parse a raw notification payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < NOTIFICATION_LEN {
            return Err(WireError::ShortNotification { actual: bytes.len() });
        }
        Ok(Self {
            counter: bytes[0],
            status: bytes[1],
        })
    }

    pub fn to_bytes(self) -> [u8; NOTIFICATION_LEN] {
        [self.counter, self.status]
    }

    pub fn is_ok(self) -> bool {
        self.status == STATUS_OK
    }
}
