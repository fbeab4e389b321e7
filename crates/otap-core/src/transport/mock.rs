//! Mock BLE transport for testing.

use std::sync::Mutex;

use super::traits::{BleTransport, TransportError, WriteKind, WriteTarget};

/// One captured write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedWrite {
    pub target: WriteTarget,
    pub data: Vec<u8>,
    pub kind: WriteKind,
}

/// Mock transport for unit testing session logic.
///
/// Captures every write, counts disconnect requests and can simulate
/// link loss or an immediate submission failure.
pub struct MockTransport {
    budget: usize,
    writes: Mutex<Vec<CapturedWrite>>,
    connected: Mutex<bool>,
    disconnect_requests: Mutex<usize>,
    fail_next_write: Mutex<bool>,
}

impl MockTransport {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            writes: Mutex::new(Vec::new()),
            connected: Mutex::new(true),
            disconnect_requests: Mutex::new(0),
            fail_next_write: Mutex::new(false),
        }
    }

    /// Get all captured writes.
    pub fn writes(&self) -> Vec<CapturedWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Captured writes to the data characteristic.
    pub fn data_writes(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.target == WriteTarget::Data)
            .map(|w| w.data.clone())
            .collect()
    }

    /// Captured writes to the control characteristic.
    pub fn control_writes(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.target == WriteTarget::Control)
            .map(|w| w.data.clone())
            .collect()
    }

    /// How often the session asked for a disconnect.
    pub fn disconnect_requests(&self) -> usize {
        *self.disconnect_requests.lock().unwrap()
    }

    /// Simulate link loss.
    pub fn drop_link(&self) {
        *self.connected.lock().unwrap() = false;
    }

    /// Make the next `submit_write` fail immediately.
    pub fn fail_next_write(&self) {
        *self.fail_next_write.lock().unwrap() = true;
    }
}

impl BleTransport for MockTransport {
    fn byte_budget(&self) -> usize {
        self.budget
    }

    fn submit_write(
        &self,
        target: WriteTarget,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), TransportError> {
        if std::mem::take(&mut *self.fail_next_write.lock().unwrap()) {
            return Err(TransportError::WriteFailed("injected failure".into()));
        }
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        self.writes.lock().unwrap().push(CapturedWrite {
            target,
            data: data.to_vec(),
            kind,
        });
        Ok(())
    }

    fn request_disconnect(&self) {
        *self.disconnect_requests.lock().unwrap() += 1;
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::new(20);
        mock.submit_write(WriteTarget::Data, b"abc", WriteKind::WithResponse)
            .unwrap();
        mock.submit_write(WriteTarget::Control, &[0x01], WriteKind::WithResponse)
            .unwrap();

        assert_eq!(mock.data_writes(), vec![b"abc".to_vec()]);
        assert_eq!(mock.control_writes(), vec![vec![0x01]]);
    }

    #[test]
    fn test_mock_drop_link() {
        let mock = MockTransport::new(20);
        assert!(mock.is_connected());

        mock.drop_link();
        assert!(!mock.is_connected());
        assert_eq!(
            mock.submit_write(WriteTarget::Data, b"x", WriteKind::WithResponse),
            Err(TransportError::Disconnected)
        );
    }

    #[test]
    fn test_mock_injected_write_failure() {
        let mock = MockTransport::new(20);
        mock.fail_next_write();
        assert!(
            mock.submit_write(WriteTarget::Data, b"x", WriteKind::WithResponse)
                .is_err()
        );
        // Only the one injected failure.
        assert!(
            mock.submit_write(WriteTarget::Data, b"x", WriteKind::WithResponse)
                .is_ok()
        );
    }
}
