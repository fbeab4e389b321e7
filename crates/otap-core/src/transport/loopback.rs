//! Loopback transport: an in-process peripheral.
//!
//! Decrypts every data chunk with the shared key schedule and queues the
//! event the flow-control discipline calls for, so a whole transfer can
//! run end-to-end without hardware. Powers the CLI `push` command and the
//! integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use super::traits::{BleTransport, TransportError, WriteKind, WriteTarget};
use crate::cipher::KeySchedule;
use crate::protocol::{Notification, STATUS_OK, TransferMode, decode_chunk};
use crate::session::SessionEvent;

/// Fault injection for failure-path tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tamper {
    /// Echo a counter one off from the real one.
    WrongCounter,
    /// Report this nonzero status instead of accepting the chunk.
    FailStatus(u8),
}

#[derive(Default)]
struct LoopbackState {
    events: VecDeque<SessionEvent>,
    recovered: Vec<u8>,
    dropped_bytes: usize,
    control_writes: Vec<Vec<u8>>,
    tamper: Option<Tamper>,
}

/// In-process peripheral end of the transfer.
pub struct LoopbackTransport {
    budget: usize,
    mode: TransferMode,
    schedule: KeySchedule,
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    /// A peripheral provisioned with the same 16-byte key as the host.
    pub fn new(budget: usize, mode: TransferMode, key: &[u8; 16]) -> Self {
        Self {
            budget,
            mode,
            schedule: KeySchedule::derive(key),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Arm a one-shot fault for the next data chunk.
    pub fn tamper_next(&self, tamper: Tamper) {
        self.state.lock().unwrap().tamper = Some(tamper);
    }

    /// Pop the next event the peripheral produced for the session.
    pub fn pop_event(&self) -> Option<SessionEvent> {
        self.state.lock().unwrap().events.pop_front()
    }

    /// Plaintext recovered so far, per-chunk trailing remainders omitted.
    pub fn recovered(&self) -> Vec<u8> {
        self.state.lock().unwrap().recovered.clone()
    }

    /// Bytes declared by chunk headers but never carried as ciphertext.
    pub fn dropped_bytes(&self) -> usize {
        self.state.lock().unwrap().dropped_bytes
    }

    /// Everything written to the control characteristic.
    pub fn control_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().control_writes.clone()
    }
}

impl BleTransport for LoopbackTransport {
    fn byte_budget(&self) -> usize {
        self.budget
    }

    fn submit_write(
        &self,
        target: WriteTarget,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        match target {
            WriteTarget::Control => {
                debug!(data = ?data, "Loopback control write");
                state.control_writes.push(data.to_vec());
                state.events.push_back(SessionEvent::WriteCompleted);
                Ok(())
            }
            WriteTarget::Data => {
                let chunk = decode_chunk(&self.schedule, self.mode, data)
                    .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
                debug!(
                    declared = chunk.declared_len,
                    recovered = chunk.plaintext.len(),
                    "Loopback data write"
                );
                state.dropped_bytes += chunk.dropped_bytes();
                state.recovered.extend_from_slice(&chunk.plaintext);

                match (self.mode, kind) {
                    (TransferMode::Ack, _) => {
                        state.events.push_back(SessionEvent::WriteCompleted);
                    }
                    (TransferMode::Notify, _) => {
                        let counter = chunk.counter.unwrap_or(0);
                        let (counter, status) = match state.tamper.take() {
                            Some(Tamper::WrongCounter) => (counter.wrapping_add(1), STATUS_OK),
                            Some(Tamper::FailStatus(status)) => (counter, status),
                            None => (counter, STATUS_OK),
                        };
                        let echo = Notification { counter, status };
                        state
                            .events
                            .push_back(SessionEvent::NotificationReceived(echo.to_bytes().to_vec()));
                    }
                }
                Ok(())
            }
        }
    }

    fn request_disconnect(&self) {
        self.state.lock().unwrap().events.clear();
    }

    fn is_connected(&self) -> bool {
        true
    }
}
