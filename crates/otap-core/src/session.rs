//! Transfer session - the flow-controlled chunk-send state machine.
//!
//! The session owns no threads and never blocks. It is driven entirely by
//! [`SessionEvent`]s the transport adapter delivers through
//! [`TransferSession::handle_event`]; "waiting" is simply remaining in
//! `AwaitingAck` until the next event arrives. At most one chunk is in
//! flight at any time, in either flow-control mode.
//!
//! The session assumes exclusive, non-reentrant access. If the embedding
//! environment dispatches transport callbacks from several threads, it
//! must serialize them onto one logical caller before touching a session.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cipher::KeySchedule;
use crate::events::{TransferEvent, TransferObserver};
use crate::plan::TransferPlan;
use crate::protocol::{
    COUNTER_FIRST, Notification, TRANSFER_COMPLETE, TransferMode, WireError, encode_chunk,
};
use crate::transport::{BleTransport, TransportError, WriteKind, WriteTarget};

/// Externally delivered transport events driving the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The previously submitted write completed at the ATT layer.
    WriteCompleted,
    /// A notification arrived on the status characteristic.
    NotificationReceived(Vec<u8>),
    /// The link went away. Terminal; a new transfer starts from block 0
    /// with a fresh plan.
    Disconnected,
}

/// Flow-control discipline, carried with its per-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlMode {
    /// Write-with-response; advance on write completion.
    Ack,
    /// Write-without-response; advance on a counter-echo notification.
    Notify {
        /// Rolling sequence counter, cycles 1..=255, never 0.
        counter: u8,
    },
}

impl FlowControlMode {
    fn new(mode: TransferMode) -> Self {
        match mode {
            TransferMode::Ack => FlowControlMode::Ack,
            TransferMode::Notify => FlowControlMode::Notify {
                counter: COUNTER_FIRST,
            },
        }
    }

    /// Advance the rolling counter, skipping 0.
    fn bump_counter(&mut self) {
        if let FlowControlMode::Notify { counter } = self {
            *counter = match *counter {
                u8::MAX => COUNTER_FIRST,
                c => c + 1,
            };
        }
    }
}

/// Observable session states between events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not started.
    Idle,
    /// One chunk in flight, waiting for its completion or echo.
    AwaitingAck,
    /// Every chunk delivered and the completion signal written.
    Completed,
    /// Terminal failure; the transfer cannot be resumed.
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "IDLE"),
            SessionState::AwaitingAck => write!(f, "AWAITING_ACK"),
            SessionState::Completed => write!(f, "COMPLETED"),
            SessionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// The peer echoed a counter other than the one just sent. Fatal
    /// desync; never retried.
    #[error("protocol desync: sent counter {sent}, peer echoed {echoed}")]
    ProtocolDesync { sent: u8, echoed: u8 },

    /// The peer reported a nonzero status for the last chunk.
    #[error("peer reported failure status 0x{status:02X}")]
    PeerFailure { status: u8 },

    /// The notification payload could not be parsed.
    #[error("malformed notification: {0}")]
    Wire(#[from] WireError),

    /// The adapter rejected a write outright. The session aborts instead
    /// of stalling, since no completion event will ever re-enter it.
    #[error("write submission failed: {0}")]
    WriteFailed(#[from] TransportError),

    /// `start` was called on a session that already ran.
    #[error("session already started (state {state})")]
    AlreadyStarted { state: SessionState },
}

/// One firmware push over one connection.
///
/// Created at transfer start, discarded on completion or abort. Nothing
/// persists across sessions; a restart begins again at block 0.
pub struct TransferSession<T: BleTransport, O: TransferObserver> {
    transport: Arc<T>,
    observer: Arc<O>,
    image: Vec<u8>,
    plan: TransferPlan,
    schedule: KeySchedule,
    mode: FlowControlMode,
    state: SessionState,
    block: usize,
    chunk: usize,
    transfer_complete: bool,
    completion_signal_sent: bool,
}

impl<T: BleTransport, O: TransferObserver> TransferSession<T, O> {
    /// Create a session over an already computed plan.
    ///
    /// The key schedule is derived here, once; the key itself is not
    /// retained.
    pub fn new(
        image: Vec<u8>,
        key: &[u8; 16],
        plan: TransferPlan,
        mode: TransferMode,
        transport: Arc<T>,
        observer: Arc<O>,
    ) -> Self {
        Self {
            transport,
            observer,
            image,
            plan,
            schedule: KeySchedule::derive(key),
            mode: FlowControlMode::new(mode),
            state: SessionState::Idle,
            block: 0,
            chunk: 0,
            transfer_complete: false,
            completion_signal_sent: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transfer_complete(&self) -> bool {
        self.transfer_complete
    }

    /// Block currently being sent.
    pub fn current_block(&self) -> usize {
        self.block
    }

    /// Kick off the transfer: send chunk (0, 0) and await its event.
    pub fn start(&mut self) -> Result<SessionState, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted { state: self.state });
        }

        info!(
            blocks = self.plan.number_of_blocks(),
            block_size = self.plan.block_size(),
            chunk_size = self.plan.chunk_size(),
            "Starting transfer"
        );
        self.emit(TransferEvent::Started {
            image_len: self.plan.image_len(),
            blocks: self.plan.number_of_blocks(),
            block_size: self.plan.block_size(),
            chunk_size: self.plan.chunk_size(),
        });

        self.send_current_chunk()?;
        self.state = SessionState::AwaitingAck;
        Ok(self.state)
    }

    /// Feed one transport event into the state machine.
    ///
    /// Events delivered to a terminal session are ignored, so duplicate
    /// callbacks from the adapter are harmless.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<SessionState, SessionError> {
        match self.state {
            SessionState::Completed | SessionState::Aborted => {
                debug!(state = %self.state, ?event, "Event ignored in terminal state");
                Ok(self.state)
            }
            SessionState::Idle => {
                if event == SessionEvent::Disconnected {
                    self.abort("link disconnected before start", false);
                } else {
                    warn!(?event, "Event before start ignored");
                }
                Ok(self.state)
            }
            SessionState::AwaitingAck => match event {
                SessionEvent::Disconnected => {
                    // The link is already gone; no disconnect request.
                    self.abort("link disconnected", false);
                    Ok(self.state)
                }
                SessionEvent::WriteCompleted => match self.mode {
                    FlowControlMode::Ack => self.advance(),
                    // Pacing comes from the notification, not the write.
                    FlowControlMode::Notify { .. } => Ok(self.state),
                },
                SessionEvent::NotificationReceived(bytes) => match self.mode {
                    // No notifications expected in ack mode.
                    FlowControlMode::Ack => {
                        warn!("Unexpected notification in ack mode ignored");
                        Ok(self.state)
                    }
                    FlowControlMode::Notify { counter } => {
                        let notification = match Notification::from_bytes(&bytes) {
                            Ok(n) => n,
                            Err(e) => return Err(self.fail(SessionError::Wire(e))),
                        };
                        if notification.counter != counter {
                            return Err(self.fail(SessionError::ProtocolDesync {
                                sent: counter,
                                echoed: notification.counter,
                            }));
                        }
                        if !notification.is_ok() {
                            return Err(self.fail(SessionError::PeerFailure {
                                status: notification.status,
                            }));
                        }
                        self.mode.bump_counter();
                        self.advance()
                    }
                },
            },
        }
    }

    /// Move past the acknowledged chunk: send the next one, or finish.
    fn advance(&mut self) -> Result<SessionState, SessionError> {
        if self.plan.is_final_chunk(self.block, self.chunk) {
            return self.complete();
        }

        if self.plan.is_last_chunk_in_block(self.block, self.chunk) {
            self.block += 1;
            self.chunk = 0;
        } else {
            self.chunk += 1;
        }

        self.send_current_chunk()?;
        self.state = SessionState::AwaitingAck;
        Ok(self.state)
    }

    /// Write the one-time completion byte and finish the session.
    fn complete(&mut self) -> Result<SessionState, SessionError> {
        if !self.completion_signal_sent {
            self.submit(
                WriteTarget::Control,
                &[TRANSFER_COMPLETE],
                WriteKind::WithResponse,
            )?;
            self.completion_signal_sent = true;
            self.emit(TransferEvent::CompletionSignalled);
        }

        self.transfer_complete = true;
        self.state = SessionState::Completed;
        info!("Transfer complete");
        self.emit(TransferEvent::Completed);
        Ok(self.state)
    }

    fn send_current_chunk(&mut self) -> Result<(), SessionError> {
        let (counter, kind) = match self.mode {
            FlowControlMode::Ack => (None, WriteKind::WithResponse),
            FlowControlMode::Notify { counter } => (Some(counter), WriteKind::WithoutResponse),
        };

        let wire = encode_chunk(
            &self.plan,
            &self.schedule,
            &self.image,
            self.block,
            self.chunk,
            counter,
        );
        self.submit(WriteTarget::Data, &wire, kind)?;

        let plaintext_len = self.plan.chunk_range(self.block, self.chunk).len();
        debug!(
            block = self.block,
            chunk = self.chunk,
            len = plaintext_len,
            "Chunk submitted"
        );
        self.emit(TransferEvent::ChunkSent {
            block: self.block,
            chunk: self.chunk,
            plaintext_len,
        });

        let chunks_in_block = self.plan.chunks_in_block(self.block);
        self.emit(TransferEvent::BlockProgress {
            block: self.block,
            percent: ((self.chunk + 1) * 100 / chunks_in_block) as u8,
        });
        Ok(())
    }

    fn submit(
        &mut self,
        target: WriteTarget,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), SessionError> {
        if let Err(e) = self.transport.submit_write(target, data, kind) {
            // An immediate submission failure means no event will ever
            // re-enter the session; abort rather than stall forever.
            Err(self.fail(SessionError::WriteFailed(e)))
        } else {
            Ok(())
        }
    }

    /// Abort and hand the error back for the caller to propagate.
    fn fail(&mut self, error: SessionError) -> SessionError {
        self.abort(&error.to_string(), true);
        error
    }

    fn abort(&mut self, reason: &str, disconnect: bool) {
        if matches!(self.state, SessionState::Completed | SessionState::Aborted) {
            return;
        }
        warn!(reason = %reason, "Aborting transfer");
        self.state = SessionState::Aborted;
        if disconnect {
            self.transport.request_disconnect();
        }
        self.emit(TransferEvent::Aborted {
            reason: reason.to_string(),
        });
    }

    fn emit(&self, event: TransferEvent) {
        self.observer.on_event(&event);
    }
}
