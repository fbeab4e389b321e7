//! Event system for UI decoupling.
//!
//! A CLI, TUI or GUI subscribes to transfer events without tight coupling
//! to the session logic.

/// Events emitted by a transfer session.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// Session started; geometry is fixed for the whole transfer.
    Started {
        image_len: usize,
        blocks: usize,
        block_size: usize,
        chunk_size: usize,
    },
    /// A data chunk was handed to the transport.
    ChunkSent {
        block: usize,
        chunk: usize,
        plaintext_len: usize,
    },
    /// Progress through the current block, in percent.
    ///
    /// This is per-block, not whole-transfer: callers wanting an overall
    /// figure must weight by block sizes themselves.
    BlockProgress { block: usize, percent: u8 },
    /// The one-time completion byte was written to the control
    /// characteristic.
    CompletionSignalled,
    /// Transfer finished cleanly.
    Completed,
    /// Transfer ended in a terminal failure; the link is being torn down.
    Aborted { reason: String },
}

/// Observer trait for receiving transfer events.
///
/// Implement this in your UI layer to receive updates.
pub trait TransferObserver: Send + Sync {
    fn on_event(&self, event: &TransferEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_event(&self, _event: &TransferEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Started {
                image_len,
                blocks,
                block_size,
                chunk_size,
            } => {
                tracing::info!(
                    image_len,
                    blocks,
                    block_size,
                    chunk_size,
                    "Transfer started"
                );
            }
            TransferEvent::ChunkSent {
                block,
                chunk,
                plaintext_len,
            } => {
                tracing::debug!(block, chunk, len = plaintext_len, "Chunk sent");
            }
            TransferEvent::BlockProgress { block, percent } => {
                tracing::debug!(block, progress = %format!("{percent}%"), "Block progress");
            }
            TransferEvent::CompletionSignalled => {
                tracing::info!("Completion signal written");
            }
            TransferEvent::Completed => {
                tracing::info!("Transfer complete");
            }
            TransferEvent::Aborted { reason } => {
                tracing::error!(reason = %reason, "Transfer aborted");
            }
        }
    }
}
