//! OTAP-Core: chunked, encrypted, flow-controlled firmware push over BLE.
//!
//! This crate implements the host side of an OTA transfer protocol that
//! pushes a firmware image to a peripheral over a low-MTU GATT link: each
//! chunk is RC5-encrypted per 4-byte group, framed with a small header and
//! paced by one of two flow-control disciplines.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Cipher**: RC5-16/12 key schedule and block encrypt/decrypt
//! - **Plan**: block/chunk geometry from image size and the byte budget
//! - **Protocol**: wire constants, chunk codec, notification parsing
//! - **Transport**: GATT link abstraction (mock, loopback)
//! - **Session**: the event-driven transfer state machine
//! - **Events**: observer pattern for UI decoupling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use otap_core::{
//!     LoopbackTransport, NullObserver, SessionState, TransferMode, TransferPlan,
//!     TransferSession, payload_budget,
//! };
//!
//! let key = *b"0123456789abcdef";
//! let image = std::fs::read("firmware.bin").expect("image");
//! let budget = payload_budget(185, TransferMode::Ack);
//! let plan = TransferPlan::compute(image.len(), 240, budget).expect("plan");
//!
//! let transport = Arc::new(LoopbackTransport::new(budget, TransferMode::Ack, &key));
//! let mut session = TransferSession::new(
//!     image,
//!     &key,
//!     plan,
//!     TransferMode::Ack,
//!     Arc::clone(&transport),
//!     Arc::new(NullObserver),
//! );
//!
//! session.start().expect("start");
//! while session.state() == SessionState::AwaitingAck {
//!     let event = transport.pop_event().expect("event");
//!     session.handle_event(event).expect("event handling");
//! }
//! ```

pub mod cipher;
pub mod config;
pub mod events;
pub mod plan;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use cipher::KeySchedule;
pub use config::{SessionConfig, parse_key_hex};
pub use events::{NullObserver, TracingObserver, TransferEvent, TransferObserver};
pub use plan::{PlanError, TransferPlan};
pub use protocol::{Notification, TransferMode, WireError};
pub use session::{
    FlowControlMode, SessionError, SessionEvent, SessionState, TransferSession,
};
pub use transport::{
    BleTransport, LoopbackTransport, MockTransport, TransportError, WriteKind, WriteTarget,
    payload_budget,
};
