//! Transport layer module.

pub mod loopback;
pub mod mock;
pub mod traits;

pub use loopback::{LoopbackTransport, Tamper};
pub use mock::{CapturedWrite, MockTransport};
pub use traits::{BleTransport, TransportError, WriteKind, WriteTarget, payload_budget};
