pub mod error;
pub mod session;

pub use error::{Result, TransportError};
pub use session::{CloseKind, SessionState, TransportSession};
