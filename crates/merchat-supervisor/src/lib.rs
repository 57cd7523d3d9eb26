pub mod config;
pub mod error;
pub mod session;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use error::{Result, SupervisorError};
pub use session::{SessionHandle, SessionState};
pub use supervisor::Supervisor;
