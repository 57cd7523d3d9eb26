pub mod config;
pub mod error;
pub mod handler;
pub mod ids;
pub mod types;

pub use error::{CoreError, Result};
pub use handler::Handler;
pub use types::*;
