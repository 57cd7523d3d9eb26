pub mod decode;
pub mod error;
pub mod wire;

pub use decode::decode;
pub use error::DecodeError;
