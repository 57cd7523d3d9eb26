use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    MalformedJson(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
