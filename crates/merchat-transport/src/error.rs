use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("transport error: {0}")]
    Io(String),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Handshake(_) => "TRANSPORT_HANDSHAKE",
            TransportError::Io(_) => "TRANSPORT_IO",
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
