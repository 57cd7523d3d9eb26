use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
}

impl QueueError {
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Closed => "QUEUE_CLOSED",
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
