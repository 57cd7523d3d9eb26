use thiserror::Error;

/// Top-level error kinds shared across the pipeline (§7 of the design doc).
/// Component crates define their own narrower error enums and convert into
/// this one at the boundary where a typed result needs to cross into a
/// generic caller (the supervisor, the admin HTTP surface).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("session expired")]
    SessionExpired,

    #[error("remote error {code}: {msg}")]
    Remote { code: String, msg: String },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("agent error: {0}")]
    Agent(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Transport(_) => "TRANSPORT_ERROR",
            CoreError::Decode(_) => "DECODE_ERROR",
            CoreError::SessionExpired => "SESSION_EXPIRED",
            CoreError::Remote { .. } => "REMOTE_ERROR",
            CoreError::RateLimited { .. } => "RATE_LIMITED",
            CoreError::Agent(_) => "AGENT_ERROR",
            CoreError::Storage(_) => "STORAGE_ERROR",
            CoreError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
