use merchat_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("account not eligible to start: {0}")]
    NotEligible(String),
    #[error("session already running for this account")]
    AlreadyRunning,
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SupervisorError {
    pub fn code(&self) -> &'static str {
        match self {
            SupervisorError::NotEligible(_) => "NOT_ELIGIBLE",
            SupervisorError::AlreadyRunning => "ALREADY_RUNNING",
            SupervisorError::Core(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
