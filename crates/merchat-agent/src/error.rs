use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("conversation create failed: {0}")]
    ConversationCreateFailed(String),

    #[error("agent unreachable: {0}")]
    AgentUnreachable(String),

    #[error("agent timed out waiting for a reply")]
    AgentTimeout,
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::ConversationCreateFailed(_) => "CONVERSATION_CREATE_FAILED",
            AgentError::AgentUnreachable(_) => "AGENT_UNREACHABLE",
            AgentError::AgentTimeout => "AGENT_TIMEOUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
