use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Lifecycle of one account's session, as tracked by the supervisor (§3,
/// §4.10). Distinct from `merchat_transport::SessionState`, which only
/// tracks the WebSocket connection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Running,
    Stopping,
    Stopped,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Idle,
            1 => SessionState::Connecting,
            2 => SessionState::Running,
            3 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Connecting => 1,
            SessionState::Running => 2,
            SessionState::Stopping => 3,
            SessionState::Stopped => 4,
        }
    }
}

pub(crate) struct StateHandle(AtomicU8);

impl StateHandle {
    pub(crate) fn new(initial: SessionState) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, s: SessionState) {
        self.0.store(s.as_u8(), Ordering::Release);
    }
}

/// Handle to one running (or just-stopped) account session, returned by
/// `Supervisor::start` (§4.10, point 5).
pub struct SessionHandle {
    pub(crate) state: Arc<StateHandle>,
    pub(crate) cancel: CancellationToken,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Requests cooperative shutdown; does not block for it to complete.
    /// `Supervisor::stop` awaits actual exit on top of this.
    pub fn request_stop(&self) {
        self.state.set(SessionState::Stopping);
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrip() {
        let h = StateHandle::new(SessionState::Idle);
        assert_eq!(h.get(), SessionState::Idle);
        h.set(SessionState::Running);
        assert_eq!(h.get(), SessionState::Running);
    }
}
