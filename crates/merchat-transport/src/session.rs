use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use merchat_core::ids::{AccountUserId, ShopId};
use merchat_protocol::decode;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Idle,
            1 => SessionState::Connecting,
            2 => SessionState::Open,
            3 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Connecting => 1,
            SessionState::Open => 2,
            SessionState::Closing => 3,
            SessionState::Closed => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CloseKind {
    Normal,
    PeerClosed,
    TransportError { cause: String },
}

/// Tracks `SessionState` across the reader task and the owning supervisor
/// without a lock (single producer of transitions: the reader task).
pub struct StateHandle(AtomicU8);

impl StateHandle {
    fn new(initial: SessionState) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, s: SessionState) {
        self.0.store(s.as_u8(), Ordering::Release);
    }
}

/// One client-side WebSocket connection to the platform, decoding every
/// text frame into a `merchat_core::Event` and forwarding it to `events`.
pub struct TransportSession {
    pub state: Arc<StateHandle>,
    cancel: CancellationToken,
}

impl TransportSession {
    /// Connects and runs the read/ping loop until `cancel` fires or the peer
    /// closes. Decoded events are sent on `events`; the channel closing
    /// (receiver dropped) is treated the same as a local cancel.
    ///
    /// `cancel` is supplied by the caller (rather than created here) so a
    /// handle to stop this connection exists before the loop — which does
    /// not return until the connection ends — starts running.
    ///
    /// `opened` fires once the handshake completes, letting a caller who
    /// spawned `connect` as a task observe the `Open` transition without
    /// waiting for the whole call to return.
    #[instrument(skip(url, events, cancel, opened), fields(%shop_id, %account_user_id))]
    pub async fn connect(
        url: &str,
        shop_id: ShopId,
        account_user_id: AccountUserId,
        ping_seconds: u64,
        pong_timeout_seconds: u64,
        events: mpsc::Sender<merchat_core::Event>,
        cancel: CancellationToken,
        opened: tokio::sync::oneshot::Sender<()>,
    ) -> Result<(Self, CloseKind)> {
        let state = Arc::new(StateHandle::new(SessionState::Connecting));
        let session = Self {
            state: state.clone(),
            cancel: cancel.clone(),
        };

        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        state.set(SessionState::Open);
        let _ = opened.send(());
        info!("transport open");

        let (mut write, mut read) = ws_stream.split();
        let mut ping_tick = interval(Duration::from_secs(ping_seconds));
        let mut last_pong = Instant::now();
        let pong_timeout = Duration::from_secs(pong_timeout_seconds);

        let close_kind = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break CloseKind::Normal;
                }
                _ = ping_tick.tick() => {
                    if last_pong.elapsed() > pong_timeout {
                        break CloseKind::TransportError { cause: "pong timeout".into() };
                    }
                    if write.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break CloseKind::TransportError { cause: "ping send failed".into() };
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            match decode::decode(text.as_bytes(), &shop_id, &account_user_id) {
                                Ok(event) => {
                                    if events.send(event).await.is_err() {
                                        break CloseKind::Normal;
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "dropping malformed frame");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Pong(_))) => {
                            last_pong = Instant::now();
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            break CloseKind::PeerClosed;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            break CloseKind::TransportError { cause: e.to_string() };
                        }
                    }
                }
            }
        };

        state.set(SessionState::Closing);
        debug!(?close_kind, "transport closing");
        state.set(SessionState::Closed);
        Ok((session, close_kind))
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrip() {
        let h = StateHandle::new(SessionState::Idle);
        assert_eq!(h.get(), SessionState::Idle);
        h.set(SessionState::Open);
        assert_eq!(h.get(), SessionState::Open);
    }
}
