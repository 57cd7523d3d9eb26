use std::sync::Arc;

use dashmap::DashMap;
use merchat_agent::AgentAdapter;
use merchat_core::ids::AccountKey;
use merchat_core::{Account, Event, Handler, Presence};
use merchat_dispatch::{build_handlers, Consumer, DispatcherRegistry};
use merchat_handlers::{AIReplyHandler, BusinessHoursHandler, TransferToHumanHandler};
use merchat_platform::PlatformClient;
use merchat_store::CredentialStore;
use merchat_transport::TransportSession;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::session::{SessionHandle, SessionState, StateHandle};

/// Owns every account session and enforces the at-most-one-session
/// invariant (§3.1, §4.10): a keyed registry of running sessions, much like
/// a connection manager keeps one entry per named connection.
pub struct Supervisor {
    store: Arc<CredentialStore>,
    platform: Arc<PlatformClient>,
    agent: Arc<AgentAdapter>,
    config: SupervisorConfig,
    sessions: Arc<DashMap<AccountKey, Arc<SessionHandle>>>,
    start_locks: DashMap<AccountKey, Arc<AsyncMutex<()>>>,
}

impl Supervisor {
    pub fn new(
        store: Arc<CredentialStore>,
        platform: Arc<PlatformClient>,
        agent: Arc<AgentAdapter>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            store,
            platform,
            agent,
            config,
            sessions: Arc::new(DashMap::new()),
            start_locks: DashMap::new(),
        }
    }

    fn account_key(account: &Account) -> AccountKey {
        AccountKey {
            channel: account.channel.clone(),
            shop_id: account.shop_id.clone(),
            account_user_id: account.account_user_id.clone(),
        }
    }

    /// Starts the session for `account` (§4.10). Idempotent refusal: calling
    /// this again while a session is already `Connecting`/`Running` returns
    /// `AlreadyRunning` rather than spawning a second session.
    #[instrument(skip(self, account), fields(channel = %account.channel, shop_id = %account.shop_id, account_user_id = %account.account_user_id))]
    pub async fn start(&self, account: &Account) -> Result<Arc<SessionHandle>> {
        if account.presence == Presence::Unverified {
            return Err(SupervisorError::NotEligible("presence is unverified".into()));
        }

        let key = Self::account_key(account);
        let lock = self
            .start_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(existing) = self.sessions.get(&key) {
            if !matches!(existing.state(), SessionState::Stopped) {
                return Err(SupervisorError::AlreadyRunning);
            }
        }

        let state = Arc::new(StateHandle::new(SessionState::Connecting));
        let cancel = CancellationToken::new();
        let handle = Arc::new(SessionHandle { state: state.clone(), cancel: cancel.clone() });
        self.sessions.insert(key.clone(), handle.clone());

        let (queue_producer, queue_consumer) = merchat_queue::bounded(self.config.queue_max_size);

        let handlers: Vec<Arc<dyn Handler>> = vec![
            Arc::new(BusinessHoursHandler::new(
                &self.config.business_start,
                &self.config.business_end,
                self.platform.clone(),
                account.clone(),
            )),
            Arc::new(TransferToHumanHandler::load(&self.store, &account.channel, self.platform.clone(), account.clone())),
            Arc::new(AIReplyHandler::new(self.agent.clone(), self.platform.clone(), account.clone())),
        ];
        let registry = Arc::new(DispatcherRegistry::new(
            build_handlers(handlers),
            self.config.max_concurrent,
            self.config.queue_max_size,
            self.config.dispatcher_idle,
        ));

        let consumer = Consumer::new(
            account.clone(),
            self.platform.clone(),
            registry,
            queue_consumer,
            cancel.clone(),
            self.config.reaper_interval,
        );
        let consumer_task = tokio::spawn(consumer.run());

        let token = match self.platform.fetch_chat_token(account).await {
            Ok(t) => t,
            Err(e) => {
                state.set(SessionState::Stopped);
                cancel.cancel();
                consumer_task.abort();
                self.sessions.remove(&key);
                return Err(SupervisorError::Core(e));
            }
        };
        let url = format!(
            "{}/?access_token={}&role=mall_cs&client=web&version={}",
            self.config.ws_base_url, token, self.config.client_version
        );

        let (events_tx, mut events_rx) = tokio::sync::mpsc::channel::<Event>(self.config.queue_max_size);
        let bridge_producer = queue_producer;
        let bridge_task = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if bridge_producer.put(event).await.is_err() {
                    break;
                }
            }
        });

        let (opened_tx, opened_rx) = oneshot::channel();
        let opener_state = state.clone();
        tokio::spawn(async move {
            if opened_rx.await.is_ok() {
                opener_state.set(SessionState::Running);
                info!("session running");
            }
        });

        let shop_id = account.shop_id.clone();
        let account_user_id = account.account_user_id.clone();
        let ping_seconds = self.config.ping_seconds;
        let pong_timeout_seconds = self.config.pong_timeout_seconds;
        let runner_cancel = cancel.clone();
        let runner_state = state.clone();
        let sessions_for_task = self.sessions.clone();
        let key_for_task = key.clone();

        tokio::spawn(async move {
            let result = TransportSession::connect(
                &url,
                shop_id,
                account_user_id,
                ping_seconds,
                pong_timeout_seconds,
                events_tx,
                runner_cancel.clone(),
                opened_tx,
            )
            .await;

            match result {
                Ok((_session, close_kind)) => debug!(?close_kind, "transport session ended"),
                Err(e) => warn!(error = %e, "transport handshake failed"),
            }

            runner_cancel.cancel();
            bridge_task.abort();
            let _ = consumer_task.await;
            runner_state.set(SessionState::Stopped);
            sessions_for_task.remove_if(&key_for_task, |_, v| v.state() == SessionState::Stopped);
        });

        Ok(handle)
    }

    /// Stops the session for `account`, if any (§4.10). Idempotent: calling
    /// this on an account with no running session is a no-op.
    #[instrument(skip(self, account), fields(channel = %account.channel, shop_id = %account.shop_id, account_user_id = %account.account_user_id))]
    pub async fn stop(&self, account: &Account) {
        let key = Self::account_key(account);
        let Some(handle) = self.sessions.get(&key).map(|e| e.clone()) else {
            return;
        };
        handle.request_stop();

        let deadline = tokio::time::Instant::now() + self.config.stop_join_timeout;
        while handle.state() != SessionState::Stopped && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        if handle.state() != SessionState::Stopped {
            warn!(channel = %account.channel, shop_id = %account.shop_id, "session stop timed out, abandoning join");
        }
    }

    /// Starts every account whose `presence == Online` and which is not
    /// already running (§4.10). Per-account failures are logged, not fatal.
    pub async fn start_all_eligible(&self) {
        let accounts = match self.store.list_accounts(None) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "failed to list accounts for start_all_eligible");
                return;
            }
        };
        for account in accounts.into_iter().filter(|a| a.presence == Presence::Online) {
            match self.start(&account).await {
                Ok(_) => info!(shop_id = %account.shop_id, account_user_id = %account.account_user_id, "session started"),
                Err(SupervisorError::AlreadyRunning) => {}
                Err(e) => warn!(shop_id = %account.shop_id, account_user_id = %account.account_user_id, error = %e, "failed to start session"),
            }
        }
    }

    /// Fans out `stop` to every live session concurrently (§5 Cancellation).
    pub async fn stop_all(&self) {
        let accounts: Vec<Account> = match self.store.list_accounts(None) {
            Ok(a) => a,
            Err(_) => Vec::new(),
        };
        let running: Vec<&Account> = accounts
            .iter()
            .filter(|a| self.sessions.contains_key(&Self::account_key(a)))
            .collect();

        let stops = running.into_iter().map(|a| self.stop(a));
        futures_util::future::join_all(stops).await;
    }

    pub fn state_of(&self, account: &Account) -> SessionState {
        self.sessions
            .get(&Self::account_key(account))
            .map(|h| h.state())
            .unwrap_or(SessionState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchat_agent::AgentClient;
    use merchat_core::config::MerchatConfig;
    use merchat_core::ids::{AccountUserId, ShopId};
    use merchat_platform::{FixtureLoginProvider, RetryPolicy};

    fn sample_supervisor() -> (Supervisor, Arc<CredentialStore>) {
        let store = Arc::new(CredentialStore::in_memory().unwrap());
        let login = Arc::new(FixtureLoginProvider);
        let platform = Arc::new(PlatformClient::new("http://127.0.0.1:0", store.clone(), login, RetryPolicy::default()));
        let agent_client = AgentClient::new("http://127.0.0.1:0", "token", "bot");
        let agent = Arc::new(AgentAdapter::new(agent_client, store.clone()));
        let config = SupervisorConfig::from_config(&MerchatConfig::default());
        let supervisor = Supervisor::new(store.clone(), platform, agent, config);
        (supervisor, store)
    }

    #[tokio::test]
    async fn start_rejects_unverified_account() {
        let (supervisor, store) = sample_supervisor();
        store
            .add_account("pinduoduo", &ShopId::new("shop1"), &AccountUserId::new("cs1"), "u", "p", None)
            .unwrap();
        let account = store
            .get_account("pinduoduo", &ShopId::new("shop1"), &AccountUserId::new("cs1"))
            .unwrap()
            .unwrap();

        let err = supervisor.start(&account).await.unwrap_err();
        assert_eq!(err.code(), "NOT_ELIGIBLE");
    }

    #[tokio::test]
    async fn start_all_eligible_is_a_noop_on_empty_store() {
        let (supervisor, _store) = sample_supervisor();
        supervisor.start_all_eligible().await;
    }

    #[tokio::test]
    async fn state_of_unknown_account_is_idle() {
        let (supervisor, store) = sample_supervisor();
        store
            .add_account("pinduoduo", &ShopId::new("shop1"), &AccountUserId::new("cs1"), "u", "p", None)
            .unwrap();
        let account = store
            .get_account("pinduoduo", &ShopId::new("shop1"), &AccountUserId::new("cs1"))
            .unwrap()
            .unwrap();
        assert_eq!(supervisor.state_of(&account), SessionState::Idle);
    }
}
