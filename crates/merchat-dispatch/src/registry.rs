use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use dashmap::DashMap;
use merchat_core::ids::UserKey;
use merchat_core::{Event, Handler};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::dispatcher::{self, UserDispatcherHandle};

/// Owns every live per-user dispatcher for one account (§4.6/§4.7).
///
/// Spawn decisions are serialized by a small `std::sync::Mutex` guarding the
/// check-then-insert on `dispatchers`; the critical section holds no `.await`
/// so the lock is held for microseconds regardless of contention.
pub struct DispatcherRegistry {
    dispatchers: DashMap<UserKey, Arc<UserDispatcherHandle>>,
    spawn_lock: StdMutex<()>,
    handlers: Arc<Vec<Arc<dyn Handler>>>,
    semaphore: Arc<Semaphore>,
    inbox_capacity: usize,
    idle_timeout: Duration,
}

impl DispatcherRegistry {
    pub fn new(
        handlers: Arc<Vec<Arc<dyn Handler>>>,
        max_concurrent: usize,
        inbox_capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            dispatchers: DashMap::new(),
            spawn_lock: StdMutex::new(()),
            handlers,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            inbox_capacity,
            idle_timeout,
        }
    }

    /// Enqueues `event` under `user_key`, lazily spawning a dispatcher if
    /// none is currently running for it.
    pub async fn add(&self, user_key: UserKey, event: Event) {
        let handle = self.get_or_spawn(&user_key);
        if !handle.enqueue(event).await {
            // The dispatcher exited between lookup and enqueue (idle-timeout
            // race): rare, and the event is dropped rather than retried —
            // the next event for this user_key spawns a fresh dispatcher.
            warn!(user_key = %user_key, "dropped event: dispatcher exited before enqueue");
        }
    }

    fn get_or_spawn(&self, user_key: &UserKey) -> Arc<UserDispatcherHandle> {
        let _guard = self.spawn_lock.lock().unwrap();
        if let Some(existing) = self.dispatchers.get(user_key) {
            if existing.is_processing() {
                return existing.clone();
            }
        }
        let handle = Arc::new(dispatcher::spawn(
            self.inbox_capacity,
            self.idle_timeout,
            self.handlers.clone(),
            self.semaphore.clone(),
            user_key.to_string(),
        ));
        self.dispatchers.insert(user_key.clone(), handle.clone());
        handle
    }

    /// Removes dispatchers whose worker has already exited (§4.7's 60s
    /// reaper). Collected first, then removed, so the removal never races a
    /// concurrent `get_or_spawn` reinsert for the same key.
    pub fn reap(&self) {
        let dead: Vec<UserKey> = self
            .dispatchers
            .iter()
            .filter(|e| !e.value().is_processing())
            .map(|e| e.key().clone())
            .collect();
        for key in dead {
            self.dispatchers.remove_if(&key, |_, v| !v.is_processing());
        }
        debug!(remaining = self.dispatchers.len(), "dispatcher reaper swept");
    }

    pub async fn stop_all(&self) {
        for entry in self.dispatchers.iter() {
            entry.value().stop();
        }
        self.dispatchers.clear();
    }
}
