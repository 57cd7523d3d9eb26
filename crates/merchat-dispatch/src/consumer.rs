use std::sync::Arc;
use std::time::Duration;

use merchat_core::ids::UserKey;
use merchat_core::{Account, Event, Handler, RoutingPolicy};
use merchat_platform::PlatformClient;
use merchat_queue::QueueConsumer;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::immediate::handle_immediate;
use crate::registry::DispatcherRegistry;

/// Owns one account's queue (§4.7): applies routing policy to every item,
/// handling `Immediate` events inline and fanning `Queued` events out to
/// per-user dispatchers. Runs until the queue closes or it is cancelled.
pub struct Consumer {
    account: Account,
    platform: Arc<PlatformClient>,
    registry: Arc<DispatcherRegistry>,
    queue: QueueConsumer,
    cancel: CancellationToken,
    reaper_interval: Duration,
}

impl Consumer {
    pub fn new(
        account: Account,
        platform: Arc<PlatformClient>,
        registry: Arc<DispatcherRegistry>,
        queue: QueueConsumer,
        cancel: CancellationToken,
        reaper_interval: Duration,
    ) -> Self {
        Self { account, platform, registry, queue, cancel, reaper_interval }
    }

    #[instrument(skip(self), fields(channel = %self.account.channel, shop_id = %self.account.shop_id, account_user_id = %self.account.account_user_id))]
    pub async fn run(mut self) {
        let reaper_cancel = self.cancel.clone();
        let reaper_registry = self.registry.clone();
        let reaper_interval = self.reaper_interval;
        let reaper = tokio::spawn(async move {
            let mut tick = interval(reaper_interval);
            loop {
                tokio::select! {
                    _ = reaper_cancel.cancelled() => break,
                    _ = tick.tick() => reaper_registry.reap(),
                }
            }
        });

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                item = self.queue.get_blocking() => {
                    match item {
                        Some(item) => self.dispatch_one(item.event).await,
                        None => break,
                    }
                }
            }
        }

        self.registry.stop_all().await;
        reaper.abort();
        debug!("consumer stopped");
    }

    async fn dispatch_one(&self, event: Event) {
        match event.kind.routing_policy() {
            RoutingPolicy::Dropped => {
                debug!(kind = ?event.kind, "dropping unrecognized event");
            }
            RoutingPolicy::Immediate => {
                handle_immediate(&self.platform, &self.account, &event).await;
            }
            RoutingPolicy::Queued => {
                let user_key = UserKey::new(&event.shop_id, &event.from_uid);
                self.registry.add(user_key, event).await;
            }
        }
    }
}

pub fn build_handlers(handlers: Vec<Arc<dyn Handler>>) -> Arc<Vec<Arc<dyn Handler>>> {
    Arc::new(handlers)
}
