use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use merchat_core::{Event, Handler};
use merchat_queue::{bounded, QueueProducer};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One serialized worker per `user_key` (§4.6): handlers for the same user
/// always run strictly one-at-a-time and in arrival order, while distinct
/// users' dispatchers run concurrently up to the consumer's semaphore.
pub struct UserDispatcherHandle {
    producer: QueueProducer,
    is_processing: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl UserDispatcherHandle {
    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::Acquire)
    }

    pub async fn enqueue(&self, event: Event) -> bool {
        self.producer.put(event).await.is_ok()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Spawns the worker loop for one `user_key`. Returns immediately with a
/// handle; the queue/worker task are both owned by the handle's lifetime.
pub fn spawn(
    inbox_capacity: usize,
    idle_timeout: Duration,
    handlers: Arc<Vec<Arc<dyn Handler>>>,
    semaphore: Arc<Semaphore>,
    label: String,
) -> UserDispatcherHandle {
    let (producer, mut consumer) = bounded(inbox_capacity);
    let is_processing = Arc::new(AtomicBool::new(true));
    let cancel = CancellationToken::new();

    let worker_cancel = cancel.clone();
    let worker_flag = is_processing.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = worker_cancel.cancelled() => break,
                item = consumer.get(idle_timeout) => {
                    match item {
                        Some(item) => {
                            let _permit = semaphore.acquire().await;
                            for handler in handlers.iter() {
                                if handler.accepts(&item.event) {
                                    if let Err(e) = handler.handle(&item.event).await {
                                        warn!(handler = handler.name(), error = %e, user_key = %label, "handler failed");
                                    }
                                    break;
                                }
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        worker_flag.store(false, Ordering::Release);
    });

    UserDispatcherHandle { producer, is_processing, cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use merchat_core::ids::{AccountUserId, ShopId};
    use merchat_core::{EventKind, FromRole};
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for CountingHandler {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn accepts(&self, _event: &Event) -> bool {
            true
        }
        async fn handle(&self, _event: &Event) -> merchat_core::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event {
            kind: EventKind::Text { text: "hi".into() },
            msg_id: "m1".into(),
            from_role: FromRole::User,
            from_uid: "U1".into(),
            to_uid: "CS1".into(),
            nickname: None,
            timestamp: 0,
            shop_id: ShopId::new("shop1"),
            account_user_id: AccountUserId::new("acc1"),
            raw: Value::Null,
        }
    }

    #[tokio::test]
    async fn processes_events_and_clears_on_idle() {
        let count = Arc::new(AtomicUsize::new(0));
        let handlers: Arc<Vec<Arc<dyn Handler>>> = Arc::new(vec![Arc::new(CountingHandler(count.clone()))]);
        let semaphore = Arc::new(Semaphore::new(4));

        let handle = spawn(8, Duration::from_millis(50), handlers, semaphore, "shop1:U1".into());
        assert!(handle.enqueue(sample_event()).await);
        assert!(handle.enqueue(sample_event()).await);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!handle.is_processing());
    }
}
