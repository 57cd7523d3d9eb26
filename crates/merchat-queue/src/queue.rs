use merchat_core::Event;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use crate::error::{QueueError, Result};

/// One enqueued event, stamped at `put` time (§4.5).
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: Uuid,
    pub event: Event,
}

/// Bounded FIFO queue backed by `tokio::sync::mpsc`: the channel is already
/// bounded and strictly FIFO, `Sender::send` already blocks the producer
/// when full, and dropping the sender already wakes every blocked receiver —
/// exactly the semantics the reference condvar-gated deque hand-rolls.
pub struct QueueProducer {
    tx: mpsc::Sender<QueueItem>,
}

pub struct QueueConsumer {
    rx: mpsc::Receiver<QueueItem>,
}

pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueProducer { tx }, QueueConsumer { rx })
}

impl QueueProducer {
    /// Blocks the caller while the queue is full. Fails once the consumer
    /// side has been dropped (equivalent to `close()`).
    pub async fn put(&self, event: Event) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.tx
            .send(QueueItem { id, event })
            .await
            .map_err(|_| QueueError::Closed)?;
        Ok(id)
    }
}

impl Clone for QueueProducer {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl QueueConsumer {
    /// Returns `None` on timeout, or immediately once the queue is closed
    /// and drained.
    pub async fn get(&mut self, wait: Duration) -> Option<QueueItem> {
        match timeout(wait, self.rx.recv()).await {
            Ok(item) => item,
            Err(_) => None,
        }
    }

    /// Waits indefinitely; returns `None` only once closed and drained.
    pub async fn get_blocking(&mut self) -> Option<QueueItem> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchat_core::{Event, EventKind, FromRole};
    use merchat_core::ids::{AccountUserId, ShopId};
    use serde_json::Value;

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
    async fn put_then_get_fifo_order() {
        let (producer, mut consumer) = bounded(4);
        producer.put(sample_event()).await.unwrap();
        let mut second = sample_event();
        second.msg_id = "m2".into();
        producer.put(second).await.unwrap();

        let first = consumer.get(Duration::from_millis(100)).await.unwrap();
        let next = consumer.get(Duration::from_millis(100)).await.unwrap();
        assert_eq!(first.event.msg_id, "m1");
        assert_eq!(next.event.msg_id, "m2");
    }

    #[tokio::test]
    async fn get_times_out_when_empty() {
        let (_producer, mut consumer) = bounded(4);
        let got = consumer.get(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn put_fails_after_consumer_dropped() {
        let (producer, consumer) = bounded(4);
        drop(consumer);
        let err = producer.put(sample_event()).await.unwrap_err();
        assert_eq!(err.code(), "QUEUE_CLOSED");
    }

    #[tokio::test]
    async fn get_returns_none_after_producer_dropped_and_drained() {
        let (producer, mut consumer) = bounded(4);
        producer.put(sample_event()).await.unwrap();
        drop(producer);
        assert!(consumer.get(Duration::from_millis(100)).await.is_some());
        assert!(consumer.get(Duration::from_millis(100)).await.is_none());
    }
}
