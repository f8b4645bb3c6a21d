//! Change-notification channel
//!
//! Per-account stream of `{table, operation}` signals. No row payload is
//! carried; receivers treat every event as "something changed".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::message::ChangeEvent;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// Default per-account channel capacity
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    /// Subscribe to change events for one account.
    ///
    /// Dropping the receiver releases the subscription.
    async fn subscribe(&self, account_id: &str) -> Result<broadcast::Receiver<ChangeEvent>, StoreError>;
}

/// In-process change feed: one broadcast channel per account
#[derive(Debug, Clone)]
pub struct MemoryChangeFeed {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>>,
    capacity: usize,
    unavailable: Arc<Mutex<bool>>,
}

impl MemoryChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            unavailable: Arc::new(Mutex::new(false)),
        }
    }

    fn sender(&self, account_id: &str) -> broadcast::Sender<ChangeEvent> {
        self.channels
            .lock()
            .entry(account_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event to every subscriber of `account_id`
    ///
    /// Returns the number of receivers reached.
    pub fn publish(&self, account_id: &str, event: ChangeEvent) -> usize {
        let sender = self.channels.lock().get(account_id).cloned();
        match sender {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Live subscriptions for `account_id`
    pub fn subscriber_count(&self, account_id: &str) -> usize {
        self.channels
            .lock()
            .get(account_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Make subsequent `subscribe` calls fail
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }
}

impl Default for MemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for MemoryChangeFeed {
    async fn subscribe(&self, account_id: &str) -> Result<broadcast::Receiver<ChangeEvent>, StoreError> {
        if *self.unavailable.lock() {
            return Err(StoreError::network("realtime channel unavailable"));
        }
        Ok(self.sender(account_id).subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::{ChangeOperation, ChangeTable};

    #[tokio::test]
    async fn test_events_are_scoped_per_account() {
        let feed = MemoryChangeFeed::new();
        let mut a = feed.subscribe("acc-a").await.unwrap();
        let mut b = feed.subscribe("acc-b").await.unwrap();

        let event = ChangeEvent::new(ChangeTable::Members, ChangeOperation::Insert);
        assert_eq!(feed.publish("acc-a", event), 1);

        assert_eq!(a.recv().await.unwrap(), event);
        assert!(matches!(b.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_subscriber_count_tracks_drops() {
        let feed = MemoryChangeFeed::new();
        assert_eq!(feed.subscriber_count("acc"), 0);
        let rx = feed.subscribe("acc").await.unwrap();
        assert_eq!(feed.subscriber_count("acc"), 1);
        drop(rx);
        assert_eq!(feed.subscriber_count("acc"), 0);
    }

    #[tokio::test]
    async fn test_unavailable_feed() {
        let feed = MemoryChangeFeed::new();
        feed.set_unavailable(true);
        assert!(feed.subscribe("acc").await.is_err());
    }
}
