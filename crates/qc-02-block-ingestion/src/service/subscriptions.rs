//! # Subscription Registry
//!
//! Remote listeners of the `block/block` event. Mutation is rare, so a
//! single mutex is enough.

use crate::ports::inbound::{BlockNotification, BlockSubscriber, BLOCK_EVENT};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Ordered set of subscribers per published event.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    block: Mutex<Vec<BlockSubscriber>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber` to `event`. Re-subscribing the same handle is ignored.
    pub fn subscribe(&self, event: &str, subscriber: BlockSubscriber) {
        if event != BLOCK_EVENT {
            warn!("[qc-02] subscribe to unknown event: {}", event);
            return;
        }
        let mut subscribers = self.block.lock();
        if !subscribers.contains(&subscriber) {
            subscribers.push(subscriber.clone());
        }
        info!(
            "[qc-02] {} subscribe: {} total: {}",
            subscriber.remote_address(),
            event,
            subscribers.len()
        );
    }

    /// Remove `subscriber` from `event`. Unknown handles are a no-op.
    pub fn unsubscribe(&self, event: &str, subscriber: &BlockSubscriber) {
        if event != BLOCK_EVENT {
            return;
        }
        let mut subscribers = self.block.lock();
        subscribers.retain(|s| s != subscriber);
        info!(
            "[qc-02] {} unsubscribe: {} total: {}",
            subscriber.remote_address(),
            event,
            subscribers.len()
        );
    }

    /// Number of `block/block` subscribers.
    pub fn len(&self) -> usize {
        self.block.lock().len()
    }

    /// True if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        self.block.lock().clear();
    }

    /// Deliver `notification` to every subscriber once, pruning closed ones.
    pub fn broadcast(&self, notification: &BlockNotification) -> usize {
        let mut subscribers = self.block.lock();
        subscribers.retain(|s| s.notify(notification.clone()));
        subscribers.len()
    }
}
