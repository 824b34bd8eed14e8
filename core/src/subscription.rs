//! Push delivery of recipe list snapshots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::models::Recipe;

/// The full recipe list, ordered by title, as delivered to subscribers.
pub type Snapshot = Arc<[Recipe]>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<Snapshot>>,
}

/// The set of live subscribers. Cloning shares the same set.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    inner: Arc<Mutex<Registry>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and hand it `initial` as its first snapshot.
    pub fn subscribe(&self, initial: Snapshot) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this send cannot fail.
        let _ = tx.send(initial);

        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.senders.insert(id, tx);
        tracing::trace!(subscription = id, "subscriber added");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `snapshot` to every subscriber, pruning the ones that went away.
    pub fn publish(&self, snapshot: &Snapshot) {
        let mut registry = self.lock();
        let before = registry.senders.len();
        registry
            .senders
            .retain(|_, tx| tx.send(Arc::clone(snapshot)).is_ok());
        let pruned = before - registry.senders.len();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped closed subscribers");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscriber; their `next()` calls return `None` once drained.
    pub fn clear(&self) {
        self.lock().senders.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live view of the recipe list.
///
/// Yields the snapshot current at subscription time, then one snapshot per
/// change. Dropping the subscription (or calling [`Subscription::cancel`])
/// removes it from its set.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Snapshot>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Wait for the next snapshot. `None` once the source has shut down.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Take the next snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued and return the newest snapshot, if any.
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut latest = None;
        while let Some(snapshot) = self.try_next() {
            latest = Some(snapshot);
        }
        latest
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .senders
                .remove(&self.id);
            tracing::trace!(subscription = self.id, "subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(titles: &[&str]) -> Snapshot {
        titles
            .iter()
            .map(|t| Recipe::new(*t, "", "", ""))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_initial_snapshot_is_delivered() {
        let set = SubscriberSet::new();
        let mut sub = set.subscribe(snapshot(&["Cake"]));
        let first = sub.try_next().unwrap();
        assert_eq!(first[0].title, "Cake");
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let set = SubscriberSet::new();
        let mut a = set.subscribe(snapshot(&[]));
        let mut b = set.subscribe(snapshot(&[]));
        set.publish(&snapshot(&["Pasta"]));

        assert_eq!(a.latest().unwrap()[0].title, "Pasta");
        assert_eq!(b.latest().unwrap()[0].title, "Pasta");
    }

    #[test]
    fn test_cancel_removes_subscriber() {
        let set = SubscriberSet::new();
        let a = set.subscribe(snapshot(&[]));
        let _b = set.subscribe(snapshot(&[]));
        assert_eq!(set.len(), 2);
        a.cancel();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_clear_ends_subscriptions() {
        let set = SubscriberSet::new();
        let mut sub = set.subscribe(snapshot(&[]));
        set.clear();
        assert!(set.is_empty());
        // The queued initial snapshot is still readable, then the channel is closed.
        assert!(sub.try_next().is_some());
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn test_next_returns_none_after_clear() {
        let set = SubscriberSet::new();
        let mut sub = set.subscribe(snapshot(&[]));
        sub.next().await.unwrap();
        set.clear();
        assert!(sub.next().await.is_none());
    }
}
