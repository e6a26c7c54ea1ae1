//! Push channel subscriber registry.
//!
//! A [`PushRegistry`] is owned by a connection and shared with whoever
//! drives the realtime socket. Subscribers (typically monitors) register a
//! weak reference; the registry never keeps a subscriber alive. Dropped
//! subscribers are pruned on the next dispatch.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A signal received on the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSignal {
    /// The socket connected.
    Connected,
    /// The socket reported an error.
    Error(String),
    /// Events were changed on the server.
    EventsChanged,
    /// Streams were changed on the server.
    StreamsChanged,
}

/// Receiver of push signals.
pub trait PushSubscriber: Send + Sync {
    /// Handle a signal. Must not block.
    fn on_push(self: Arc<Self>, signal: &PushSignal);
}

/// Handle returned by [`PushRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of push subscribers.
#[derive(Default)]
pub struct PushRegistry {
    subscribers: DashMap<SubscriptionId, Weak<dyn PushSubscriber>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for PushRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistry")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl PushRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    pub fn subscribe(&self, subscriber: Weak<dyn PushSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.insert(id, subscriber);

        tracing::debug!(
            "Push subscriber added: {:?} (total: {})",
            id,
            self.subscribers.len()
        );
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.remove(&id).is_some() {
            tracing::debug!(
                "Push subscriber removed: {:?} (remaining: {})",
                id,
                self.subscribers.len()
            );
        }
    }

    /// Number of registered subscribers, including not yet pruned dead ones.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is registered. The socket may then disconnect.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `signal` to every live subscriber and prune dead ones.
    ///
    /// Returns the number of subscribers reached.
    pub fn dispatch(&self, signal: &PushSignal) -> usize {
        let mut live = Vec::new();
        let mut dead = Vec::new();

        // Collect first so no map shard is locked while subscribers run
        for entry in self.subscribers.iter() {
            match entry.value().upgrade() {
                Some(subscriber) => live.push(subscriber),
                None => dead.push(*entry.key()),
            }
        }

        for id in dead {
            self.subscribers.remove(&id);
        }

        let reached = live.len();
        for subscriber in live {
            subscriber.on_push(signal);
        }

        tracing::debug!("Dispatched {:?} to {} subscribers", signal, reached);
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        signals: Mutex<Vec<PushSignal>>,
    }

    impl PushSubscriber for Recorder {
        fn on_push(self: Arc<Self>, signal: &PushSignal) {
            self.signals.lock().unwrap().push(signal.clone());
        }
    }

    fn register(registry: &PushRegistry) -> (Arc<Recorder>, SubscriptionId) {
        let recorder = Arc::new(Recorder::default());
        let weak = Arc::downgrade(&recorder) as Weak<dyn PushSubscriber>;
        let id = registry.subscribe(weak);
        (recorder, id)
    }

    #[test]
    fn dispatch_reaches_live_subscribers() {
        let registry = PushRegistry::new();
        let (a, _) = register(&registry);
        let (b, _) = register(&registry);

        let reached = registry.dispatch(&PushSignal::EventsChanged);

        assert_eq!(reached, 2);
        assert_eq!(*a.signals.lock().unwrap(), vec![PushSignal::EventsChanged]);
        assert_eq!(*b.signals.lock().unwrap(), vec![PushSignal::EventsChanged]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = PushRegistry::new();
        let (a, id) = register(&registry);

        registry.unsubscribe(id);
        registry.dispatch(&PushSignal::StreamsChanged);

        assert!(a.signals.lock().unwrap().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let registry = PushRegistry::new();
        let (a, _) = register(&registry);
        let (b, _) = register(&registry);
        drop(b);

        assert_eq!(registry.len(), 2);
        let reached = registry.dispatch(&PushSignal::Connected);

        assert_eq!(reached, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(a.signals.lock().unwrap().len(), 1);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let registry = PushRegistry::new();
        let (_a, id1) = register(&registry);
        let (_b, id2) = register(&registry);
        assert_ne!(id1, id2);
    }
}
