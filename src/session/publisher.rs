use crate::identity::Identity;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

/// Token returned by [`IdentityPublisher::subscribe`]
pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

/// Propagates identity changes to interested consumers.
///
/// A new subscriber is called immediately with the current state, then once
/// per change. Publishing a value equal to the current one is coalesced away.
/// Callbacks run on the publishing task and must not call back into the
/// publisher.
pub struct IdentityPublisher {
    current: watch::Sender<Option<Identity>>,
    subscribers: DashMap<SubscriptionId, Callback>,
    next_id: AtomicU64,
    delivery: Mutex<()>,
}

impl IdentityPublisher {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            delivery: Mutex::new(()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::new(callback);
        self.subscribers.insert(id, Arc::clone(&callback));

        let snapshot = self.current.borrow().clone();
        callback(snapshot.as_ref());
        debug!("Identity subscriber {} registered", id);
        id
    }

    /// Returns `false` when the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Receiver for async consumers; always holds the latest state.
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Publish a new state. Returns whether subscribers were notified.
    pub fn publish(&self, identity: Option<Identity>) -> bool {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        let changed = self.current.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity.clone();
                true
            }
        });
        if !changed {
            return false;
        }

        let callbacks: Vec<Callback> = self
            .subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        debug!(
            "Publishing identity change to {} subscribers",
            callbacks.len()
        );
        for callback in callbacks {
            callback(identity.as_ref());
        }
        true
    }
}

impl Default for IdentityPublisher {
    fn default() -> Self {
        Self::new()
    }
}
