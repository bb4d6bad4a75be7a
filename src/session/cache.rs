use crate::identity::Identity;

/// Lifecycle of the session as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No identity cached or stored
    Absent,
    /// Identity cached in memory and mirrored in the store
    Active,
    /// Store holds a copy the cache has not loaded yet
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum Slot {
    /// Nothing known yet; the store has not been consulted
    #[default]
    Cold,
    /// Known to have no session
    Empty,
    Loaded(Identity),
}

/// Process-lifetime mirror of the logged-in identity.
///
/// Plain data with no locking of its own; the session manager serializes
/// access to it.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    slot: Slot,
}

impl SessionCache {
    /// Cache that has not consulted the store yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Identity> {
        match &self.slot {
            Slot::Loaded(identity) => Some(identity),
            Slot::Cold | Slot::Empty => None,
        }
    }

    pub fn set(&mut self, identity: Identity) {
        self.slot = Slot::Loaded(identity);
    }

    /// Record that there is no session.
    pub fn clear(&mut self) {
        self.slot = Slot::Empty;
    }

    /// Forget everything, forcing the next read to go to the store.
    pub fn evict(&mut self) {
        self.slot = Slot::Cold;
    }

    /// Whether the cache reflects the store (loaded or known empty)
    pub fn is_warm(&self) -> bool {
        !matches!(self.slot, Slot::Cold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_transitions() {
        let mut cache = SessionCache::new();
        assert!(!cache.is_warm());
        assert!(cache.get().is_none());

        cache.set(Identity::new(1, "Ana", "111"));
        assert!(cache.is_warm());
        assert_eq!(cache.get().map(|i| i.id), Some(1));

        cache.clear();
        assert!(cache.is_warm());
        assert!(cache.get().is_none());

        cache.evict();
        assert!(!cache.is_warm());
    }
}
