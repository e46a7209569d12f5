//! Name registry used for broadcast routing.
//!
//! Maps a display name to a non-owning handle of the connection registered
//! under it. The map is only reachable through the operations below, each of
//! which holds the lock for the duration of one map access. In particular a
//! broadcast takes a snapshot and fans out after the lock is released.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Thread-safe `name → peer` mapping.
pub struct Registry<P> {
    entries: Mutex<HashMap<String, P>>,
}

impl<P: Clone> Registry<P> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `peer` under `name`.
    ///
    /// Last writer wins: an existing entry under the same name is replaced
    /// and returned.
    pub fn insert(&self, name: impl Into<String>, peer: P) -> Option<P> {
        self.entries.lock().insert(name.into(), peer)
    }

    /// Removes the entry under `name`. No-op if absent.
    pub fn remove(&self, name: &str) -> Option<P> {
        self.entries.lock().remove(name)
    }

    /// Removes the entry under `name` only if `owned` accepts it.
    ///
    /// Lets a connection deregister itself without evicting a newer
    /// connection that has since taken over the same name.
    pub fn remove_if<F>(&self, name: &str, owned: F) -> Option<P>
    where
        F: FnOnce(&P) -> bool,
    {
        let mut entries = self.entries.lock();
        if entries.get(name).is_some_and(owned) {
            entries.remove(name)
        } else {
            None
        }
    }

    /// Returns a copy of every entry except the one under `name`.
    #[must_use]
    pub fn snapshot_excluding(&self, name: &str) -> Vec<(String, P)> {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|(entry, _)| entry.as_str() != name)
            .map(|(entry, peer)| (entry.clone(), peer.clone()))
            .collect()
    }

    /// Returns true if a peer is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Returns the number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nobody is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<P: Clone> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_insert_and_contains() {
        let registry = Registry::new();
        assert!(registry.insert("alice", 1u64).is_none());

        assert!(registry.contains("alice"));
        assert!(!registry.contains("bob"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_last_writer_wins() {
        let registry = Registry::new();
        registry.insert("alice", 1u64);

        assert_eq!(registry.insert("alice", 2), Some(1));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot_excluding("bob"), vec![("alice".to_string(), 2)]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry: Registry<u64> = Registry::new();
        assert!(registry.remove("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_if_respects_owner() {
        let registry = Registry::new();
        registry.insert("alice", 1u64);
        registry.insert("alice", 2u64);

        // The displaced owner leaving must not evict its successor
        assert!(registry.remove_if("alice", |p| *p == 1).is_none());
        assert!(registry.contains("alice"));

        assert_eq!(registry.remove_if("alice", |p| *p == 2), Some(2));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_excludes_caller() {
        let registry = Registry::new();
        registry.insert("alice", 1u64);
        registry.insert("bob", 2u64);
        registry.insert("carol", 3u64);

        let mut snapshot = registry.snapshot_excluding("bob");
        snapshot.sort();
        assert_eq!(
            snapshot,
            vec![("alice".to_string(), 1), ("carol".to_string(), 3)]
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = Registry::new();
        registry.insert("alice", 1u64);

        let snapshot = registry.snapshot_excluding("bob");
        registry.remove("alice");

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_does_not_hold_lock() {
        let registry = Registry::new();
        registry.insert("alice", 1u64);

        for (name, _) in registry.snapshot_excluding("bob") {
            // Re-entering the registry while iterating must not deadlock
            registry.insert(format!("{name}-2"), 2);
        }
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_insert_remove() {
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..100u64 {
                        let name = format!("user-{t}-{i}");
                        registry.insert(name.clone(), t);
                        let _ = registry.snapshot_excluding(&name);
                        if i % 2 == 0 {
                            registry.remove(&name);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 50);
    }
}
