//! Advisory locks keyed by entity kind and id
//!
//! Two updates of the same entity must not interleave their
//! read-diff-write sequences. Holders of the same key wait for each other;
//! different keys never block.

use graphkit::EntityKind;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

type Key = (EntityKind, String);

/// Registry of held entity locks
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: Mutex<HashSet<Key>>,
    released: Condvar,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<Key>> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Block until the lock for `(kind, id)` is free, then take it.
    ///
    /// The lock is released when the returned guard is dropped. Locks are
    /// not reentrant: acquiring a key twice on one thread deadlocks.
    pub fn acquire(&self, kind: EntityKind, id: &str) -> LockGuard<'_> {
        let key = (kind, id.to_string());
        let mut held = self.held();
        while held.contains(&key) {
            log::trace!("waiting for lock on {kind} {id}");
            held = match self.released.wait(held) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        held.insert(key.clone());
        LockGuard {
            registry: self,
            key,
        }
    }

    /// Whether `(kind, id)` is currently held
    pub fn is_held(&self, kind: EntityKind, id: &str) -> bool {
        self.held().contains(&(kind, id.to_string()))
    }
}

/// Scoped ownership of one entity lock
#[derive(Debug)]
pub struct LockGuard<'a> {
    registry: &'a LockRegistry,
    key: Key,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.registry.held().remove(&self.key);
        self.registry.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = LockRegistry::new();
        {
            let _guard = locks.acquire(EntityKind::Group, "g1");
            assert!(locks.is_held(EntityKind::Group, "g1"));
        }
        assert!(!locks.is_held(EntityKind::Group, "g1"));
    }

    #[test]
    fn test_different_keys_do_not_block() {
        let locks = LockRegistry::new();
        let _a = locks.acquire(EntityKind::Group, "g1");
        let _b = locks.acquire(EntityKind::Group, "g2");
        let _c = locks.acquire(EntityKind::Application, "g1");
        assert!(locks.is_held(EntityKind::Application, "g1"));
    }

    #[test]
    fn test_same_key_is_serialized() {
        let locks = Arc::new(LockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.acquire(EntityKind::Group, "g1");
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!locks.is_held(EntityKind::Group, "g1"));
    }
}
