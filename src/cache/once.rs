//! Compute-once keyed cache
//!
//! The first caller for a key runs the initializer; callers arriving while it
//! runs block on a condition variable and receive the published value. If
//! the initializer fails or panics the in-flight marker is removed and one
//! of the waiters takes over.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

enum Slot<V> {
    Pending,
    Ready(Arc<V>),
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    /// Lookups answered by an already published value
    pub hits: u64,
    /// Initializer runs, successful or not
    pub computations: u64,
    /// Published entries
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.computations;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Thread-safe map whose values are computed at most once per key
pub struct OnceCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    ready: Condvar,
    hits: AtomicU64,
    computations: AtomicU64,
}

impl<K, V> Default for OnceCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Clears a `Pending` slot unless disarmed after a successful publish
struct PendingGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    cache: &'a OnceCache<K, V>,
    key: &'a K,
    armed: bool,
}

impl<K, V> PendingGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<K, V> Drop for PendingGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut slots = self.cache.slots.lock();
            if matches!(slots.get(self.key), Some(Slot::Pending)) {
                slots.remove(self.key);
            }
        }
        debug!(key = ?self.key, "Computation abandoned, in-flight marker cleared");
        self.cache.ready.notify_all();
    }
}

impl<K, V> OnceCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
            hits: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    /// Return the value for `key`, running `init` only if no value is
    /// published and no other caller is computing one.
    pub fn get_or_try_init<E, F>(&self, key: &K, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut slots = self.slots.lock();
        loop {
            match slots.get(key) {
                Some(Slot::Ready(value)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = ?key, "Cache hit");
                    return Ok(Arc::clone(value));
                }
                Some(Slot::Pending) => {}
                None => break,
            }
            self.ready.wait(&mut slots);
        }

        slots.insert(key.clone(), Slot::Pending);
        drop(slots);

        let guard = PendingGuard {
            cache: self,
            key,
            armed: true,
        };
        self.computations.fetch_add(1, Ordering::Relaxed);
        debug!(key = ?key, "Cache miss, computing");

        let value = Arc::new(init()?);

        self.slots.lock().insert(key.clone(), Slot::Ready(Arc::clone(&value)));
        guard.disarm();
        self.ready.notify_all();

        Ok(value)
    }

    /// Compute a fresh value and swap it in. On failure the previous value,
    /// if any, stays published.
    pub fn replace_with<E, F>(&self, key: &K, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.computations.fetch_add(1, Ordering::Relaxed);
        let value = Arc::new(init()?);
        self.slots.lock().insert(key.clone(), Slot::Ready(Arc::clone(&value)));
        self.ready.notify_all();
        Ok(value)
    }

    /// Published value for `key`, without computing
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Drop the published value for `key`. An in-flight computation is left
    /// alone and will still publish.
    pub fn invalidate(&self, key: &K) -> Option<Arc<V>> {
        let mut slots = self.slots.lock();
        if matches!(slots.get(key), Some(Slot::Ready(_))) {
            if let Some(Slot::Ready(value)) = slots.remove(key) {
                return Some(value);
            }
        }
        None
    }

    /// Drop every published value
    pub fn clear(&self) {
        self.slots.lock().retain(|_, slot| matches!(slot, Slot::Pending));
    }

    /// Number of published values
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
