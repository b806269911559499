//! Thread-safe wrapper around [`TinyLfuCache`].
//!
//! Every operation, `get` included, takes the same exclusive lock: a hit
//! reorders lists, may promote between segments and bumps the sketch, so
//! there is no read-only path to share.
//!
//! Eviction callbacks are collected while the lock is held and invoked after
//! it is released. A callback may therefore call back into the cache.

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::builder::TinyLfuBuilder;
use crate::error::{ConfigError, KeyAlreadyExists};
use crate::hash::DefaultFingerprinter;
use crate::traits::ConcurrentCache;

#[cfg(feature = "metrics")]
use super::TinyLfuMetrics;
use super::item::{run_callbacks, Item};
use super::TinyLfuCache;

/// Shared, mutex-guarded [`TinyLfuCache`]. Cloning yields another handle to
/// the same cache.
///
/// # Example
///
/// ```
/// use std::thread;
/// use tinylfu::{ConcurrentTinyLfuCache, Item};
///
/// let cache = ConcurrentTinyLfuCache::new(1_000, 10_000);
///
/// let handles: Vec<_> = (0..4u64)
///     .map(|t| {
///         let cache = cache.clone();
///         thread::spawn(move || {
///             for i in 0..100 {
///                 cache.set(Item::new(t * 1_000 + i, i));
///             }
///         })
///     })
///     .collect();
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert!(cache.len() <= 1_000);
/// assert_eq!(cache.get(&3_099), Some(99));
/// ```
pub struct ConcurrentTinyLfuCache<K, V, S = DefaultFingerprinter> {
    inner: Arc<Mutex<TinyLfuCache<K, V, S>>>,
}

impl<K, V, S> Clone for ConcurrentTinyLfuCache<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, S> From<TinyLfuCache<K, V, S>> for ConcurrentTinyLfuCache<K, V, S> {
    fn from(cache: TinyLfuCache<K, V, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }
}

impl<K, V> ConcurrentTinyLfuCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates a concurrent cache.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `samples` is zero. For a non-panicking
    /// alternative, use [`try_new`](Self::try_new).
    pub fn new(capacity: usize, samples: usize) -> Self {
        Self::from(TinyLfuCache::new(capacity, samples))
    }

    /// Creates a concurrent cache, returning an error on invalid parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` or `samples` is zero.
    pub fn try_new(capacity: usize, samples: usize) -> Result<Self, ConfigError> {
        TinyLfuCache::try_new(capacity, samples).map(Self::from)
    }

    /// Returns a builder; finish with
    /// [`build_concurrent`](TinyLfuBuilder::build_concurrent).
    pub fn builder(capacity: usize) -> TinyLfuBuilder<K, V> {
        TinyLfuBuilder::new(capacity)
    }
}

impl<K, V, S> ConcurrentTinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    /// Returns a clone of the value for `key`, recording the access.
    ///
    /// For non-cloneable values, use [`get_with`](Self::get_with).
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Records an access to `key` and applies `f` to its value under the lock.
    ///
    /// # Example
    ///
    /// ```
    /// use tinylfu::{ConcurrentTinyLfuCache, Item};
    ///
    /// let cache = ConcurrentTinyLfuCache::new(10, 100);
    /// cache.set(Item::new("key", vec![1, 2, 3]));
    ///
    /// assert_eq!(cache.get_with(&"key", |v| v.len()), Some(3));
    /// ```
    pub fn get_with<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        let mut evicted = Vec::new();
        let result = {
            let mut guard = self.inner.lock();
            let id = guard.get_deferred(key, Instant::now(), &mut evicted);
            id.and_then(|id| guard.value(id)).map(f)
        };
        run_callbacks(evicted);
        result
    }

    /// Inserts or replaces an item.
    pub fn set(&self, item: Item<K, V>) {
        let mut evicted = Vec::new();
        self.inner
            .lock()
            .set_deferred(item, Instant::now(), &mut evicted);
        run_callbacks(evicted);
    }

    /// Inserts an item only if its key is not already live.
    ///
    /// # Errors
    ///
    /// Returns [`KeyAlreadyExists`] if the key is resident and not expired.
    pub fn add(&self, item: Item<K, V>) -> Result<(), KeyAlreadyExists> {
        let mut evicted = Vec::new();
        let result = self
            .inner
            .lock()
            .add_deferred(item, Instant::now(), &mut evicted);
        run_callbacks(evicted);
        result
    }

    /// Removes `key`, returning its value if it was live.
    pub fn delete(&self, key: &K) -> Option<V> {
        let mut evicted = Vec::new();
        let value = self
            .inner
            .lock()
            .delete_deferred(key, Instant::now(), &mut evicted);
        run_callbacks(evicted);
        value
    }

    /// Returns a clone of the value without recording an access.
    pub fn peek(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.lock().peek(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn estimate(&self, key: &K) -> u8 {
        self.inner.lock().estimate(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// Removes every entry; callbacks run after the lock is released.
    pub fn clear(&self) {
        let mut evicted = Vec::new();
        self.inner.lock().clear_deferred(&mut evicted);
        run_callbacks(evicted);
    }

    /// Returns a copy of the current metrics.
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> TinyLfuMetrics {
        self.inner.lock().metrics().clone()
    }

    /// Resets performance metrics to zero.
    #[cfg(feature = "metrics")]
    pub fn reset_metrics(&self) {
        self.inner.lock().reset_metrics();
    }
}

impl<K, V, S> std::fmt::Debug for ConcurrentTinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentTinyLfuCache")
            .field("inner", &*self.inner.lock())
            .finish()
    }
}

impl<K, V, S> ConcurrentCache for ConcurrentTinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Send + Sync,
    S: Send + Sync,
{
}
