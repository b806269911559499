//! Cache items and their in-arena representation.

use std::fmt;
use std::time::{Duration, Instant};

use crate::ds::SlotId;

/// Callback invoked once when an item leaves the cache.
///
/// Fires on delete, on lazy expiry reaping, on policy eviction and on
/// `clear`. It does not fire when a `set` replaces the item under the same key.
pub type EvictionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A caller-supplied cache entry.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tinylfu::Item;
///
/// let evictions = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&evictions);
///
/// let item = Item::new("session:42", vec![1u8, 2, 3])
///     .ttl(Duration::from_secs(30))
///     .on_evict(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     });
/// assert!(item.expire_at.is_some());
/// ```
pub struct Item<K, V> {
    pub key: K,
    pub value: V,
    /// Absolute expiry; `None` never expires.
    pub expire_at: Option<Instant>,
    pub on_evict: Option<EvictionCallback>,
}

impl<K, V> Item<K, V> {
    /// Creates a non-expiring item without an eviction callback.
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            expire_at: None,
            on_evict: None,
        }
    }

    /// Sets an absolute expiry instant.
    pub fn expire_at(mut self, at: Instant) -> Self {
        self.expire_at = Some(at);
        self
    }

    /// Sets the expiry relative to now. A TTL too large to represent never expires.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.expire_at = Instant::now().checked_add(ttl);
        self
    }

    /// Registers a callback fired when the item leaves the cache.
    pub fn on_evict<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_evict = Some(Box::new(f));
        self
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Item<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("expire_at", &self.expire_at)
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

/// An item as stored in the cache, with its precomputed fingerprint.
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) expire_at: Option<Instant>,
    pub(crate) on_evict: Option<EvictionCallback>,
    pub(crate) fingerprint: u64,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(item: Item<K, V>, fingerprint: u64) -> Self {
        Self {
            key: item.key,
            value: item.value,
            expire_at: item.expire_at,
            on_evict: item.on_evict,
            fingerprint,
        }
    }

    #[inline]
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|at| now > at)
    }
}

/// Which list currently links a node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Window,
    Probation,
    Protected,
}

/// Arena slot: one entry plus its list links.
pub(crate) struct Node<K, V> {
    pub(crate) prev: Option<SlotId>,
    pub(crate) next: Option<SlotId>,
    pub(crate) segment: Segment,
    pub(crate) entry: Entry<K, V>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn detached(entry: Entry<K, V>, segment: Segment) -> Self {
        Self {
            prev: None,
            next: None,
            segment,
            entry,
        }
    }
}

/// Invokes every collected callback, in collection order.
pub(crate) fn run_callbacks(callbacks: Vec<EvictionCallback>) {
    for callback in callbacks {
        callback();
    }
}
