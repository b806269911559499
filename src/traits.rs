//! # Cache Trait Hierarchy
//!
//! Generic seams for code that should not care which cache it is driving.
//!
//! ```text
//!   ┌─────────────────────────────────────┐
//!   │        ReadOnlyCache<K, V>          │
//!   │  contains(&, &K) → bool             │
//!   │  len(&) → usize                     │
//!   │  is_empty(&) → bool                 │
//!   │  capacity(&) → usize                │
//!   └──────────────────┬──────────────────┘
//!                      ▼
//!   ┌─────────────────────────────────────┐
//!   │          CoreCache<K, V>            │
//!   │  insert(&mut, K, V) → Option<V>     │
//!   │  get(&mut, &K) → Option<&V>         │
//!   │  clear(&mut)                        │
//!   └──────────────────┬──────────────────┘
//!                      ▼
//!   ┌─────────────────────────────────────┐
//!   │         MutableCache<K, V>          │
//!   │  remove(&mut, &K) → Option<V>       │
//!   │  remove_batch(&mut, &[K])           │
//!   └─────────────────────────────────────┘
//!
//!   ConcurrentCache: Send + Sync marker for lock-wrapped handles
//! ```
//!
//! `get` takes `&mut self` throughout: in an admission-controlled cache every
//! read updates recency and frequency state.
//!
//! `insert` is a plain upsert. It carries no expiry or eviction callback; use
//! [`TinyLfuCache::set`](crate::TinyLfuCache::set) with an
//! [`Item`](crate::Item) for those.

/// Inspection without side effects.
pub trait ReadOnlyCache<K, V> {
    /// Returns `true` if `key` is present and live.
    fn contains(&self, key: &K) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;
}

/// Operations every cache supports.
pub trait CoreCache<K, V>: ReadOnlyCache<K, V> {
    /// Inserts or replaces `key`, returning the previous live value.
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    /// Returns the value for `key`, recording the access.
    fn get(&mut self, key: &K) -> Option<&V>;

    fn clear(&mut self);
}

/// Adds removal by key.
pub trait MutableCache<K, V>: CoreCache<K, V> {
    fn remove(&mut self, key: &K) -> Option<V>;

    fn remove_batch(&mut self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.remove(k)).collect()
    }
}

/// Marker for cache handles that are safe to share across threads.
pub trait ConcurrentCache: Send + Sync {}
