//! W-TinyLFU cache: admission-controlled replacement with a recency window.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          TinyLfuCache<K, V, S>                         │
//!   │                                                                        │
//!   │   map: FxHashMap<K, SlotId>        arena: SlotArena<Node<K, V>>        │
//!   │                                                                        │
//!   │   ┌──────────┐  evictee   ┌─────────────┐ victim ┌────────────────┐    │
//!   │   │  WINDOW  │ ─────────► │  ADMISSION  │ ◄───── │   PROBATION    │    │
//!   │   │  (LRU)   │            │ doorkeeper  │        │  (main, LRU)   │    │
//!   │   │  ~1%     │            │ + sketch    │ admit  │  ~20% of main  │    │
//!   │   └──────────┘            └─────────────┘ ─────► └───────┬────────┘    │
//!   │        ▲                                           hit   │  ▲ demote   │
//!   │   new keys                                               ▼  │          │
//!   │                                                  ┌────────────────┐    │
//!   │                                                  │   PROTECTED    │    │
//!   │                                                  │  ~80% of main  │    │
//!   │                                                  └────────────────┘    │
//!   │                                                                        │
//!   │   sketch: FrequencySketch (4-bit count-min, halved every `samples`)    │
//!   │   doorkeeper: Doorkeeper   (Bloom filter, cleared with the sketch)     │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Admission
//!
//! A new key always enters the window. When the window is full its LRU entry
//! becomes the *challenger*. If the main cache has room the challenger moves
//! in directly. Otherwise:
//!
//! 1. A challenger the doorkeeper has not seen since the last reset is
//!    discarded.
//! 2. Otherwise the challenger is admitted only if its estimated frequency is
//!    strictly greater than the probation LRU's (the *victim*). The victim's
//!    slot is reused for the challenger.
//!
//! Ties favour the incumbent.
//!
//! ## Aging
//!
//! Every `get` ticks a sample counter and increments the sketch, on hit or
//! miss. When the counter reaches `samples`, the sketch is halved, the
//! doorkeeper is cleared and the counter restarts.
//!
//! ## Eviction callbacks
//!
//! An [`Item`] may carry an `on_evict` callback. It fires exactly once when the
//! entry leaves the cache through `delete`, lazy expiry, policy eviction or
//! `clear`. Replacing an entry with `set` keeps the stored callback unless the
//! new item brings its own, in which case the replaced one fires. Callbacks
//! run after the cache state is consistent again.
//!
//! ## Example
//!
//! ```
//! use tinylfu::{Item, TinyLfuCache};
//!
//! let mut cache = TinyLfuCache::new(100, 1_000);
//!
//! cache.set(Item::new("a", 1));
//! assert_eq!(cache.get(&"a"), Some(&1));
//!
//! assert!(cache.add(Item::new("a", 2)).is_err());
//! assert_eq!(cache.delete(&"a"), Some(1));
//! assert!(cache.is_empty());
//! ```

#[cfg(feature = "concurrency")]
pub mod concurrent;
pub mod item;
mod list;
mod main_cache;
mod window;

use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::builder::{Layout, TinyLfuBuilder};
use crate::ds::{Doorkeeper, FrequencySketch, SlotArena, SlotId};
use crate::error::{ConfigError, KeyAlreadyExists};
use crate::hash::{fingerprint, DefaultFingerprinter};
use crate::traits::{CoreCache, MutableCache, ReadOnlyCache};

#[cfg(feature = "concurrency")]
pub use concurrent::ConcurrentTinyLfuCache;
pub use item::{EvictionCallback, Item};

use item::{run_callbacks, Entry, Node, Segment};
#[cfg(feature = "metrics")]
use main_cache::MainAccess;
use main_cache::MainCache;
use window::WindowCache;

/// Operation counters for a [`TinyLfuCache`].
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct TinyLfuMetrics {
    /// Gets that returned a value.
    pub hits: u64,
    /// Gets that found nothing, including expired entries.
    pub misses: u64,
    /// Expired entries reaped lazily.
    pub expirations: u64,
    /// New keys written into the window.
    pub inserts: u64,
    /// Sets on a live resident key.
    pub updates: u64,
    /// Adds rejected with `KeyAlreadyExists`.
    pub add_conflicts: u64,
    /// Entries pushed out of the window.
    pub window_evictions: u64,
    /// Window evictees moved into probation.
    pub admissions: u64,
    /// Window evictees discarded on first sighting.
    pub doorkeeper_rejections: u64,
    /// Window evictees that lost the frequency comparison.
    pub frequency_rejections: u64,
    /// Probation victims displaced by an admitted challenger.
    pub main_evictions: u64,
    /// Probation to protected moves.
    pub promotions: u64,
    /// Protected to probation moves.
    pub demotions: u64,
    /// Live entries removed by `delete`.
    pub deletes: u64,
    /// Sketch halvings.
    pub aging_resets: u64,
}

#[cfg(feature = "metrics")]
impl std::fmt::Display for TinyLfuMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total_accesses = self.hits + self.misses;
        let hit_rate = if total_accesses > 0 {
            (self.hits as f64 / total_accesses as f64) * 100.0
        } else {
            0.0
        };

        write!(
            f,
            "TinyLfuMetrics {{ hits: {}, misses: {}, hit_rate: {:.2}%, expirations: {}, \
             inserts: {}, updates: {}, add_conflicts: {}, window_evictions: {}, admissions: {}, \
             doorkeeper_rejections: {}, frequency_rejections: {}, main_evictions: {}, \
             promotions: {}, demotions: {}, deletes: {}, aging_resets: {} }}",
            self.hits,
            self.misses,
            hit_rate,
            self.expirations,
            self.inserts,
            self.updates,
            self.add_conflicts,
            self.window_evictions,
            self.admissions,
            self.doorkeeper_rejections,
            self.frequency_rejections,
            self.main_evictions,
            self.promotions,
            self.demotions,
            self.deletes,
            self.aging_resets
        )
    }
}

/// Single-threaded W-TinyLFU cache.
///
/// All operations, including [`get`](Self::get), take `&mut self`: a hit
/// reorders lists and feeds the frequency sketch. For shared use wrap it in
/// [`ConcurrentTinyLfuCache`].
///
/// `S` derives key fingerprints for the sketch and the doorkeeper; see
/// [`crate::hash`].
pub struct TinyLfuCache<K, V, S = DefaultFingerprinter> {
    arena: SlotArena<Node<K, V>>,
    map: FxHashMap<K, SlotId>,
    window: WindowCache,
    main: MainCache,
    sketch: FrequencySketch,
    doorkeeper: Doorkeeper,
    hasher: S,
    /// Gets between aging resets.
    samples: usize,
    /// Gets since the last aging reset.
    ticks: usize,
    capacity: usize,
    #[cfg(feature = "metrics")]
    metrics: TinyLfuMetrics,
}

impl<K, V> TinyLfuCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates a cache holding at most `capacity` entries that ages its
    /// frequency estimates every `samples` gets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `samples` is zero. For a non-panicking
    /// alternative, use [`try_new`](Self::try_new).
    pub fn new(capacity: usize, samples: usize) -> Self {
        match Self::try_new(capacity, samples) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a cache, returning an error on invalid parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` or `samples` is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use tinylfu::TinyLfuCache;
    ///
    /// assert!(TinyLfuCache::<String, u32>::try_new(0, 100).is_err());
    /// assert!(TinyLfuCache::<String, u32>::try_new(100, 1_000).is_ok());
    /// ```
    pub fn try_new(capacity: usize, samples: usize) -> Result<Self, ConfigError> {
        Self::builder(capacity).samples(samples).try_build()
    }

    /// Returns a builder for tuning segment ratios, the doorkeeper and the
    /// fingerprint strategy.
    pub fn builder(capacity: usize) -> TinyLfuBuilder<K, V> {
        TinyLfuBuilder::new(capacity)
    }
}

impl<K, V, S> TinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn with_layout(layout: Layout, doorkeeper: Doorkeeper, hasher: S) -> Self {
        Self {
            arena: SlotArena::with_capacity(layout.capacity),
            map: FxHashMap::with_capacity_and_hasher(layout.capacity, Default::default()),
            window: WindowCache::new(layout.window),
            main: MainCache::new(layout.probation, layout.protected),
            sketch: FrequencySketch::new(layout.capacity),
            doorkeeper,
            hasher,
            samples: layout.samples,
            ticks: 0,
            capacity: layout.capacity,
            #[cfg(feature = "metrics")]
            metrics: TinyLfuMetrics::default(),
        }
    }

    /// Returns the number of resident entries, including expired entries not
    /// yet reaped.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gets between aging resets.
    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    #[inline]
    pub fn window_capacity(&self) -> usize {
        self.window.capacity()
    }

    #[inline]
    pub fn probation_len(&self) -> usize {
        self.main.probation().len()
    }

    #[inline]
    pub fn probation_capacity(&self) -> usize {
        self.main.probation_capacity()
    }

    #[inline]
    pub fn protected_len(&self) -> usize {
        self.main.protected().len()
    }

    #[inline]
    pub fn protected_capacity(&self) -> usize {
        self.main.protected_capacity()
    }

    /// Returns performance metrics if the `metrics` feature is enabled.
    #[cfg(feature = "metrics")]
    #[inline]
    pub fn metrics(&self) -> &TinyLfuMetrics {
        &self.metrics
    }

    /// Resets performance metrics to zero.
    #[cfg(feature = "metrics")]
    #[inline]
    pub fn reset_metrics(&mut self) {
        self.metrics = TinyLfuMetrics::default();
    }

    /// Returns the value for `key`, recording the access.
    ///
    /// The sketch is incremented on hit and on miss. An expired entry is
    /// removed (its callback fires) and reported as absent.
    ///
    /// # Example
    ///
    /// ```
    /// use tinylfu::{Item, TinyLfuCache};
    ///
    /// let mut cache = TinyLfuCache::new(10, 100);
    /// cache.set(Item::new(1, "one"));
    ///
    /// assert_eq!(cache.get(&1), Some(&"one"));
    /// assert_eq!(cache.get(&2), None);
    /// ```
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let mut evicted = Vec::new();
        let id = self.get_deferred(key, Instant::now(), &mut evicted);
        run_callbacks(evicted);
        id.and_then(|id| self.value(id))
    }

    /// Inserts or replaces an item. Never fails.
    ///
    /// Replacing a live key swaps its value and expiry, counts as a use and
    /// never evicts anything. A callback on `item` replaces the stored one,
    /// which then fires; without one the stored callback is kept. A new key
    /// enters the window and may push another entry through admission.
    pub fn set(&mut self, item: Item<K, V>) {
        let mut evicted = Vec::new();
        self.set_deferred(item, Instant::now(), &mut evicted);
        run_callbacks(evicted);
    }

    /// Inserts an item only if its key is not already live.
    ///
    /// # Errors
    ///
    /// Returns [`KeyAlreadyExists`] if the key is resident and not expired.
    /// The cache is left untouched in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use tinylfu::{Item, KeyAlreadyExists, TinyLfuCache};
    ///
    /// let mut cache = TinyLfuCache::new(10, 100);
    /// assert_eq!(cache.add(Item::new("foo", "bar")), Ok(()));
    /// assert_eq!(cache.add(Item::new("foo", "baz")), Err(KeyAlreadyExists));
    /// assert_eq!(cache.get(&"foo"), Some(&"bar"));
    /// ```
    pub fn add(&mut self, item: Item<K, V>) -> Result<(), KeyAlreadyExists> {
        let mut evicted = Vec::new();
        let result = self.add_deferred(item, Instant::now(), &mut evicted);
        run_callbacks(evicted);
        result
    }

    /// Removes `key`, firing its callback. Returns the value if it was live.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let mut evicted = Vec::new();
        let value = self.delete_deferred(key, Instant::now(), &mut evicted);
        run_callbacks(evicted);
        value
    }

    /// Upserts a plain key-value pair, returning the previous live value.
    ///
    /// A live entry keeps its expiry and callback; only the value changes.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let now = Instant::now();
        let live = self
            .map
            .get(&key)
            .copied()
            .filter(|&id| !self.is_expired(id, now));
        if let Some(id) = live {
            return Some(self.refresh(id, value, |_| {}));
        }

        let mut evicted = Vec::new();
        self.set_deferred(Item::new(key, value), now, &mut evicted);
        run_callbacks(evicted);
        None
    }

    /// Removes every entry, firing each callback once, and forgets all
    /// frequency history.
    pub fn clear(&mut self) {
        let mut evicted = Vec::new();
        self.clear_deferred(&mut evicted);
        run_callbacks(evicted);
    }

    /// Returns the value for `key` without recording an access.
    ///
    /// Expired entries read as absent but are not reaped.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let now = Instant::now();
        self.map
            .get(key)
            .and_then(|&id| self.arena.get(id))
            .filter(|node| !node.entry.is_expired(now))
            .map(|node| &node.entry.value)
    }

    /// Returns `true` if `key` is resident and not expired.
    pub fn contains(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    /// Returns the sketch's current frequency estimate for `key`.
    pub fn estimate(&self, key: &K) -> u8 {
        self.sketch.estimate(fingerprint(&self.hasher, key))
    }

    // -----------------------------------------------------------------------
    // Deferred-callback operations
    //
    // Each collects the callbacks of departing entries into `evicted` instead
    // of running them, so a lock holder can release before invoking them.
    // -----------------------------------------------------------------------

    pub(crate) fn get_deferred(
        &mut self,
        key: &K,
        now: Instant,
        evicted: &mut Vec<EvictionCallback>,
    ) -> Option<SlotId> {
        self.tick();
        self.sketch.increment(fingerprint(&self.hasher, key));

        let Some(&id) = self.map.get(key) else {
            #[cfg(feature = "metrics")]
            {
                self.metrics.misses += 1;
            }
            return None;
        };

        if self.is_expired(id, now) {
            self.reap(id, evicted);
            #[cfg(feature = "metrics")]
            {
                self.metrics.misses += 1;
            }
            return None;
        }

        self.touch(id);
        #[cfg(feature = "metrics")]
        {
            self.metrics.hits += 1;
        }
        Some(id)
    }

    /// Returns the replaced value when `item.key` was live.
    pub(crate) fn set_deferred(
        &mut self,
        item: Item<K, V>,
        now: Instant,
        evicted: &mut Vec<EvictionCallback>,
    ) -> Option<V> {
        if let Some(&id) = self.map.get(&item.key) {
            if self.is_expired(id, now) {
                self.reap(id, evicted);
            } else {
                return Some(self.update(id, item, evicted));
            }
        }
        self.insert_new(item, now, evicted);
        None
    }

    pub(crate) fn add_deferred(
        &mut self,
        item: Item<K, V>,
        now: Instant,
        evicted: &mut Vec<EvictionCallback>,
    ) -> Result<(), KeyAlreadyExists> {
        if let Some(&id) = self.map.get(&item.key) {
            if !self.is_expired(id, now) {
                #[cfg(feature = "metrics")]
                {
                    self.metrics.add_conflicts += 1;
                }
                return Err(KeyAlreadyExists);
            }
            self.reap(id, evicted);
        }
        self.insert_new(item, now, evicted);
        Ok(())
    }

    pub(crate) fn delete_deferred(
        &mut self,
        key: &K,
        now: Instant,
        evicted: &mut Vec<EvictionCallback>,
    ) -> Option<V> {
        let id = self.map.get(key).copied()?;
        let entry = self.remove_slot(id);
        let expired = entry.is_expired(now);
        evicted.extend(entry.on_evict);

        if expired {
            #[cfg(feature = "metrics")]
            {
                self.metrics.expirations += 1;
            }
            return None;
        }
        #[cfg(feature = "metrics")]
        {
            self.metrics.deletes += 1;
        }
        Some(entry.value)
    }

    pub(crate) fn clear_deferred(&mut self, evicted: &mut Vec<EvictionCallback>) {
        self.window.clear();
        self.main.clear();
        self.map.clear();
        evicted.extend(self.arena.drain().filter_map(|node| node.entry.on_evict));

        self.sketch.clear();
        self.doorkeeper.reset();
        self.ticks = 0;
    }

    #[inline]
    pub(crate) fn value(&self, id: SlotId) -> Option<&V> {
        self.arena.get(id).map(|node| &node.entry.value)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn tick(&mut self) {
        self.ticks += 1;
        if self.ticks < self.samples {
            return;
        }
        self.sketch.reset();
        self.doorkeeper.reset();
        self.ticks = 0;
        trace!(samples = self.samples, "tinylfu aging reset");
        #[cfg(feature = "metrics")]
        {
            self.metrics.aging_resets += 1;
        }
    }

    #[inline]
    fn is_expired(&self, id: SlotId, now: Instant) -> bool {
        self.arena
            .get(id)
            .is_some_and(|node| node.entry.is_expired(now))
    }

    /// Moves a live entry to the MRU end of its list, promoting on a
    /// probation hit.
    fn touch(&mut self, id: SlotId) {
        let segment = self.arena.get(id).expect("map/arena out of sync").segment;
        if segment == Segment::Window {
            self.window.get(&mut self.arena, id);
            return;
        }

        let access = self.main.get(&mut self.arena, id);
        #[cfg(feature = "metrics")]
        match access {
            MainAccess::Refreshed => {},
            MainAccess::Promoted => self.metrics.promotions += 1,
            MainAccess::PromotedWithDemotion => {
                self.metrics.promotions += 1;
                self.metrics.demotions += 1;
            },
        }
        #[cfg(not(feature = "metrics"))]
        let _ = access;
    }

    /// Replaces a live entry's value and expiry in place and returns the old
    /// value. A new callback displaces the stored one into `evicted`.
    fn update(&mut self, id: SlotId, item: Item<K, V>, evicted: &mut Vec<EvictionCallback>) -> V {
        let Item {
            value,
            expire_at,
            on_evict,
            ..
        } = item;
        self.refresh(id, value, |entry| {
            entry.expire_at = expire_at;
            if let Some(replaced) = on_evict.and_then(|cb| entry.on_evict.replace(cb)) {
                evicted.push(replaced);
            }
        })
    }

    /// Swaps the value of a live entry, applies `patch`, and counts the write
    /// as a use.
    fn refresh(&mut self, id: SlotId, value: V, patch: impl FnOnce(&mut Entry<K, V>)) -> V {
        let (old, fp) = {
            let entry = &mut self.arena.get_mut(id).expect("map/arena out of sync").entry;
            patch(entry);
            (std::mem::replace(&mut entry.value, value), entry.fingerprint)
        };
        self.sketch.increment(fp);
        self.touch(id);
        #[cfg(feature = "metrics")]
        {
            self.metrics.updates += 1;
        }
        old
    }

    fn insert_new(&mut self, item: Item<K, V>, now: Instant, evicted: &mut Vec<EvictionCallback>) {
        let fp = fingerprint(&self.hasher, &item.key);
        #[cfg(feature = "metrics")]
        {
            self.metrics.inserts += 1;
        }

        let Some(challenger) = self
            .window
            .add(&mut self.arena, &mut self.map, Entry::new(item, fp))
        else {
            return;
        };
        #[cfg(feature = "metrics")]
        {
            self.metrics.window_evictions += 1;
        }
        self.admit(challenger, now, evicted);
    }

    /// Decides the fate of an entry pushed out of the window.
    fn admit(
        &mut self,
        challenger: Entry<K, V>,
        now: Instant,
        evicted: &mut Vec<EvictionCallback>,
    ) {
        if self.main.capacity() == 0 || challenger.is_expired(now) {
            evicted.extend(challenger.on_evict);
            return;
        }

        let Some(victim) = self.main.victim() else {
            self.enter_main(challenger, evicted);
            return;
        };

        if !self.doorkeeper.allow(challenger.fingerprint) {
            #[cfg(feature = "metrics")]
            {
                self.metrics.doorkeeper_rejections += 1;
            }
            evicted.extend(challenger.on_evict);
            return;
        }

        let victim_fp = self
            .arena
            .get(victim)
            .expect("probation victim out of sync")
            .entry
            .fingerprint;
        if self.sketch.estimate(challenger.fingerprint) > self.sketch.estimate(victim_fp) {
            self.enter_main(challenger, evicted);
        } else {
            #[cfg(feature = "metrics")]
            {
                self.metrics.frequency_rejections += 1;
            }
            evicted.extend(challenger.on_evict);
        }
    }

    fn enter_main(&mut self, entry: Entry<K, V>, evicted: &mut Vec<EvictionCallback>) {
        #[cfg(feature = "metrics")]
        {
            self.metrics.admissions += 1;
        }
        if let Some(displaced) = self.main.add(&mut self.arena, &mut self.map, entry) {
            #[cfg(feature = "metrics")]
            {
                self.metrics.main_evictions += 1;
            }
            evicted.extend(displaced.on_evict);
        }
    }

    /// Removes an expired entry and queues its callback.
    fn reap(&mut self, id: SlotId, evicted: &mut Vec<EvictionCallback>) {
        let entry = self.remove_slot(id);
        evicted.extend(entry.on_evict);
        #[cfg(feature = "metrics")]
        {
            self.metrics.expirations += 1;
        }
    }

    fn remove_slot(&mut self, id: SlotId) -> Entry<K, V> {
        let segment = self.arena.get(id).expect("map/arena out of sync").segment;
        match segment {
            Segment::Window => self.window.remove(&mut self.arena, id),
            Segment::Probation | Segment::Protected => self.main.remove(&mut self.arena, id),
        }
        let node = self.arena.remove(id).expect("map/arena out of sync");
        self.map.remove(&node.entry.key);
        node.entry
    }

    /// Validates internal invariants (debug-only).
    #[cfg(debug_assertions)]
    pub fn check_invariants(&self) -> Result<(), crate::error::InvariantError>
    where
        K: Debug,
    {
        use crate::error::InvariantError;

        let linked = self.window.len() + self.main.len();
        if self.map.len() != linked || self.arena.len() != linked {
            return Err(InvariantError::new(format!(
                "map {} / arena {} / linked {} disagree",
                self.map.len(),
                self.arena.len(),
                linked
            )));
        }
        if self.map.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "{} entries exceed capacity {}",
                self.map.len(),
                self.capacity
            )));
        }
        if self.window.len() > self.window.capacity() {
            return Err(InvariantError::new(format!(
                "window holds {} > capacity {}",
                self.window.len(),
                self.window.capacity()
            )));
        }
        if self.main.len() > self.main.capacity() {
            return Err(InvariantError::new(format!(
                "main holds {} > capacity {}",
                self.main.len(),
                self.main.capacity()
            )));
        }
        if self.main.protected().len() > self.main.protected_capacity() {
            return Err(InvariantError::new(format!(
                "protected holds {} > capacity {}",
                self.main.protected().len(),
                self.main.protected_capacity()
            )));
        }
        if self.ticks >= self.samples {
            return Err(InvariantError::new(format!(
                "tick counter {} reached samples {} without reset",
                self.ticks, self.samples
            )));
        }

        for list in [self.window.list(), self.main.probation(), self.main.protected()] {
            for key in list.walk(&self.arena)? {
                let id = self.map.get(key).ok_or_else(|| {
                    InvariantError::new(format!("linked key {:?} missing from map", key))
                })?;
                let node = self.arena.get(*id).ok_or_else(|| {
                    InvariantError::new(format!("map entry {:?} points at empty slot", key))
                })?;
                if node.entry.key != *key {
                    return Err(InvariantError::new(format!(
                        "map entry {:?} points at slot holding {:?}",
                        key, node.entry.key
                    )));
                }
            }
        }

        Ok(())
    }
}

impl<K, V, S> Debug for TinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TinyLfuCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("window_len", &self.window.len())
            .field("probation_len", &self.main.probation().len())
            .field("protected_len", &self.main.protected().len())
            .field("samples", &self.samples)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Cache trait implementations
// ---------------------------------------------------------------------------

impl<K, V, S> ReadOnlyCache<K, V> for TinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn contains(&self, key: &K) -> bool {
        TinyLfuCache::contains(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V, S> CoreCache<K, V> for TinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        TinyLfuCache::insert(self, key, value)
    }

    #[inline]
    fn get(&mut self, key: &K) -> Option<&V> {
        TinyLfuCache::get(self, key)
    }

    fn clear(&mut self) {
        TinyLfuCache::clear(self);
    }
}

impl<K, V, S> MutableCache<K, V> for TinyLfuCache<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn remove(&mut self, key: &K) -> Option<V> {
        TinyLfuCache::delete(self, key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counted<K, V>(item: Item<K, V>, counter: &Arc<AtomicUsize>) -> Item<K, V> {
        let counter = Arc::clone(counter);
        item.on_evict(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn past() -> Instant {
        Instant::now()
            .checked_sub(Duration::from_secs(1))
            .expect("monotonic clock older than one second")
    }

    /// Capacity 2 with the default window ratio: window 1, probation 1,
    /// protected 0.
    fn duel_cache() -> TinyLfuCache<&'static str, u32> {
        TinyLfuCache::builder(2).samples(10_000).build()
    }

    // ==============================================
    // Basic Operations
    // ==============================================

    mod basic_operations {
        use super::*;

        #[test]
        fn new_cache_is_empty() {
            let cache: TinyLfuCache<u32, u32> = TinyLfuCache::new(100, 1_000);
            assert!(cache.is_empty());
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.capacity(), 100);
            assert_eq!(cache.samples(), 1_000);
        }

        #[test]
        fn set_then_get() {
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            assert_eq!(cache.get(&"a"), Some(&1));
            assert_eq!(cache.get(&"b"), Some(&2));
            assert_eq!(cache.get(&"c"), None);
            assert_eq!(cache.len(), 2);
        }

        #[test]
        fn add_rejects_live_key_without_mutation() {
            let mut cache = TinyLfuCache::new(10, 100);
            assert_eq!(cache.add(Item::new("foo", "bar")), Ok(()));
            let before = cache.estimate(&"foo");
            assert_eq!(cache.add(Item::new("foo", "baz")), Err(KeyAlreadyExists));
            assert_eq!(cache.estimate(&"foo"), before);
            assert_eq!(cache.peek(&"foo"), Some(&"bar"));
            assert_eq!(cache.get(&"foo"), Some(&"bar"));
        }

        #[test]
        fn add_failure_keeps_list_position() {
            let mut cache = TinyLfuCache::builder(100).samples(10_000).build();
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            assert_eq!(cache.probation_len(), 1);
            assert!(cache.add(Item::new("a", 9)).is_err());
            assert_eq!(cache.probation_len(), 1);
            assert_eq!(cache.protected_len(), 0);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn delete_returns_value_and_fires_callback() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("k", 7), &fired));

            assert_eq!(cache.delete(&"k"), Some(7));
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(cache.delete(&"k"), None);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert!(cache.is_empty());
        }

        #[test]
        fn insert_returns_previous_value() {
            let mut cache = TinyLfuCache::new(10, 100);
            assert_eq!(cache.insert("k", 1), None);
            assert_eq!(cache.insert("k", 2), Some(1));
            assert_eq!(cache.get(&"k"), Some(&2));
        }

        #[test]
        fn set_without_callback_keeps_stored_callback() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("k", 1), &fired));
            cache.set(Item::new("k", 2));
            assert_eq!(fired.load(Ordering::SeqCst), 0);

            assert_eq!(cache.delete(&"k"), Some(2));
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn set_with_new_callback_fires_the_replaced_one() {
            let first = Arc::new(AtomicUsize::new(0));
            let second = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("k", 1), &first));
            cache.set(counted(Item::new("k", 2), &second));
            assert_eq!(first.load(Ordering::SeqCst), 1);
            assert_eq!(second.load(Ordering::SeqCst), 0);
            assert_eq!(cache.len(), 1);

            cache.clear();
            assert_eq!(first.load(Ordering::SeqCst), 1);
            assert_eq!(second.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn insert_keeps_expiry_and_callback() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("k", 1).ttl(Duration::from_millis(20)), &fired));
            assert_eq!(cache.insert("k", 2), Some(1));
            assert_eq!(fired.load(Ordering::SeqCst), 0);

            std::thread::sleep(Duration::from_millis(40));
            assert_eq!(cache.get(&"k"), None);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn peek_has_no_side_effects() {
            let mut cache = TinyLfuCache::builder(100).samples(10_000).build();
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            assert_eq!(cache.peek(&"a"), Some(&1));
            assert_eq!(cache.estimate(&"a"), 0);
            assert_eq!(cache.protected_len(), 0);
            assert_eq!(cache.ticks, 0);
        }

        #[test]
        fn clear_fires_every_callback_and_forgets_history() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            for k in 0..5u32 {
                cache.set(counted(Item::new(k, k), &fired));
            }
            cache.get(&0);
            cache.get(&0);

            cache.clear();
            assert!(cache.is_empty());
            assert_eq!(fired.load(Ordering::SeqCst), 5);
            assert_eq!(cache.estimate(&0), 0);
            assert_eq!(cache.window_len() + cache.probation_len() + cache.protected_len(), 0);

            cache.set(Item::new(9, 9));
            assert_eq!(cache.get(&9), Some(&9));
            cache.check_invariants().unwrap();
        }
    }

    // ==============================================
    // Construction & Sizing
    // ==============================================

    mod construction {
        use super::*;

        #[test]
        fn rejects_zero_capacity_and_samples() {
            assert!(TinyLfuCache::<u32, u32>::try_new(0, 10).is_err());
            assert!(TinyLfuCache::<u32, u32>::try_new(10, 0).is_err());
        }

        #[test]
        #[should_panic(expected = "capacity")]
        fn new_panics_on_zero_capacity() {
            let _ = TinyLfuCache::<u32, u32>::new(0, 10);
        }

        #[test]
        fn default_split_for_capacity_100() {
            let cache: TinyLfuCache<u32, u32> = TinyLfuCache::new(100, 1_000);
            assert_eq!(cache.window_capacity(), 1);
            assert_eq!(cache.probation_capacity(), 19);
            assert_eq!(cache.protected_capacity(), 80);
        }

        #[test]
        fn capacity_one_has_no_main_cache() {
            let cache: TinyLfuCache<u32, u32> = TinyLfuCache::new(1, 10);
            assert_eq!(cache.window_capacity(), 1);
            assert_eq!(cache.probation_capacity(), 0);
            assert_eq!(cache.protected_capacity(), 0);
        }
    }

    // ==============================================
    // Admission Policy
    // ==============================================

    mod admission {
        use super::*;

        #[test]
        fn window_evictee_enters_main_while_it_has_room() {
            let mut cache = TinyLfuCache::builder(100).samples(10_000).build();
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            assert_eq!(cache.window_len(), 1);
            assert_eq!(cache.probation_len(), 1);
            assert!(cache.contains(&"a"));
            cache.check_invariants().unwrap();
        }

        #[test]
        fn first_sighting_is_rejected_by_doorkeeper() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = duel_cache();
            cache.set(Item::new("a", 1));
            cache.set(counted(Item::new("b", 2), &fired));
            // b is pushed out of the window while a holds the only main slot.
            cache.set(Item::new("c", 3));

            assert!(!cache.contains(&"b"));
            assert!(cache.contains(&"a"));
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert!(cache.doorkeeper.bits_set() > 0);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn incumbent_wins_ties() {
            let fired_b = Arc::new(AtomicUsize::new(0));
            let mut cache = duel_cache();
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            cache.set(Item::new("c", 3)); // b rejected, now known to the doorkeeper

            cache.set(counted(Item::new("b", 2), &fired_b));
            cache.set(Item::new("d", 4)); // b challenges a again: 0 vs 0

            assert_eq!(cache.estimate(&"a"), cache.estimate(&"b"));
            assert!(cache.contains(&"a"));
            assert!(!cache.contains(&"b"));
            assert_eq!(fired_b.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn more_frequent_challenger_displaces_victim() {
            let fired_a = Arc::new(AtomicUsize::new(0));
            let mut cache = duel_cache();
            cache.set(counted(Item::new("a", 1), &fired_a));
            cache.set(Item::new("b", 2));
            cache.set(Item::new("c", 3)); // b rejected, now known to the doorkeeper

            assert_eq!(cache.get(&"b"), None); // miss still counts
            cache.set(Item::new("b", 2));
            cache.set(Item::new("d", 4));

            assert!(cache.contains(&"b"));
            assert!(!cache.contains(&"a"));
            assert_eq!(fired_a.load(Ordering::SeqCst), 1);
            assert_eq!(cache.len(), 2);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn capacity_one_discards_every_window_evictee() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(1, 10);
            for k in 0..5u32 {
                cache.set(counted(Item::new(k, k), &fired));
            }
            assert_eq!(cache.len(), 1);
            assert!(cache.contains(&4));
            assert_eq!(fired.load(Ordering::SeqCst), 4);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn expired_window_evictee_is_discarded() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::builder(100).samples(10_000).build();
            cache.set(counted(Item::new("stale", 0).expire_at(past()), &fired));
            cache.set(Item::new("fresh", 1));

            assert_eq!(cache.len(), 1);
            assert_eq!(cache.probation_len(), 0);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    // ==============================================
    // Segmented Main Cache
    // ==============================================

    mod segments {
        use super::*;

        #[test]
        fn set_on_existing_key_promotes_from_probation() {
            let mut cache = TinyLfuCache::builder(100).samples(10_000).build();
            cache.set(Item::new("x", 1));
            cache.set(Item::new("y", 2)); // x -> probation
            assert_eq!(cache.probation_len(), 1);

            cache.set(Item::new("x", 10));
            assert_eq!(cache.protected_len(), 1);
            assert_eq!(cache.probation_len(), 0);
            assert_eq!(cache.estimate(&"x"), 1);
            assert_eq!(cache.get(&"x"), Some(&10));
        }

        #[test]
        fn get_promotes_from_probation() {
            let mut cache = TinyLfuCache::builder(100).samples(10_000).build();
            cache.set(Item::new(1u32, 1));
            cache.set(Item::new(2u32, 2));
            assert_eq!(cache.get(&1), Some(&1));
            assert_eq!(cache.protected_len(), 1);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn protected_overflow_demotes_into_probation() {
            let mut cache = TinyLfuCache::builder(10)
                .window_ratio(0.1)
                .probation_ratio(0.5)
                .samples(10_000)
                .build();
            // window 1, probation 4, protected 5
            for k in 0..10u32 {
                cache.set(Item::new(k, k));
            }
            for k in 0..6u32 {
                cache.get(&k);
            }
            assert_eq!(cache.protected_len(), 5);
            assert_eq!(cache.len(), 10);
            cache.check_invariants().unwrap();
        }
    }

    // ==============================================
    // Expiry
    // ==============================================

    mod expiry {
        use super::*;

        #[test]
        fn expired_item_is_never_returned() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("x", 1).expire_at(past()), &fired));

            assert_eq!(cache.len(), 1);
            assert_eq!(cache.peek(&"x"), None);
            assert!(!cache.contains(&"x"));
            assert_eq!(cache.get(&"x"), None);
            assert_eq!(cache.len(), 0);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(cache.estimate(&"x"), 1);
        }

        #[test]
        fn add_over_expired_key_succeeds() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("x", 1).expire_at(past()), &fired));

            assert_eq!(cache.add(Item::new("x", 2)), Ok(()));
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(cache.get(&"x"), Some(&2));
        }

        #[test]
        fn set_over_expired_key_reaps_then_inserts() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("x", 1).expire_at(past()), &fired));
            assert_eq!(cache.insert("x", 2), None);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn delete_of_expired_key_reports_absent() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(counted(Item::new("x", 1).expire_at(past()), &fired));
            assert_eq!(cache.delete(&"x"), None);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert!(cache.is_empty());
        }

        #[test]
        fn set_replaces_expiry() {
            let mut cache = TinyLfuCache::new(10, 100);
            cache.set(Item::new("x", 1).ttl(Duration::from_secs(3600)));
            cache.set(Item::new("x", 2).expire_at(past()));
            assert_eq!(cache.get(&"x"), None);
        }
    }

    // ==============================================
    // Aging
    // ==============================================

    mod aging {
        use super::*;

        #[test]
        fn estimates_halve_after_exactly_samples_gets() {
            let mut cache: TinyLfuCache<&str, u32> = TinyLfuCache::new(100, 10);
            for _ in 0..9 {
                cache.get(&"hot");
            }
            assert_eq!(cache.estimate(&"hot"), 9);

            // The tenth get halves first, then counts itself.
            cache.get(&"hot");
            assert_eq!(cache.estimate(&"hot"), 5);
            assert_eq!(cache.ticks, 0);
        }

        #[test]
        fn estimator_is_monotonic_between_resets() {
            let mut cache: TinyLfuCache<u32, u32> = TinyLfuCache::new(100, 1_000);
            let mut last = 0;
            for _ in 0..50 {
                cache.get(&42);
                let now = cache.estimate(&42);
                assert!(now >= last);
                last = now;
            }
            assert_eq!(last, crate::ds::frequency_sketch::MAX_COUNT);
        }

        #[test]
        fn doorkeeper_resets_in_lockstep() {
            let mut cache: TinyLfuCache<&str, u32> = TinyLfuCache::builder(2).samples(4).build();
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            cache.set(Item::new("c", 3)); // b rejected, doorkeeper populated
            assert!(cache.doorkeeper.bits_set() > 0);

            for _ in 0..4 {
                cache.get(&"zzz");
            }
            assert_eq!(cache.doorkeeper.bits_set(), 0);
        }

        #[test]
        fn sets_do_not_tick_the_sample_counter() {
            let mut cache: TinyLfuCache<u32, u32> = TinyLfuCache::new(10, 3);
            for k in 0..20 {
                cache.set(Item::new(k, k));
            }
            assert_eq!(cache.ticks, 0);
        }
    }

    // ==============================================
    // Capacity & Callback Accounting
    // ==============================================

    mod accounting {
        use super::*;

        #[test]
        fn scan_past_capacity_stays_bounded() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(100, 10_000);
            for i in 0..150 {
                cache.set(counted(Item::new(format!("k{}", i), i), &fired));
            }
            assert!(cache.len() <= 100);
            assert!(fired.load(Ordering::SeqCst) >= 1);
            assert_eq!(cache.len() + fired.load(Ordering::SeqCst), 150);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn reinserting_one_key_never_evicts() {
            let fired = Arc::new(AtomicUsize::new(0));
            let mut cache = TinyLfuCache::new(10, 100);
            for i in 0..1_000 {
                cache.set(counted(Item::new("same", i), &fired));
            }
            assert_eq!(cache.len(), 1);
            // Every replaced callback fired; the last one is still stored.
            assert_eq!(fired.load(Ordering::SeqCst), 999);
            assert_eq!(cache.get(&"same"), Some(&999));
            cache.delete(&"same");
            assert_eq!(fired.load(Ordering::SeqCst), 1_000);
        }

        #[test]
        fn each_callback_fires_at_most_once() {
            let counters: Vec<Arc<AtomicUsize>> =
                (0..64).map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let mut cache = TinyLfuCache::new(16, 64);

            for round in 0..4u32 {
                for (k, counter) in counters.iter().enumerate() {
                    let k = k as u32;
                    match (k + round) % 4 {
                        0 => {
                            let _ = cache.add(counted(Item::new(k, round), counter));
                        },
                        1 => {
                            cache.get(&k);
                        },
                        2 => {
                            cache.delete(&k);
                        },
                        _ => cache.set(Item::new(k, round)),
                    }
                    cache.check_invariants().unwrap();
                }
            }
            cache.clear();

            // Each key registers exactly one callback, in its `add` round.
            for counter in &counters {
                assert!(counter.load(Ordering::SeqCst) <= 1);
            }
        }
    }

    // ==============================================
    // Trait Surface
    // ==============================================

    mod traits {
        use super::*;

        fn exercise<C: MutableCache<u32, u32>>(cache: &mut C) {
            assert_eq!(cache.insert(1, 10), None);
            assert_eq!(cache.insert(1, 11), Some(10));
            assert_eq!(cache.get(&1), Some(&11));
            assert!(cache.contains(&1));
            assert_eq!(cache.remove(&1), Some(11));
            assert!(cache.is_empty());
        }

        #[test]
        fn implements_mutable_cache() {
            let mut cache = TinyLfuCache::new(8, 64);
            exercise(&mut cache);
            assert_eq!(ReadOnlyCache::capacity(&cache), 8);
        }

        #[test]
        fn debug_output_names_segments() {
            let cache: TinyLfuCache<u32, u32> = TinyLfuCache::new(8, 64);
            let dbg = format!("{:?}", cache);
            assert!(dbg.contains("TinyLfuCache"));
            assert!(dbg.contains("probation_len"));
        }
    }

    #[cfg(feature = "metrics")]
    mod metrics {
        use super::*;

        #[test]
        fn counts_hits_misses_and_rejections() {
            let mut cache = duel_cache();
            cache.set(Item::new("a", 1));
            cache.set(Item::new("b", 2));
            cache.set(Item::new("c", 3));
            cache.get(&"a");
            cache.get(&"b");

            let m = cache.metrics();
            assert_eq!(m.hits, 1);
            assert_eq!(m.misses, 1);
            assert_eq!(m.inserts, 3);
            assert_eq!(m.admissions, 1);
            assert_eq!(m.doorkeeper_rejections, 1);
            assert!(m.to_string().contains("hit_rate: 50.00%"));

            cache.reset_metrics();
            assert_eq!(cache.metrics().hits, 0);
        }
    }
}
