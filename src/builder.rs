//! Configuration builder for [`TinyLfuCache`] and its concurrent wrapper.
//!
//! ## Sizing
//!
//! ```text
//!   window    = max(1, floor(capacity * window_ratio))
//!   main      = capacity - window
//!   probation = clamp(floor(main * probation_ratio), 1, main)   (0 if main = 0)
//!   protected = main - probation
//! ```
//!
//! The frequency sketch is sized from `capacity`; the doorkeeper from
//! `samples` and `false_positive_rate`.
//!
//! ## Example
//!
//! ```rust
//! use tinylfu::{Item, TinyLfuCache};
//!
//! let mut cache: TinyLfuCache<String, u32> = TinyLfuCache::builder(1_000)
//!     .samples(100_000)
//!     .window_ratio(0.05)
//!     .false_positive_rate(0.001)
//!     .build();
//!
//! assert_eq!(cache.window_capacity(), 50);
//! cache.set(Item::new("k".to_string(), 1));
//! ```

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use tracing::debug;

use crate::ds::Doorkeeper;
use crate::error::ConfigError;
use crate::hash::DefaultFingerprinter;
#[cfg(feature = "concurrency")]
use crate::policy::tinylfu::ConcurrentTinyLfuCache;
use crate::policy::tinylfu::TinyLfuCache;

/// Default share of capacity given to the window.
pub const DEFAULT_WINDOW_RATIO: f64 = 0.01;

/// Default share of the main cache given to probation.
pub const DEFAULT_PROBATION_RATIO: f64 = 0.2;

/// Default doorkeeper false-positive rate.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Default aging period, as a multiple of capacity.
pub const DEFAULT_SAMPLES_PER_ENTRY: usize = 10;

/// Resolved segment capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) capacity: usize,
    pub(crate) samples: usize,
    pub(crate) window: usize,
    pub(crate) probation: usize,
    pub(crate) protected: usize,
}

impl Layout {
    fn compute(capacity: usize, samples: usize, window_ratio: f64, probation_ratio: f64) -> Self {
        let window = ((capacity as f64 * window_ratio) as usize).clamp(1, capacity);
        let main = capacity - window;
        let probation = if main == 0 {
            0
        } else {
            ((main as f64 * probation_ratio) as usize).clamp(1, main)
        };

        Self {
            capacity,
            samples,
            window,
            probation,
            protected: main - probation,
        }
    }
}

/// Builder for a [`TinyLfuCache`] (or [`ConcurrentTinyLfuCache`]).
///
/// `K` and `V` are carried only so that `TinyLfuCache::builder(n)...build()`
/// infers the cache type from context.
pub struct TinyLfuBuilder<K, V, S = DefaultFingerprinter> {
    capacity: usize,
    samples: Option<usize>,
    window_ratio: f64,
    probation_ratio: f64,
    false_positive_rate: f64,
    hasher: S,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> TinyLfuBuilder<K, V> {
    /// Creates a builder with default ratios and `samples = 10 * capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: None,
            window_ratio: DEFAULT_WINDOW_RATIO,
            probation_ratio: DEFAULT_PROBATION_RATIO,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            hasher: DefaultFingerprinter::default(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, S> TinyLfuBuilder<K, V, S> {
    /// Sets the number of gets between aging resets.
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Sets the fraction of capacity given to the window, in `(0.0, 1.0]`.
    pub fn window_ratio(mut self, ratio: f64) -> Self {
        self.window_ratio = ratio;
        self
    }

    /// Sets the fraction of the main cache given to probation, in `(0.0, 1.0]`.
    pub fn probation_ratio(mut self, ratio: f64) -> Self {
        self.probation_ratio = ratio;
        self
    }

    /// Sets the doorkeeper's target false-positive rate, in `(0.0, 1.0)`.
    pub fn false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = rate;
        self
    }

    /// Replaces the fingerprint strategy.
    pub fn hasher<S2>(self, hasher: S2) -> TinyLfuBuilder<K, V, S2> {
        TinyLfuBuilder {
            capacity: self.capacity,
            samples: self.samples,
            window_ratio: self.window_ratio,
            probation_ratio: self.probation_ratio,
            false_positive_rate: self.false_positive_rate,
            hasher,
            _marker: PhantomData,
        }
    }

    fn validate(&self) -> Result<Layout, ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::new("cache capacity must be greater than zero"));
        }
        let samples = self
            .samples
            .unwrap_or_else(|| self.capacity.saturating_mul(DEFAULT_SAMPLES_PER_ENTRY));
        if samples == 0 {
            return Err(ConfigError::new("samples must be greater than zero"));
        }
        if !self.window_ratio.is_finite() || self.window_ratio <= 0.0 || self.window_ratio > 1.0 {
            return Err(ConfigError::new(format!(
                "window_ratio must be in (0.0, 1.0], got {}",
                self.window_ratio
            )));
        }
        if !self.probation_ratio.is_finite()
            || self.probation_ratio <= 0.0
            || self.probation_ratio > 1.0
        {
            return Err(ConfigError::new(format!(
                "probation_ratio must be in (0.0, 1.0], got {}",
                self.probation_ratio
            )));
        }

        Ok(Layout::compute(
            self.capacity,
            samples,
            self.window_ratio,
            self.probation_ratio,
        ))
    }
}

impl<K, V, S> TinyLfuBuilder<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. For a non-panicking
    /// alternative, use [`try_build`](Self::try_build).
    pub fn build(self) -> TinyLfuCache<K, V, S> {
        match self.try_build() {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Builds the cache, returning an error on invalid configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if capacity or samples is zero, a ratio is
    /// outside `(0.0, 1.0]`, the false-positive rate is outside
    /// `(0.0, 1.0)`, or the doorkeeper for `samples` cannot be allocated.
    ///
    /// # Example
    ///
    /// ```
    /// use tinylfu::TinyLfuCache;
    ///
    /// let bad = TinyLfuCache::<u64, u64>::builder(100).window_ratio(0.0).try_build();
    /// assert!(bad.is_err());
    /// ```
    pub fn try_build(self) -> Result<TinyLfuCache<K, V, S>, ConfigError> {
        let layout = self.validate()?;
        let doorkeeper = Doorkeeper::try_new(layout.samples, self.false_positive_rate)?;

        debug!(
            capacity = layout.capacity,
            samples = layout.samples,
            window = layout.window,
            probation = layout.probation,
            protected = layout.protected,
            doorkeeper_bits = doorkeeper.num_bits(),
            doorkeeper_hashes = doorkeeper.num_hashes(),
            "building tinylfu cache"
        );

        Ok(TinyLfuCache::with_layout(layout, doorkeeper, self.hasher))
    }
}

#[cfg(feature = "concurrency")]
impl<K, V, S> TinyLfuBuilder<K, V, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    /// Builds a [`ConcurrentTinyLfuCache`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn build_concurrent(self) -> ConcurrentTinyLfuCache<K, V, S> {
        ConcurrentTinyLfuCache::from(self.build())
    }

    /// Builds a [`ConcurrentTinyLfuCache`], returning an error on invalid
    /// configuration.
    ///
    /// # Errors
    ///
    /// See [`try_build`](Self::try_build).
    pub fn try_build_concurrent(self) -> Result<ConcurrentTinyLfuCache<K, V, S>, ConfigError> {
        self.try_build().map(ConcurrentTinyLfuCache::from)
    }
}

impl<K, V, S: Clone> Clone for TinyLfuBuilder<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            samples: self.samples,
            window_ratio: self.window_ratio,
            probation_ratio: self.probation_ratio,
            false_positive_rate: self.false_positive_rate,
            hasher: self.hasher.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, S> fmt::Debug for TinyLfuBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinyLfuBuilder")
            .field("capacity", &self.capacity)
            .field("samples", &self.samples)
            .field("window_ratio", &self.window_ratio)
            .field("probation_ratio", &self.probation_ratio)
            .field("false_positive_rate", &self.false_positive_rate)
            .finish_non_exhaustive()
    }
}
