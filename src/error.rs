//! Error types for the tinylfu library.
//!
//! ## Key Components
//!
//! - [`KeyAlreadyExists`]: Returned by [`TinyLfuCache::add`] when the key is
//!   already resident. The cache is left untouched.
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity, out-of-range ratios, zero sample window).
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (debug-only `check_invariants` methods).
//!
//! Misses and expired entries are not errors: `get` simply returns `None`.
//! Capacity pressure is silent and only observable through eviction callbacks.
//!
//! ## Example Usage
//!
//! ```
//! use tinylfu::error::{ConfigError, KeyAlreadyExists};
//! use tinylfu::{Item, TinyLfuCache};
//!
//! // Fallible constructor for user-configurable parameters
//! let cache: Result<TinyLfuCache<String, i32>, ConfigError> = TinyLfuCache::try_new(100, 1_000);
//! assert!(cache.is_ok());
//!
//! // Invalid capacity is caught without panicking
//! assert!(TinyLfuCache::<String, i32>::try_new(0, 1_000).is_err());
//!
//! let mut cache = TinyLfuCache::new(100, 1_000);
//! cache.add(Item::new("foo", "bar")).unwrap();
//! assert_eq!(cache.add(Item::new("foo", "baz")), Err(KeyAlreadyExists));
//! ```
//!
//! [`TinyLfuCache::add`]: crate::policy::tinylfu::TinyLfuCache::add

use std::fmt;

// ---------------------------------------------------------------------------
// KeyAlreadyExists
// ---------------------------------------------------------------------------

/// Error returned by insert-only operations when the key is already cached.
///
/// No state is mutated when this is returned: the resident value, expiry,
/// list position and frequency estimate are exactly as before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyAlreadyExists;

impl fmt::Display for KeyAlreadyExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key already exists")
    }
}

impl std::error::Error for KeyAlreadyExists {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`TinyLfuCache::try_new`](crate::policy::tinylfu::TinyLfuCache::try_new)
/// and [`TinyLfuBuilder::try_build`](crate::builder::TinyLfuBuilder::try_build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use tinylfu::TinyLfuCache;
///
/// let err = TinyLfuCache::<u64, u64>::try_new(0, 10).unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by the debug-only
/// [`TinyLfuCache::check_invariants`](crate::policy::tinylfu::TinyLfuCache::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
