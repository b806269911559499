//! tinylfu: an in-process W-TinyLFU cache.
//!
//! New keys enter a small LRU window. Entries pushed out of the window must
//! win an admission contest, judged by a 4-bit count-min frequency sketch and
//! a Bloom-filter doorkeeper, to displace a resident of the segmented main
//! cache.
//!
//! ```
//! use std::time::Duration;
//! use tinylfu::{Item, TinyLfuCache};
//!
//! let mut cache = TinyLfuCache::new(1_000, 10_000);
//! cache.set(Item::new("user:1", "alice").ttl(Duration::from_secs(60)));
//! assert_eq!(cache.get(&"user:1"), Some(&"alice"));
//! ```
//!
//! See [`policy::tinylfu`] for the policy itself and [`hash`] for fingerprint
//! strategies.

pub mod builder;
pub mod ds;
pub mod error;
pub mod hash;
pub mod policy;
pub mod prelude;
pub mod traits;

pub use builder::TinyLfuBuilder;
pub use error::{ConfigError, InvariantError, KeyAlreadyExists};
#[cfg(feature = "concurrency")]
pub use policy::tinylfu::ConcurrentTinyLfuCache;
#[cfg(feature = "metrics")]
pub use policy::tinylfu::TinyLfuMetrics;
pub use policy::tinylfu::{EvictionCallback, Item, TinyLfuCache};
