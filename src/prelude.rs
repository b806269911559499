pub use crate::builder::TinyLfuBuilder;
pub use crate::error::{ConfigError, KeyAlreadyExists};
pub use crate::hash::{DefaultFingerprinter, PrehashedBuildHasher};
#[cfg(feature = "concurrency")]
pub use crate::policy::tinylfu::ConcurrentTinyLfuCache;
pub use crate::policy::tinylfu::{Item, TinyLfuCache};
pub use crate::traits::{ConcurrentCache, CoreCache, MutableCache, ReadOnlyCache};
