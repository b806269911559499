//! Key fingerprinting.
//!
//! The cache turns every key into a 64-bit fingerprint once, on insert, and
//! stores it alongside the entry. The frequency sketch and the doorkeeper are
//! addressed only by fingerprint.
//!
//! Fingerprint derivation is a strategy: any [`BuildHasher`] works. The
//! default is [`FxBuildHasher`]. For keys that are already well-distributed
//! 64-bit hashes, [`PrehashedBuildHasher`] passes them through unchanged.
//!
//! Whatever the strategy, the raw hash is run through [`mix64`] so that the
//! low and high halves used for double hashing are independent even for weak
//! hashers.
//!
//! ## Example
//!
//! ```
//! use tinylfu::hash::PrehashedBuildHasher;
//! use tinylfu::{Item, TinyLfuCache};
//!
//! let mut cache: TinyLfuCache<u64, &str, PrehashedBuildHasher> = TinyLfuCache::builder(100)
//!     .hasher(PrehashedBuildHasher)
//!     .build();
//!
//! cache.set(Item::new(0x9E37_79B9_7F4A_7C15, "pre-hashed"));
//! assert_eq!(cache.get(&0x9E37_79B9_7F4A_7C15), Some(&"pre-hashed"));
//! ```

use std::hash::{BuildHasher, Hash, Hasher};

pub use rustc_hash::FxBuildHasher;

/// Default fingerprint strategy.
pub type DefaultFingerprinter = FxBuildHasher;

/// 64-bit finalizer (MurmurHash3 `fmix64`).
#[inline]
pub fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Computes the fingerprint of `key` under `build_hasher`.
#[inline]
pub fn fingerprint<K, S>(build_hasher: &S, key: &K) -> u64
where
    K: Hash + ?Sized,
    S: BuildHasher,
{
    mix64(build_hasher.hash_one(key))
}

/// [`BuildHasher`] for keys that already are 64-bit hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrehashedBuildHasher;

impl BuildHasher for PrehashedBuildHasher {
    type Hasher = PrehashedHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        PrehashedHasher::default()
    }
}

/// Identity hasher for `u64` keys.
///
/// Other integer writes are widened; arbitrary byte writes are folded in
/// eight bytes at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrehashedHasher {
    hash: u64,
}

impl Hasher for PrehashedHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.hash = n;
    }

    #[inline]
    fn write_u32(&mut self, n: u32) {
        self.hash = u64::from(n);
    }

    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.hash = n as u64;
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            self.hash = mix64(self.hash ^ u64::from_le_bytes(buf));
        }
    }
}
