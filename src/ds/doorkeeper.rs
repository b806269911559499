//! Single-generation Bloom filter gating one-off keys out of admission.
//!
//! The doorkeeper answers "has this fingerprint been seen since the last
//! reset?". A window evictee that has never been seen before is discarded
//! without a frequency comparison; only keys that demonstrate reuse get to
//! challenge a resident of the main cache.
//!
//! ## Sizing
//!
//! Standard Bloom filter sizing from the expected insertions `n` (the sample
//! window) and the target false-positive rate `p`:
//!
//! ```text
//!   m = ceil(-n * ln(p) / ln(2)^2)     bits, rounded up to a multiple of 64
//!   k = max(1, round(m / n * ln(2)))   hash functions
//! ```
//!
//! Bit positions are derived by double hashing: `h1 + i * h2 (mod m)` where
//! `h1`/`h2` are the low/high halves of the fingerprint.

use crate::error::ConfigError;

/// Upper bound on hash functions; beyond this extra probes buy nothing.
const MAX_HASHES: u32 = 16;

/// One-bit-per-probe membership filter, cleared wholesale on reset.
#[derive(Debug, Clone)]
pub struct Doorkeeper {
    words: Vec<u64>,
    /// Total bits in `words`.
    num_bits: u64,
    num_hashes: u32,
    /// Number of bits currently set.
    bits_set: usize,
}

impl Doorkeeper {
    /// Creates a filter for `expected_items` insertions at `false_positive_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `false_positive_rate` is not strictly
    /// between 0 and 1, or if the resulting bit array cannot be allocated.
    pub fn try_new(expected_items: usize, false_positive_rate: f64) -> Result<Self, ConfigError> {
        if !false_positive_rate.is_finite()
            || false_positive_rate <= 0.0
            || false_positive_rate >= 1.0
        {
            return Err(ConfigError::new(format!(
                "false_positive_rate must be in (0.0, 1.0), got {}",
                false_positive_rate
            )));
        }

        let n = expected_items.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let ideal_bits = (-n * false_positive_rate.ln() / (ln2 * ln2)).ceil();
        let num_words = ((ideal_bits / 64.0).ceil() as usize).max(1);
        let num_bits = num_words
            .checked_mul(64)
            .and_then(|bits| u64::try_from(bits).ok())
            .ok_or_else(|| {
                ConfigError::new(format!(
                    "doorkeeper for {} expected items needs more than usize::MAX bits",
                    expected_items
                ))
            })?;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().clamp(1.0, MAX_HASHES as f64) as u32;

        let mut words = Vec::new();
        words.try_reserve_exact(num_words).map_err(|e| {
            ConfigError::new(format!(
                "cannot allocate doorkeeper of {} bits: {}",
                num_bits, e
            ))
        })?;
        words.resize(num_words, 0);

        Ok(Self {
            words,
            num_bits,
            num_hashes,
            bits_set: 0,
        })
    }

    /// Records `fingerprint` and reports whether it had already been seen.
    ///
    /// Returns `false` on the first sighting since the last reset, `true` on
    /// any repeat (or on a false positive).
    pub fn allow(&mut self, fingerprint: u64) -> bool {
        let mut seen = true;
        for i in 0..self.num_hashes {
            let bit = self.bit_index(fingerprint, i);
            let word = &mut self.words[(bit >> 6) as usize];
            let mask = 1u64 << (bit & 63);
            if *word & mask == 0 {
                *word |= mask;
                self.bits_set += 1;
                seen = false;
            }
        }
        seen
    }

    /// Returns `true` if `fingerprint` is (probably) recorded. Never mutates.
    pub fn contains(&self, fingerprint: u64) -> bool {
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(fingerprint, i);
            self.words[(bit >> 6) as usize] & (1u64 << (bit & 63)) != 0
        })
    }

    /// Clears every bit.
    pub fn reset(&mut self) {
        self.words.fill(0);
        self.bits_set = 0;
    }

    #[inline]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    #[inline]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    #[inline]
    pub fn bits_set(&self) -> usize {
        self.bits_set
    }

    #[inline(always)]
    fn bit_index(&self, fingerprint: u64, i: u32) -> u64 {
        let h1 = fingerprint & 0xFFFF_FFFF;
        let h2 = (fingerprint >> 32) | 1;
        h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits
    }
}
