//! 4-bit count-min sketch used as the TinyLFU frequency estimator.
//!
//! ## Architecture
//!
//! ```text
//!   fingerprint (u64) ──► h1 = low 32 bits, h2 = high 32 bits
//!
//!   row 0: [c c c c c c ... ]   pos0 = (h1 + 0*h2) & mask
//!   row 1: [c c c c c c ... ]   pos1 = (h1 + 1*h2) & mask
//!   row 2: [c c c c c c ... ]   pos2 = (h1 + 2*h2) & mask
//!   row 3: [c c c c c c ... ]   pos3 = (h1 + 3*h2) & mask
//!
//!   each c is a 4-bit saturating counter, two packed per byte
//!   estimate = min(row0[pos0], row1[pos1], row2[pos2], row3[pos3])
//! ```
//!
//! ## Properties
//!
//! - `estimate` never underestimates the number of `increment` calls since the
//!   last reset; hash collisions can only inflate it.
//! - Counters saturate at [`MAX_COUNT`] and never wrap.
//! - Between resets, counters are monotonically non-decreasing.
//! - `reset` halves every counter (aging), preserving relative order.
//!
//! ## Sizing
//!
//! Row width is the cache capacity rounded up to a power of two (minimum 16),
//! so a working set the size of the cache maps to roughly one counter per
//! entry per row.

/// Largest value a 4-bit counter can hold.
pub const MAX_COUNT: u8 = 15;

/// Number of independent counter rows (hash functions).
const DEPTH: usize = 4;

/// Smallest row width, in counters.
const MIN_WIDTH: usize = 16;

/// Largest row width; positions are computed in `u32` space.
const MAX_WIDTH: usize = 1 << 31;

/// Clears the high bit of both nibbles so a right shift cannot bleed across.
const HALVE_MASK: u8 = 0x77;

/// Approximate, bounded-memory frequency counter keyed by 64-bit fingerprint.
#[derive(Debug, Clone)]
pub struct FrequencySketch {
    /// `DEPTH` rows laid out back to back, `row_bytes` bytes each.
    table: Vec<u8>,
    row_bytes: usize,
    /// `width - 1`; width is always a power of two.
    mask: u32,
}

impl FrequencySketch {
    /// Creates a sketch sized for roughly `capacity` distinct hot keys.
    pub fn new(capacity: usize) -> Self {
        let width = capacity
            .checked_next_power_of_two()
            .unwrap_or(MAX_WIDTH)
            .clamp(MIN_WIDTH, MAX_WIDTH);
        let row_bytes = width / 2;

        Self {
            table: vec![0; row_bytes * DEPTH],
            row_bytes,
            mask: (width - 1) as u32,
        }
    }

    /// Number of counters per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.mask as usize + 1
    }

    /// Records one observation of `fingerprint`.
    #[inline]
    pub fn increment(&mut self, fingerprint: u64) {
        for row in 0..DEPTH {
            let (byte, shift) = self.locate(row, fingerprint);
            let cell = &mut self.table[byte];
            if (*cell >> shift) & 0x0F < MAX_COUNT {
                *cell += 1 << shift;
            }
        }
    }

    /// Returns the estimated count for `fingerprint`, in `0..=MAX_COUNT`.
    #[inline]
    pub fn estimate(&self, fingerprint: u64) -> u8 {
        (0..DEPTH)
            .map(|row| {
                let (byte, shift) = self.locate(row, fingerprint);
                (self.table[byte] >> shift) & 0x0F
            })
            .min()
            .unwrap_or(0)
    }

    /// Halves every counter.
    pub fn reset(&mut self) {
        for cell in &mut self.table {
            *cell = (*cell >> 1) & HALVE_MASK;
        }
    }

    /// Zeroes every counter.
    pub fn clear(&mut self) {
        self.table.fill(0);
    }

    /// Returns `(byte index, bit shift)` of the counter for `fingerprint` in `row`.
    #[inline(always)]
    fn locate(&self, row: usize, fingerprint: u64) -> (usize, u32) {
        let h1 = fingerprint as u32;
        let h2 = (fingerprint >> 32) as u32;
        let pos = h1.wrapping_add((row as u32).wrapping_mul(h2)) & self.mask;
        let byte = row * self.row_bytes + (pos >> 1) as usize;
        (byte, (pos & 1) * 4)
    }
}
