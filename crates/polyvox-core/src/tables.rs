//! Precomputed lookup tables.
//!
//! Tables are built once at construction time and sampled with linear
//! interpolation on the audio path:
//!
//! - [`ExpTable`] - exponential segment shapes for envelopes
//! - [`SkewTable`] - non-symmetric skew warp from 0..1 to a real range

use core::fmt;

use libm::{expf, logf, powf};

use crate::math::lerp;

/// Number of entries in [`ExpTable`] and [`SkewTable`].
pub const TABLE_SIZE: usize = 2048;

/// Sample a table at a fractional index with linear interpolation.
///
/// `position` is clamped to the table bounds.
#[inline]
fn interpolate(table: &[f32], position: f32) -> f32 {
    let last = table.len() - 1;
    let position = position.clamp(0.0, last as f32);
    let index = position as usize;
    if index >= last {
        return table[last];
    }
    lerp(table[index], table[index + 1], position - index as f32)
}

/// Exponential curve table: entry i is `base^x_i + offset` with x swept
/// linearly from `start` to `end`.
///
/// # Example
///
/// ```rust
/// use polyvox_core::ExpTable;
///
/// // Falling curve from ~1.0 to ~0.0002
/// let table = ExpTable::new(0.001, 0.0, 1.0, -0.0008);
/// assert!(table.get(0) > 0.99);
/// assert!(table.get(2047) < 0.001);
/// ```
#[derive(Clone)]
pub struct ExpTable {
    table: [f32; TABLE_SIZE],
}

impl ExpTable {
    /// Generate the table.
    pub fn new(base: f32, start: f32, end: f32, offset: f32) -> Self {
        let mut table = [0.0; TABLE_SIZE];
        let increment = (end - start) / (TABLE_SIZE - 1) as f32;
        for (i, entry) in table.iter_mut().enumerate() {
            let x = start + increment * i as f32;
            *entry = powf(base, x) + offset;
        }
        Self { table }
    }

    /// Entry at an integer index (clamped).
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.table[index.min(TABLE_SIZE - 1)]
    }

    /// Entry at a fractional index, linearly interpolated.
    #[inline]
    pub fn sample(&self, position: f32) -> f32 {
        interpolate(&self.table, position)
    }

    /// Index of the last entry, as a float.
    #[inline]
    pub fn last_index(&self) -> f32 {
        (TABLE_SIZE - 1) as f32
    }
}

impl fmt::Debug for ExpTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpTable")
            .field("first", &self.table[0])
            .field("last", &self.table[TABLE_SIZE - 1])
            .finish()
    }
}

/// Non-symmetric skew table mapping 0..1 onto `start..end` so that 0.5 lands
/// on `center`.
///
/// `skew = ln(0.5) / ln((center - start) / (end - start))` and entry i is
/// `start + (end - start) · x_i^(1/skew)`.
///
/// # Example
///
/// ```rust
/// use polyvox_core::SkewTable;
///
/// let table = SkewTable::new(0.0, 20000.0, 1000.0);
/// assert!((table.warp(0.5) - 1000.0).abs() < 20.0);
/// assert_eq!(table.warp(-1.0), table.warp(0.0));
/// ```
#[derive(Clone)]
pub struct SkewTable {
    table: [f32; TABLE_SIZE],
}

impl SkewTable {
    /// Generate the table.
    pub fn new(start: f32, end: f32, center: f32) -> Self {
        let span = end - start;
        let ratio = if span == 0.0 { 0.5 } else { (center - start) / span };
        #[cfg(feature = "tracing")]
        if !(ratio > 0.0 && ratio < 1.0) {
            tracing::warn!(start, end, center, "skew center outside range, clamping");
        }
        let ratio = ratio.clamp(1e-6, 1.0 - 1e-6);
        let skew = logf(0.5) / logf(ratio);
        let increment = 1.0 / (TABLE_SIZE - 1) as f32;
        let mut table = [0.0; TABLE_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            let x = (increment * i as f32).max(1e-10);
            let proportion = expf(logf(x) / skew);
            *entry = start + span * proportion;
        }
        Self { table }
    }

    /// Warp a normalized value; input is clipped to 0..1.
    #[inline]
    pub fn warp(&self, normalized: f32) -> f32 {
        let normalized = if normalized.is_nan() { 0.0 } else { normalized };
        interpolate(&self.table, normalized.clamp(0.0, 1.0) * (TABLE_SIZE - 1) as f32)
    }
}

impl fmt::Debug for SkewTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkewTable")
            .field("start", &self.table[0])
            .field("end", &self.table[TABLE_SIZE - 1])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_table_endpoints() {
        let rising = ExpTable::new(1000.0, -1.0, 0.0, -0.0008);
        assert!((rising.get(0) - 0.0002).abs() < 1e-6);
        assert!((rising.get(TABLE_SIZE - 1) - 0.9992).abs() < 1e-4);

        let falling = ExpTable::new(0.001, 0.0, 1.0, -0.0008);
        assert!((falling.get(0) - 0.9992).abs() < 1e-4);
        assert!((falling.get(TABLE_SIZE - 1) - 0.0002).abs() < 1e-5);
    }

    #[test]
    fn test_exp_table_interpolates_between_entries() {
        let table = ExpTable::new(0.001, 0.0, 1.0, -0.0008);
        let mid = table.sample(10.5);
        let lo = table.get(10);
        let hi = table.get(11);
        assert!(mid <= lo && mid >= hi, "{hi} <= {mid} <= {lo}");
        assert_eq!(table.sample(5000.0), table.get(TABLE_SIZE - 1));
    }

    #[test]
    fn test_skew_table_hits_center_and_ends() {
        let table = SkewTable::new(0.0, 8000.0, 500.0);
        assert!(table.warp(0.0).abs() < 1e-3);
        assert!((table.warp(1.0) - 8000.0).abs() < 1e-2);
        let center = table.warp(0.5);
        assert!((center - 500.0).abs() < 10.0, "center = {center}");
    }

    #[test]
    fn test_skew_table_monotonic() {
        let table = SkewTable::new(0.0, 20000.0, 1000.0);
        let mut prev = table.warp(0.0);
        for i in 1..=100 {
            let v = table.warp(i as f32 / 100.0);
            assert!(v >= prev, "not monotonic at {i}");
            prev = v;
        }
    }
}
