//! Probability bin schemes.
//!
//! Both schemes have 11 buckets. A value falls in bucket `k` when it is at
//! least the `k`-th edge and below the next one; values under the first edge
//! (and NaN) land in bucket 0, values at or above the last edge in bucket 10.

use calib_common::Field2D;

const HOURLY_EDGES: [f32; 10] = [5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 95.0];
const FULL_PERIOD_EDGES: [f32; 10] = [2.5, 7.5, 12.5, 17.5, 22.5, 27.5, 32.5, 37.5, 42.5, 47.5];

/// Number of buckets in each scheme.
pub const BUCKETS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinScheme {
    /// Percent probabilities binned to 0, 10, ..., 100.
    Hourly,
    /// Summed or maximum percent binned to 0, 5, ..., 50.
    FullPeriod,
}

impl BinScheme {
    fn edges(&self) -> &'static [f32; 10] {
        match self {
            BinScheme::Hourly => &HOURLY_EDGES,
            BinScheme::FullPeriod => &FULL_PERIOD_EDGES,
        }
    }

    /// Bucket index for a value.
    pub fn bucket(&self, value: f32) -> usize {
        if value.is_nan() {
            return 0;
        }
        self.edges().iter().take_while(|&&edge| value >= edge).count()
    }

    /// Representative value of a bucket.
    pub fn bin_value(&self, bucket: usize) -> f32 {
        let step = match self {
            BinScheme::Hourly => 10.0,
            BinScheme::FullPeriod => 5.0,
        };
        bucket.min(BUCKETS - 1) as f32 * step
    }

    /// Bucket index of every cell, row-major.
    pub fn bin_field(&self, field: &Field2D) -> Vec<usize> {
        field.data().iter().map(|&v| self.bucket(v)).collect()
    }
}

/// Bucket on the hourly scheme.
pub fn binhaz(value: f32) -> usize {
    BinScheme::Hourly.bucket(value)
}

/// Bucket on the full-period scheme.
pub fn binhaz24(value: f32) -> usize {
    BinScheme::FullPeriod.bucket(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_edges() {
        assert_eq!(binhaz(24.9), 2);
        assert_eq!(binhaz(25.0), 3);
        assert_eq!(binhaz(4.999), 0);
        assert_eq!(binhaz(5.0), 1);
        assert_eq!(binhaz(94.9), 9);
        assert_eq!(binhaz(95.0), 10);
    }

    #[test]
    fn test_full_period_edges() {
        assert_eq!(binhaz24(2.4), 0);
        assert_eq!(binhaz24(2.5), 1);
        assert_eq!(binhaz24(47.4), 9);
        assert_eq!(binhaz24(47.5), 10);
    }

    #[test]
    fn test_total_over_extremes() {
        for scheme in [BinScheme::Hourly, BinScheme::FullPeriod] {
            assert_eq!(scheme.bucket(f32::NAN), 0);
            assert_eq!(scheme.bucket(f32::NEG_INFINITY), 0);
            assert_eq!(scheme.bucket(-50.0), 0);
            assert_eq!(scheme.bucket(1e9), 10);
            assert_eq!(scheme.bucket(f32::INFINITY), 10);
        }
    }

    #[test]
    fn test_idempotent_on_bin_values() {
        for scheme in [BinScheme::Hourly, BinScheme::FullPeriod] {
            for k in 0..BUCKETS {
                let value = scheme.bin_value(k);
                assert_eq!(scheme.bucket(value), k);
                assert_eq!(scheme.bin_value(scheme.bucket(value)), value);
            }
        }
    }

    #[test]
    fn test_monotonic() {
        let mut previous = 0;
        let mut v = -10.0f32;
        while v < 120.0 {
            let b = binhaz(v);
            assert!(b >= previous);
            previous = b;
            v += 0.25;
        }
    }
}
