//! Shared test utilities for the calibration workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Test data path helpers
//! - Skip macros for optional test data (real model output is large)
//! - Grid and GRIB2 message generators
//! - Common fixtures (cycles, gdlist listings, calibration tables)
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! ```ignore
//! use test_utils::{require_test_file, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod grib;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use grib::*;
pub use paths::*;

/// Macro to skip a test if the required file is not found.
///
/// Used for tests that read real HREF member output, which is not checked in.
///
/// ```ignore
/// let path = require_test_file!("hrrr_wrfsfcf01_subset.grib2");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// ```ignore
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two value slices. NaN equals NaN.
///
/// ```ignore
/// assert_values_approx_eq!(field.data(), &[0.0, 12.5, 100.0], 1e-4);
/// ```
#[macro_export]
macro_rules! assert_values_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f32] = $left;
        let right: &[f32] = $right;
        assert_eq!(left.len(), right.len(), "length mismatch");
        for (i, (a, b)) in left.iter().zip(right.iter()).enumerate() {
            if a.is_nan() && b.is_nan() {
                continue;
            }
            let diff = (*a as f64 - *b as f64).abs();
            if !(diff <= $epsilon as f64) {
                panic!(
                    "assertion failed at index {}: `{:?}` vs `{:?}` (epsilon `{:?}`)",
                    i, a, b, $epsilon
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_values_approx_eq_treats_nan_as_equal() {
        assert_values_approx_eq!(&[1.0, f32::NAN], &[1.00001, f32::NAN], 1e-3);
    }

    #[test]
    #[should_panic(expected = "assertion failed at index 1")]
    fn test_assert_values_approx_eq_fails() {
        assert_values_approx_eq!(&[1.0, 2.0], &[1.0, 3.0], 1e-3);
    }
}
