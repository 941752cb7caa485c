//! Gaussian smoothing.
//!
//! Both filters are separable and run as two 1-D passes (rows, then
//! columns) over a zero-filled border.
//!
//! - [`nan_preserving_gaussian`] treats NaN cells as missing: they are
//!   filled from the weighted mean of their valid neighbours during the
//!   convolution and restored to NaN afterwards. Border cells count as valid
//!   zeros.
//! - [`gaussian_filter`] is a plain truncated Gaussian blur.

use calib_common::Field2D;

use crate::error::{GridProcessorError, Result};

/// Normalised 1-D Gaussian sampled at integer offsets `-radius..=radius`.
fn gaussian_weights(sigma: f64, radius: usize) -> Vec<f64> {
    let r = radius as isize;
    let raw: Vec<f64> = (-r..=r)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Smallest odd integer not below `8 * sigma`.
fn odd_kernel_size(sigma: f64) -> usize {
    let size = (8.0 * sigma).ceil() as usize;
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

fn check_sigma(sigma: f64) -> Result<()> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(GridProcessorError::invalid_parameter(format!(
            "smoothing sigma must be positive, got {}",
            sigma
        )));
    }
    Ok(())
}

/// One pass of a symmetric 1-D convolution. Cells outside the grid take
/// the value `outside`.
fn convolve_axis(
    data: &[f64],
    nx: usize,
    ny: usize,
    weights: &[f64],
    along_rows: bool,
    outside: f64,
) -> Vec<f64> {
    let radius = (weights.len() / 2) as isize;
    let mut out = vec![0.0; data.len()];
    for row in 0..ny {
        for col in 0..nx {
            let mut acc = 0.0;
            for (k, &w) in weights.iter().enumerate() {
                let offset = k as isize - radius;
                let (r, c) = if along_rows {
                    (row as isize, col as isize + offset)
                } else {
                    (row as isize + offset, col as isize)
                };
                let v = if r < 0 || c < 0 || r >= ny as isize || c >= nx as isize {
                    outside
                } else {
                    data[r as usize * nx + c as usize]
                };
                acc += w * v;
            }
            out[row * nx + col] = acc;
        }
    }
    out
}

fn convolve_separable(data: &[f64], nx: usize, ny: usize, weights: &[f64], outside: f64) -> Vec<f64> {
    let horizontal = convolve_axis(data, nx, ny, weights, true, outside);
    // A full row outside the grid sums to `outside` after the first pass.
    convolve_axis(&horizontal, nx, ny, weights, false, outside)
}

/// Gaussian smoothing that interpolates across missing (NaN) cells.
///
/// The kernel has standard deviation `sigma` cells and spans the odd size
/// not below `8 * sigma`. NaN inputs stay NaN; a cell whose whole footprint
/// is missing also becomes NaN.
pub fn nan_preserving_gaussian(field: &Field2D, sigma: f64) -> Result<Field2D> {
    check_sigma(sigma)?;
    let weights = gaussian_weights(sigma, odd_kernel_size(sigma) / 2);
    let (nx, ny) = (field.nx(), field.ny());

    let values: Vec<f64> = field
        .data()
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { v as f64 })
        .collect();
    let valid: Vec<f64> = field
        .data()
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { 1.0 })
        .collect();

    let top = convolve_separable(&values, nx, ny, &weights, 0.0);
    let bottom = convolve_separable(&valid, nx, ny, &weights, 1.0);

    let out: Vec<f32> = field
        .data()
        .iter()
        .zip(top.iter().zip(&bottom))
        .map(|(&orig, (&t, &b))| {
            if orig.is_nan() || b <= 0.0 {
                f32::NAN
            } else {
                (t / b) as f32
            }
        })
        .collect();
    Ok(Field2D::new(nx, ny, out)?)
}

/// Truncated Gaussian blur with a zero border. The kernel radius is
/// `round(truncate * sigma)`.
pub fn gaussian_filter(field: &Field2D, sigma: f64, truncate: f64) -> Result<Field2D> {
    check_sigma(sigma)?;
    let radius = (truncate * sigma + 0.5) as usize;
    let weights = gaussian_weights(sigma, radius);
    let (nx, ny) = (field.nx(), field.ny());
    let values: Vec<f64> = field.data().iter().map(|&v| v as f64).collect();
    let out = convolve_separable(&values, nx, ny, &weights, 0.0)
        .into_iter()
        .map(|v| v as f32)
        .collect();
    Ok(Field2D::new(nx, ny, out)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_kernel_size_is_odd() {
        assert_eq!(odd_kernel_size(12.5), 101);
        assert_eq!(odd_kernel_size(1.0), 9);
        assert_eq!(odd_kernel_size(0.3), 3);
    }

    #[test]
    fn test_weights_are_normalised() {
        let w = gaussian_weights(2.0, 8);
        assert_eq!(w.len(), 17);
        assert_approx_eq!(w.iter().sum::<f64>(), 1.0, 1e-12);
        assert_approx_eq!(w[0], w[16], 1e-15);
    }

    #[test]
    fn test_nan_cells_are_restored() {
        let mut field = Field2D::filled(5, 5, 40.0);
        field.set(2, 2, f32::NAN);
        let out = nan_preserving_gaussian(&field, 1.0).unwrap();
        assert!(out.get(2, 2).unwrap().is_nan());
        assert!(out.data().iter().filter(|v| v.is_nan()).count() == 1);
    }

    #[test]
    fn test_border_counts_as_zero() {
        // A uniform field loses mass at the edges but not at the centre
        // of a grid much wider than the kernel.
        let field = Field2D::filled(41, 41, 10.0);
        let out = nan_preserving_gaussian(&field, 1.0).unwrap();
        assert_approx_eq!(out.get(20, 20).unwrap(), 10.0, 1e-4);
        assert!(out.get(0, 0).unwrap() < 10.0);
    }

    #[test]
    fn test_missing_neighbours_are_interpolated() {
        // Valid neighbours of a NaN hole keep the local level instead of
        // being pulled toward zero.
        let mut field = Field2D::filled(41, 41, 10.0);
        for col in 10..30 {
            field.set(20, col, f32::NAN);
        }
        let out = nan_preserving_gaussian(&field, 2.0).unwrap();
        assert_approx_eq!(out.get(21, 20).unwrap(), 10.0, 1e-4);
    }

    #[test]
    fn test_gaussian_filter_conserves_interior_mass() {
        let mut field = Field2D::zeros(21, 21);
        field.set(10, 10, 1.0);
        let out = gaussian_filter(&field, 1.0, 4.0).unwrap();
        let total: f32 = out.data().iter().sum();
        assert_approx_eq!(total, 1.0, 1e-5);
        assert!(out.get(10, 10).unwrap() > out.get(10, 11).unwrap());
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(gaussian_filter(&Field2D::zeros(3, 3), 0.0, 4.0).is_err());
        assert!(nan_preserving_gaussian(&Field2D::zeros(3, 3), f64::NAN).is_err());
    }
}
