//! Test data generators for synthetic ensemble fields.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite. All grids are row-major, row 0 first.

/// Zeros with isolated storm cells: each `(col, row, value)` sets one point.
///
/// Typical use is an updraft helicity field with a few cells above the
/// member threshold.
pub fn create_storm_grid(width: usize, height: usize, cells: &[(usize, usize, f32)]) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row, value) in cells {
        if col < width && row < height {
            data[row * width + col] = value;
        }
    }
    data
}

/// Latitude and longitude arrays for a regular grid whose first point is
/// (`lat0`, `lon0`), rows stepping north and columns east by `step` degrees.
pub fn regular_latlon(
    width: usize,
    height: usize,
    lat0: f64,
    lon0: f64,
    step: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut lats = Vec::with_capacity(width * height);
    let mut lons = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            lats.push(lat0 + row as f64 * step);
            lons.push(lon0 + col as f64 * step);
        }
    }
    (lats, lons)
}
