//! Per-gridpoint additive corrections for thunder probabilities.

use std::io::ErrorKind;
use std::path::Path;

use calib_common::{CommonError, Field2D};
use grid_processor::gaussian_filter;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CalibrationError, Result};

/// Gaussian truncation used before binning.
const TRUNCATE: f64 = 4.0;

/// Number of percent bins (0, 10, ..., 90).
pub const THUNDER_BINS: usize = 10;

/// Bin index for a percent value: under 5 is bin 0, `[5, 15)` bin 1, and
/// so on; 85 and above is bin 9.
pub fn thunder_bin(percent: f32) -> usize {
    if !(percent >= 5.0) {
        return 0;
    }
    (((percent - 5.0) / 10.0).floor() as usize + 1).min(THUNDER_BINS - 1)
}

#[derive(Deserialize)]
struct CorrectionFile {
    corrections: Vec<Vec<Vec<f64>>>,
}

/// Additive correction in percent, indexed `[row][col][bin]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionTable {
    nx: usize,
    ny: usize,
    values: Vec<f64>,
}

impl CorrectionTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CalibrationError::table_missing(path))
            }
            Err(e) => return Err(e.into()),
        };
        let file: CorrectionFile =
            serde_json::from_str(&text).map_err(|e| CalibrationError::malformed(path, e))?;
        let table = Self::from_nested(file.corrections).map_err(|e| CalibrationError::malformed(path, e))?;
        debug!(path = %path.display(), nx = table.nx, ny = table.ny, "Loaded thunder corrections");
        Ok(table)
    }

    pub fn from_nested(rows: Vec<Vec<Vec<f64>>>) -> std::result::Result<Self, String> {
        let ny = rows.len();
        let nx = rows.first().map_or(0, Vec::len);
        if nx == 0 {
            return Err("correction table is empty".to_string());
        }
        let mut values = Vec::with_capacity(nx * ny * THUNDER_BINS);
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != nx {
                return Err(format!("row {} has {} columns, expected {}", r, row.len(), nx));
            }
            for (c, bins) in row.into_iter().enumerate() {
                if bins.len() < THUNDER_BINS {
                    return Err(format!(
                        "cell ({}, {}) has {} bins, expected {}",
                        r,
                        c,
                        bins.len(),
                        THUNDER_BINS
                    ));
                }
                values.extend_from_slice(&bins[..THUNDER_BINS]);
            }
        }
        Ok(Self { nx, ny, values })
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn correction(&self, row: usize, col: usize, bin: usize) -> Option<f64> {
        if row >= self.ny || col >= self.nx || bin >= THUNDER_BINS {
            return None;
        }
        Some(self.values[(row * self.nx + col) * THUNDER_BINS + bin])
    }

    /// Smooth `probability` (fraction) with a Gaussian of `sigma` cells,
    /// then add each cell's correction for its percent bin. Results are
    /// clipped to `[0, 1]`; missing cells become 0. Returns a fraction.
    pub fn apply(&self, probability: &Field2D, sigma: f64) -> Result<Field2D> {
        if probability.shape() != self.shape() {
            return Err(CommonError::shape_mismatch(self.shape(), probability.shape()).into());
        }
        let smoothed = gaussian_filter(probability, sigma, TRUNCATE)?;
        let out: Vec<f32> = smoothed
            .data()
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let bin = thunder_bin(p * 100.0);
                let corrected = p as f64 + self.values[i * THUNDER_BINS + bin] / 100.0;
                corrected.max(0.0).min(1.0) as f32
            })
            .collect();
        Ok(Field2D::new(self.nx, self.ny, out)?)
    }
}
