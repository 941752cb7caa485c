//! Two-predictor reliability tables.

use std::io::ErrorKind;
use std::path::Path;

use calib_common::{CommonError, Field2D};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binning::BinScheme;
use crate::error::{CalibrationError, Result};

/// Observed event frequency (fraction) for each
/// `[probability bin][predictor bin]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    #[serde(rename = "calib_table")]
    values: Vec<Vec<f64>>,
}

impl CalibrationTable {
    /// Build from rows. Rows must be non-empty and of equal length.
    pub fn from_rows(values: Vec<Vec<f64>>) -> std::result::Result<Self, String> {
        let cols = values.first().map_or(0, Vec::len);
        if cols == 0 {
            return Err("table is empty".to_string());
        }
        if let Some((i, row)) = values.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(format!("row {} has {} entries, expected {}", i, row.len(), cols));
        }
        Ok(Self { values })
    }

    /// Read a table stored as `{"calib_table": [[...], ...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CalibrationError::table_missing(path))
            }
            Err(e) => return Err(e.into()),
        };
        let raw: CalibrationTable =
            serde_json::from_str(&text).map_err(|e| CalibrationError::malformed(path, e))?;
        let table = Self::from_rows(raw.values).map_err(|e| CalibrationError::malformed(path, e))?;
        debug!(
            path = %path.display(),
            rows = table.rows(),
            cols = table.cols(),
            "Loaded calibration table"
        );
        Ok(table)
    }

    pub fn rows(&self) -> usize {
        self.values.len()
    }

    pub fn cols(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// Copy with every entry clipped to `[0, cap]` (a fraction).
    pub fn capped(&self, cap: f64) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|&v| v.max(0.0).min(cap)).collect())
                .collect(),
        }
    }

    /// Apply the hazard ceiling when capping is on.
    pub fn with_cap(self, cap: Option<f64>) -> Self {
        match cap {
            Some(cap) => self.capped(cap),
            None => self,
        }
    }

    /// Entry for a bin pair.
    pub fn lookup(&self, row: usize, col: usize) -> Result<f64> {
        self.values
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .ok_or_else(|| CalibrationError::BinOutOfRange {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Calibrated percent for every cell: bin both inputs with `scheme`
    /// and look the pair up. Results are clipped to `[0, 100]`.
    pub fn apply(&self, probability: &Field2D, predictor: &Field2D, scheme: BinScheme) -> Result<Field2D> {
        if probability.shape() != predictor.shape() {
            return Err(CommonError::shape_mismatch(probability.shape(), predictor.shape()).into());
        }
        let rows = scheme.bin_field(probability);
        let cols = scheme.bin_field(predictor);
        let out = rows
            .iter()
            .zip(&cols)
            .map(|(&r, &c)| self.lookup(r, c).map(|v| (v * 100.0).max(0.0).min(100.0) as f32))
            .collect::<Result<Vec<f32>>>()?;
        Ok(Field2D::new(probability.nx(), probability.ny(), out)?)
    }
}
