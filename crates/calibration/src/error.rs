//! Calibration error types.

use std::path::PathBuf;

use calib_common::CommonError;
use grid_processor::GridProcessorError;
use thiserror::Error;

/// Result type alias using CalibrationError.
pub type Result<T> = std::result::Result<T, CalibrationError>;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration table not found: {}", path.display())]
    TableMissing { path: PathBuf },

    #[error("Bin pair ({row}, {col}) is outside the {rows}x{cols} calibration table")]
    BinOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Malformed calibration table {}: {reason}", path.display())]
    MalformedTable { path: PathBuf, reason: String },

    #[error("Missing predictor {variable} for SREF hour {hour}")]
    MissingPredictor { variable: String, hour: u32 },

    #[error("Hazard {0} has no SREF predictor")]
    NoPredictor(String),

    #[error(transparent)]
    Grid(#[from] CommonError),

    #[error(transparent)]
    Processing(#[from] GridProcessorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalibrationError {
    pub fn table_missing(path: impl Into<PathBuf>) -> Self {
        Self::TableMissing { path: path.into() }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedTable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_predictor(variable: impl Into<String>, hour: u32) -> Self {
        Self::MissingPredictor {
            variable: variable.into(),
            hour,
        }
    }

    /// True for errors caused by absent or unusable configuration files.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::TableMissing { .. } | Self::BinOutOfRange { .. } | Self::MalformedTable { .. }
        )
    }
}
