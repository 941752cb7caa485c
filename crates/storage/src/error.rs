//! Storage error types.

use std::path::PathBuf;

use calib_common::CommonError;
use calibration::CalibrationError;
use thiserror::Error;

/// Result type alias using StorageError.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Invalid path: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("Failed to build {name}: {reason}")]
    Build { name: String, reason: String },

    #[error(transparent)]
    Grid(#[from] CommonError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Map an IO error, turning a missing file into `NotFound`.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(path)
        } else {
            Self::Io(err)
        }
    }
}
