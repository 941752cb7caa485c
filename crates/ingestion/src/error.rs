//! Error types for the ingestion crate.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while synchronizing and loading ensemble inputs.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A file is not there yet. Only seen inside the retry loop.
    #[error("Not yet available: {what}")]
    TransientUnavailable { what: String },

    #[error("Insufficient ensemble for {what} after {retries} retries: {shortfall}")]
    InsufficientEnsemble {
        what: String,
        retries: u32,
        shortfall: String,
    },

    #[error("Malformed input {path}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("Required input missing: {what}")]
    ConfigurationMissing { what: String },

    #[error("Failed to decode {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: grib2_codec::Grib2Error,
    },

    #[error("Grid error: {0}")]
    Grid(#[from] grid_processor::GridProcessorError),

    #[error("Grid error: {0}")]
    Common(#[from] calib_common::CommonError),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn malformed(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::MalformedInput {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(what: impl Into<String>) -> Self {
        Self::ConfigurationMissing { what: what.into() }
    }

    pub fn codec(path: impl AsRef<Path>, source: grib2_codec::Grib2Error) -> Self {
        Self::Codec {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for the errors a retry can fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUnavailable { .. })
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, SyncError>;
