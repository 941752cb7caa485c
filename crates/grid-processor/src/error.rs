//! Error types for grid processing.

use calib_common::CommonError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Values and coordinates, or two members, disagree on shape.
    #[error(transparent)]
    Shape(#[from] CommonError),

    /// No structuring element is tabulated for this radius.
    #[error("unsupported neighborhood radius {0} (tabulated radii: 0, 12, 13)")]
    UnsupportedRadius(u32),

    /// A map was applied to a grid it was not computed for.
    #[error("grid map expects {expected} source points, got {actual}")]
    MapMismatch { expected: usize, actual: usize },

    /// Nothing to average.
    #[error("no ensemble members contributed to {0}")]
    EmptyEnsemble(String),

    /// A source grid holds no finite coordinates.
    #[error("grid has no finite coordinates")]
    EmptyGrid,

    /// Invalid processing parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl GridProcessorError {
    /// Create a MapMismatch error.
    pub fn map_mismatch(expected: usize, actual: usize) -> Self {
        Self::MapMismatch { expected, actual }
    }

    /// Create an EmptyEnsemble error.
    pub fn empty_ensemble(what: impl Into<String>) -> Self {
        Self::EmptyEnsemble(what.into())
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
