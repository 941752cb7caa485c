//! Codec error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported template {section}.{template}")]
    UnsupportedTemplate { section: u8, template: u16 },

    #[error("Unpacking error: {0}")]
    UnpackingError(String),

    #[error("Packing error: {0}")]
    PackingError(String),

    #[error("No field matches {0}")]
    FieldNotFound(String),

    #[error("Grid error: {0}")]
    Grid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Grib2Error {
    pub fn invalid_section(section: u8, reason: impl Into<String>) -> Self {
        Self::InvalidSection {
            section,
            reason: reason.into(),
        }
    }

    pub fn field_not_found(selector: impl Into<String>) -> Self {
        Self::FieldNotFound(selector.into())
    }
}

impl From<calib_common::CommonError> for Grib2Error {
    fn from(err: calib_common::CommonError) -> Self {
        Self::Grid(err.to_string())
    }
}

impl From<projection::ProjectionError> for Grib2Error {
    fn from(err: projection::ProjectionError) -> Self {
        Self::Grid(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Grib2Error>;
