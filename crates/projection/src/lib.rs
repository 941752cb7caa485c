//! Map projections used to recover per-point coordinates of GRIB2 grids.
//!
//! Only the Lambert conformal conic projection is needed: both the
//! convection-allowing member grids and the 40 km verification grid use it.

pub mod lambert;

pub use lambert::{LambertConformal, ScanOrder};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("invalid projection parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
