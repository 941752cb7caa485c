//! Table-driven calibration of neighborhood probabilities.
//!
//! A raw ensemble probability and an environmental predictor are binned
//! independently and the pair indexes a reliability table of observed
//! frequencies:
//!
//! ```text
//! HREF probability ──► BinScheme ──┐
//!                                  ├──► CalibrationTable ──► percent
//! SREF predictor   ──► BinScheme ──┘        (capped)
//! ```
//!
//! Thunder probabilities use a per-gridpoint [`CorrectionTable`] instead.

pub mod binning;
pub mod correction;
pub mod error;
pub mod predictors;
pub mod table;

// Re-export commonly used types at crate root
pub use binning::{binhaz, binhaz24, BinScheme, BUCKETS};
pub use correction::{thunder_bin, CorrectionTable, THUNDER_BINS};
pub use error::{CalibrationError, Result};
pub use predictors::{sref_hours, sref_variables, SrefPredictors};
pub use table::CalibrationTable;
