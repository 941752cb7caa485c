//! Calibrated HREF thunder probabilities.
//!
//! Jobs 1-48 produce the 1-hour and 4-hour forecasts ending at that
//! forecast hour. Later job numbers produce full-period forecasts for a
//! block of hours, valid until the next 12Z.

pub mod config;
pub mod pipeline;

pub use config::ThunderConfig;
pub use pipeline::{JobSummary, ThunderPipeline, THUNDER_TABLE_VERSION};
