//! Calibrated HREF/SREF severe weather probabilities.
//!
//! Each invocation runs one job of one cycle: either the 4-hour window
//! ending at an HREF forecast hour, or the convective-day product built
//! from the hourly windows cached by earlier jobs.

pub mod config;
pub mod pipeline;

pub use config::SevereConfig;
pub use pipeline::{calibrate_hour, JobSummary, SeverePipeline, SEVERE_TABLE_VERSION};
