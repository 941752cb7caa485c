//! Aggregation error types.

use calib_common::CommonError;
use calibration::CalibrationError;
use thiserror::Error;

use crate::lifecycle::HourState;

/// Result type alias using AggregationError.
pub type Result<T> = std::result::Result<T, AggregationError>;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Unsupported cycle hour {0:02}Z")]
    UnsupportedCycle(u32),

    #[error("Forecast hour {fhour} is not valid for the {cycle_hour:02}Z cycle")]
    InvalidForecastHour { cycle_hour: u32, fhour: u32 },

    #[error("Job {job} is not defined for the {cycle_hour:02}Z cycle")]
    InvalidJob { cycle_hour: u32, job: u32 },

    #[error("Invalid transition for {key}: {from:?} -> {to:?}")]
    InvalidTransition {
        key: String,
        from: HourState,
        to: HourState,
    },

    #[error("Valid time {0} is not tracked by this cycle")]
    UnknownHour(String),

    #[error("No hourly {0} fields to aggregate")]
    EmptyWindow(String),

    #[error(transparent)]
    Grid(#[from] CommonError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl AggregationError {
    pub fn invalid_hour(cycle_hour: u32, fhour: u32) -> Self {
        Self::InvalidForecastHour { cycle_hour, fhour }
    }

    pub fn invalid_transition(key: impl Into<String>, from: HourState, to: HourState) -> Self {
        Self::InvalidTransition {
            key: key.into(),
            from,
            to,
        }
    }
}
