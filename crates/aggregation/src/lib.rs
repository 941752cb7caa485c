//! Temporal aggregation of calibrated probabilities.
//!
//! Severe jobs are driven by per-cycle offset tables ([`window_for`]):
//!
//! ```text
//! hourly neighborhood fields ──► calibrate ──► 4-hour product
//!                                    │
//!                                    ▼
//!                           HazardAccumulator
//!                                    │
//!                                    ▼
//!                  full period: every 4th field, sum + max,
//!                  day table, floored by every hourly field
//! ```
//!
//! Thunder full-period forecasts cover the hours to the next 12Z and are
//! constrained by the windowed forecasts and by the previous hour.

pub mod accumulator;
pub mod error;
pub mod lifecycle;
pub mod thunder;
pub mod window;

// Re-export commonly used types at crate root
pub use accumulator::HazardAccumulator;
pub use error::{AggregationError, Result};
pub use lifecycle::{HourLifecycle, HourState};
pub use thunder::{
    calibration_hour, full_period_end, hourly_products, predictor_hours, remainder, thunder_job,
    to_percent, MonotonicClamp, ThunderJob, WindowedForecasts, FULL_DAY,
};
pub use window::{window_for, CycleWindow, SevereJob, HREF_LAG_HOURS, HRRR_LAG_HOURS};
