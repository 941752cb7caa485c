//! Common types shared across the calibrated severe and thunder guidance crates.
//!
//! Grids are stored row-major as `Vec<f32>` with `nx` columns and `ny` rows,
//! matching the storage order of the GRIB2 messages they are decoded from.
//! Coordinates travel alongside values in [`ForecastGrid`] so shape mismatches
//! are caught once, at construction.

pub mod error;
pub mod grid;
pub mod hazard;
pub mod naming;
pub mod time;

pub use error::{CommonError, CommonResult};
pub use grid::{Field2D, ForecastGrid, GridCoords};
pub use hazard::{AggregationWindow, Hazard, SEVERE_HAZARDS};
pub use naming::{
    cycle_cache_name, day_table_name, hourly_cache_name, hourly_table_name, severe_output_name,
    thunder_output_name, thunder_table_path,
};
pub use time::{parse_valid_time_key, valid_time_key, Cycle};
