//! File naming conventions for outputs, caches and calibration tables.

use crate::hazard::{AggregationWindow, Hazard};
use crate::time::Cycle;

/// Severe product, e.g. `href_cal_hail.t12z.4hr.f015.grib2`.
pub fn severe_output_name(cycle_hour: u32, hazard: Hazard, window: AggregationWindow, fhour: u32) -> String {
    format!(
        "href_cal_{}.t{:02}z.{}.f{:03}.grib2",
        hazard.short_name(),
        cycle_hour,
        window.label(),
        fhour
    )
}

/// Thunder product, e.g. `hrefct.t00z.thunder_full.f012.grib2`.
pub fn thunder_output_name(cycle_hour: u32, window: AggregationWindow, fhour: u32) -> String {
    format!(
        "hrefct.t{:02}z.thunder_{}.f{:03}.grib2",
        cycle_hour,
        window.label(),
        fhour
    )
}

/// Per-forecast-hour neighborhood probability cache.
pub fn hourly_cache_name(cycle: &Cycle, fhour: u32) -> String {
    format!("nprob_{}{}f{:03}.json.gz", cycle.date_str(), cycle.hour_str(), fhour)
}

/// Consolidated cache spanning a whole cycle.
pub fn cycle_cache_name(cycle: &Cycle) -> String {
    format!("nprob_{}{}.json.gz", cycle.date_str(), cycle.hour_str())
}

/// Hourly calibration table, keyed by the last two digits of the SREF hour.
pub fn hourly_table_name(hazard: Hazard, cycle_hour: u32, sref_hour: u32) -> String {
    format!(
        "cal_{}_tbl{:02}_f{:02}.json",
        hazard.short_name(),
        cycle_hour,
        sref_hour % 100
    )
}

/// Full-period (day) calibration table.
pub fn day_table_name(hazard: Hazard, cycle_hour: u32) -> String {
    format!("cal_{}_24h_tbl{:02}.json", hazard.short_name(), cycle_hour)
}

/// Thunder correction table, relative to the fix directory.
pub fn thunder_table_path(kind: &str, cycle_hour: u32, valid_hour: u32) -> String {
    format!("thunder/{}/{:02}_{}.json", kind, cycle_hour, valid_hour)
}
