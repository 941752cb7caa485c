//! Thunder windows, jobs and full-period constraints.
//!
//! A full-period forecast made at forecast hour `h` covers the hours left
//! until the next 12Z (its remainder). Within one block the forecasts may
//! only decrease, and none may fall below the windowed forecasts for the
//! hours it covers.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use calib_common::{AggregationWindow, Cycle, Field2D};
use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::debug;

use crate::error::{AggregationError, Result};

/// Remainder of the first forecast in a new convective day.
pub const FULL_DAY: u32 = 24;

/// Jobs 1-48 make the windowed products for one forecast hour.
const LAST_HOUR_JOB: u32 = 48;

/// What one thunder invocation computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThunderJob {
    /// 1-hour and 4-hour forecasts ending at this hour.
    Hour(u32),
    /// Full-period forecasts over a block of forecast hours.
    FullPeriod(RangeInclusive<u32>),
}

/// Resolve a job number for a cycle.
pub fn thunder_job(cycle_hour: u32, job: u32) -> Result<ThunderJob> {
    if (1..=LAST_HOUR_JOB).contains(&job) {
        return Ok(ThunderJob::Hour(job));
    }
    let hours = match (cycle_hour, job) {
        (0, 49) => 0..=12,
        (0, 50) => 12..=36,
        (0, 51) => 36..=48,
        (12, 49) => 0..=24,
        (12, 50) => 24..=48,
        (0 | 12, _) => return Err(AggregationError::InvalidJob { cycle_hour, job }),
        _ => return Err(AggregationError::UnsupportedCycle(cycle_hour)),
    };
    Ok(ThunderJob::FullPeriod(hours))
}

/// Hours from forecast hour `fhour` to the end of its convective day.
pub fn remainder(cycle_hour: u32, fhour: u32) -> u32 {
    let mut r = (cycle_hour as i64 - 12).abs() + 24 - fhour as i64;
    if r > 24 {
        r -= 24;
    } else if cycle_hour == 0 && fhour >= 36 && r <= 0 {
        r += 12;
    } else if r <= 0 {
        r += 24;
    }
    r.max(0) as u32
}

/// End of the full period starting at `fhour`: 12Z the same day for starts
/// before 12Z, otherwise 12Z the next day.
pub fn full_period_end(cycle: &Cycle, fhour: u32) -> DateTime<Utc> {
    let start = cycle.valid_time(fhour);
    let noon = start - Duration::hours(start.hour() as i64) + Duration::hours(12);
    if start.hour() < 12 {
        noon
    } else {
        noon + Duration::days(1)
    }
}

/// Hour of day used to pick the thunder correction table.
pub fn calibration_hour(cycle: &Cycle, fhour: u32) -> u32 {
    cycle.valid_time(fhour).hour()
}

/// Predictor hours an hourly job needs: the 4-hour window when it exists,
/// otherwise only the 1-hour window.
pub fn predictor_hours(fhour: u32) -> RangeInclusive<u32> {
    if fhour < 4 {
        fhour.saturating_sub(1)..=fhour
    } else {
        fhour - 4..=fhour
    }
}

/// Windowed products an hourly job emits.
pub fn hourly_products(fhour: u32) -> Vec<AggregationWindow> {
    let mut products = Vec::new();
    if fhour >= 1 {
        products.push(AggregationWindow::OneHour);
    }
    if fhour >= 4 {
        products.push(AggregationWindow::FourHour);
    }
    products
}

/// Fraction to whole percent, rounding halves to even.
pub fn to_percent(fraction: &Field2D) -> Field2D {
    fraction.map(|v| (v * 100.0).round_ties_even())
}

/// Previously emitted 1-hour and 4-hour forecasts, keyed by the forecast
/// hour their window ends at.
#[derive(Debug, Clone, Default)]
pub struct WindowedForecasts {
    one_hour: BTreeMap<u32, Field2D>,
    four_hour: BTreeMap<u32, Field2D>,
}

impl WindowedForecasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, window: AggregationWindow, end_hour: u32, field: Field2D) {
        match window {
            AggregationWindow::OneHour => {
                self.one_hour.insert(end_hour, field);
            }
            AggregationWindow::FourHour => {
                self.four_hour.insert(end_hour, field);
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.one_hour.len() + self.four_hour.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest windowed forecast inside the period starting at `fhour`.
    ///
    /// Periods of 4 hours or more use the 4-hour forecasts ending at
    /// `fhour + 4 ..= fhour + remainder`; shorter periods use the 1-hour
    /// forecasts ending in the period. Missing forecasts are skipped;
    /// `None` when none are available.
    pub fn max_hour(&self, fhour: u32, remainder: u32) -> Result<Option<Field2D>> {
        let end = fhour + remainder;
        let fields: Vec<&Field2D> = if remainder >= 4 {
            self.four_hour.range(fhour + 4..=end).map(|(_, f)| f).collect()
        } else {
            self.one_hour.range(fhour + 1..=end).map(|(_, f)| f).collect()
        };
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Field2D::maximum_of(fields)?))
    }
}

/// Keeps full-period forecasts non-increasing within a block.
#[derive(Debug, Clone, Default)]
pub struct MonotonicClamp {
    last: Option<Field2D>,
}

impl MonotonicClamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from a forecast emitted by an earlier run.
    pub fn resume(&mut self, previous: Field2D) {
        self.last = Some(previous);
    }

    pub fn last(&self) -> Option<&Field2D> {
        self.last.as_ref()
    }

    /// Clamp `forecast` to the previous one unless it opens a new day.
    pub fn apply(&mut self, forecast: Field2D, remainder: u32) -> Result<Field2D> {
        let clamped = match &self.last {
            Some(last) if remainder != FULL_DAY => {
                debug!(remainder, "Clamping full-period forecast to previous hour");
                forecast.min_with(last)?
            }
            _ => forecast,
        };
        self.last = Some(clamped.clone());
        Ok(clamped)
    }
}
