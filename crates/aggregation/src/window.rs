//! Per-cycle offset tables for the severe product.
//!
//! Severe cycles come in pairs that share one HREF run: 00Z and 03Z read the
//! 00Z HREF, 12Z and 15Z the 12Z HREF. Each cycle pairs it with the newest
//! SREF run available at cycle time, so SREF hours are offset from HREF hours
//! by a fixed amount per cycle.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use calib_common::Cycle;
use calibration::sref_hours;
use chrono::{DateTime, Duration, Utc};

use crate::error::{AggregationError, Result};

/// Lag of the time-lagged HREF members.
pub const HREF_LAG_HOURS: u32 = 12;

/// Lag of the time-lagged HRRR member.
pub const HRRR_LAG_HOURS: u32 = 6;

/// Hour of the valid day's end (12Z the next day), from cycle-date midnight.
const DAY_END_HOUR: u32 = 36;

/// What a severe invocation computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SevereJob {
    /// The 4-hour window ending at this HREF forecast hour.
    Hour(u32),
    /// The convective-day product.
    FullPeriod,
}

impl FromStr for SevereJob {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("full") {
            return Ok(SevereJob::FullPeriod);
        }
        s.parse::<u32>()
            .map(SevereJob::Hour)
            .map_err(|_| format!("'{}' is neither a forecast hour nor 'full'", s))
    }
}

impl fmt::Display for SevereJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SevereJob::Hour(h) => write!(f, "f{:03}", h),
            SevereJob::FullPeriod => f.write_str("full"),
        }
    }
}

/// Hours a severe job reads, caches and emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleWindow {
    pub cycle_hour: u32,
    /// HREF run hour (0 or 12).
    pub href_run: u32,
    /// SREF run relative to the cycle (0 or -3 hours).
    pub sref_offset: i64,
    /// HREF hours read from the current run. The first three only prime
    /// the rolling maximum.
    pub href_hours: RangeInclusive<u32>,
    /// SREF hour of each calibrated window, in order.
    pub sref_hours: RangeInclusive<u32>,
    /// HREF-run forecast hours whose neighborhood caches feed this job.
    pub cache_hours: RangeInclusive<u32>,
    /// Length of the day product; 4 for an hourly job.
    pub period: u32,
}

fn href_run_for(cycle_hour: u32) -> Result<u32> {
    match cycle_hour {
        0 | 3 => Ok(0),
        12 | 15 => Ok(12),
        other => Err(AggregationError::UnsupportedCycle(other)),
    }
}

/// SREF runs: 21Z (previous day) for 00Z, 09Z for 12Z, the cycle's own run
/// for 03Z and 15Z.
fn sref_offset_for(cycle_hour: u32) -> i64 {
    match cycle_hour {
        0 | 12 => -3,
        _ => 0,
    }
}

/// Offsets for `job` in the cycle starting at `cycle_hour`.
pub fn window_for(cycle_hour: u32, job: SevereJob) -> Result<CycleWindow> {
    let href_run = href_run_for(cycle_hour)?;
    let sref_offset = sref_offset_for(cycle_hour);

    let window = match job {
        SevereJob::Hour(fhour) => {
            if fhour < 3 {
                return Err(AggregationError::invalid_hour(cycle_hour, fhour));
            }
            // Valid time href_run + fhour, measured from the SREF run.
            let sref = (href_run as i64 + fhour as i64 - cycle_hour as i64 - sref_offset) as u32;
            CycleWindow {
                cycle_hour,
                href_run,
                sref_offset,
                href_hours: fhour - 3..=fhour,
                sref_hours: sref..=sref,
                cache_hours: fhour..=fhour,
                period: 4,
            }
        }
        SevereJob::FullPeriod => {
            let (href_hours, sref_hours, cache_hours, period) = match cycle_hour {
                0 => (13..=36, 19..=39, 16..=36, 24),
                3 => (13..=36, 13..=33, 16..=36, 24),
                12 => (1..=24, 7..=27, 4..=24, 24),
                _ => (5..=24, 5..=21, 8..=24, 20),
            };
            CycleWindow {
                cycle_hour,
                href_run,
                sref_offset,
                href_hours,
                sref_hours,
                cache_hours,
                period,
            }
        }
    };
    Ok(window)
}

impl CycleWindow {
    /// The HREF run this cycle reads.
    pub fn href_cycle(&self, cycle: &Cycle) -> Cycle {
        cycle.shifted(self.href_run as i64 - self.cycle_hour as i64)
    }

    /// The SREF run this cycle reads.
    pub fn sref_cycle(&self, cycle: &Cycle) -> Cycle {
        cycle.shifted(self.sref_offset)
    }

    /// HREF hours to read from a run `lag` hours older.
    pub fn lagged_hours(&self, lag: u32) -> RangeInclusive<u32> {
        self.href_hours.start() + lag..=self.href_hours.end() + lag
    }

    /// Number of hourly calibrated windows.
    pub fn window_count(&self) -> usize {
        (self.sref_hours.end() - self.sref_hours.start() + 1) as usize
    }

    /// End of the `index`-th 4-hour window.
    pub fn valid_time(&self, cycle: &Cycle, index: usize) -> DateTime<Utc> {
        self.sref_cycle(cycle)
            .valid_time(self.sref_hours.start() + index as u32)
    }

    /// Lead time, from the cycle, of the window ending at `sref_hour`.
    pub fn output_hour(&self, sref_hour: u32) -> u32 {
        (sref_hour as i64 + self.sref_offset).max(0) as u32
    }

    /// Every 3-hourly SREF hour the predictor pairing touches.
    pub fn extraction_hours(&self) -> Vec<u32> {
        let (first, _) = sref_hours(*self.sref_hours.start());
        (first..self.sref_hours.end() + 3).step_by(3).collect()
    }

    /// Lead time of the day product's end.
    pub fn day_output_hour(&self) -> u32 {
        self.output_hour(*self.sref_hours.end())
    }

    /// End of the convective day: 12Z the day after the cycle date.
    pub fn day_end(&self, cycle: &Cycle) -> DateTime<Utc> {
        cycle.at_hour(DAY_END_HOUR)
    }

    pub fn day_start(&self, cycle: &Cycle) -> DateTime<Utc> {
        self.day_end(cycle) - Duration::hours(self.period as i64)
    }
}
