//! Cycle and valid-time helpers.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Format used for cache keys: `YYYYMMDDHH`.
pub const VALID_TIME_FORMAT: &str = "%Y%m%d%H";

/// Cache key for a valid time.
pub fn valid_time_key(time: DateTime<Utc>) -> String {
    time.format(VALID_TIME_FORMAT).to_string()
}

/// Parse a `YYYYMMDDHH` key back into a time.
pub fn parse_valid_time_key(key: &str) -> CommonResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(&format!("{}00", key), "%Y%m%d%H%M")
        .map_err(|e| CommonError::invalid_time(format!("'{}': {}", key, e)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// A forecast cycle: a date and a cycle hour (00, 03, 12, 15, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cycle {
    pub date: NaiveDate,
    pub hour: u32,
}

impl Cycle {
    pub fn new(date: NaiveDate, hour: u32) -> CommonResult<Self> {
        if hour > 23 {
            return Err(CommonError::invalid_time(format!("cycle hour {} out of range", hour)));
        }
        Ok(Self { date, hour })
    }

    /// Parse `YYYYMMDD` and `HH`.
    pub fn parse(date: &str, hour: &str) -> CommonResult<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y%m%d")
            .map_err(|e| CommonError::invalid_time(format!("date '{}': {}", date, e)))?;
        let hour = hour
            .parse::<u32>()
            .map_err(|e| CommonError::invalid_time(format!("hour '{}': {}", hour, e)))?;
        Self::new(date, hour)
    }

    /// Parse a `YYYYMMDDHH` string.
    pub fn parse_compact(value: &str) -> CommonResult<Self> {
        if value.len() != 10 || !value.is_ascii() {
            return Err(CommonError::invalid_time(format!("'{}' is not YYYYMMDDHH", value)));
        }
        Self::parse(&value[..8], &value[8..])
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.at_hour(self.hour)
    }

    /// Midnight-relative time on this cycle's date.
    pub fn at_hour(&self, hour: u32) -> DateTime<Utc> {
        let midnight = self.date.and_hms_opt(0, 0, 0).unwrap_or_default();
        Utc.from_utc_datetime(&midnight) + Duration::hours(hour as i64)
    }

    /// Two-digit cycle hour, e.g. "03".
    pub fn hour_str(&self) -> String {
        format!("{:02}", self.hour)
    }

    /// `YYYYMMDD`.
    pub fn date_str(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// Cycle `hours` earlier (may cross into the previous day).
    pub fn shifted(&self, hours: i64) -> Cycle {
        let t = self.reference_time() + Duration::hours(hours);
        Cycle {
            date: t.date_naive(),
            hour: chrono::Timelike::hour(&t),
        }
    }

    /// Valid time of forecast hour `fhour` from this cycle.
    pub fn valid_time(&self, fhour: u32) -> DateTime<Utc> {
        self.reference_time() + Duration::hours(fhour as i64)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.date.format("%Y%m%d"), self.hour)
    }
}
