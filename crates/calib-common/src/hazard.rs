//! Hazards and aggregation windows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// A forecast hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hazard {
    Tornado,
    Hail,
    Wind,
    Thunder,
}

/// The three severe hazards, in processing order.
pub const SEVERE_HAZARDS: [Hazard; 3] = [Hazard::Tornado, Hazard::Hail, Hazard::Wind];

impl Hazard {
    /// Short name used in file names and table paths.
    pub fn short_name(&self) -> &'static str {
        match self {
            Hazard::Tornado => "tor",
            Hazard::Hail => "hail",
            Hazard::Wind => "wind",
            Hazard::Thunder => "thunder",
        }
    }

    /// Ceiling (as a fraction) applied to calibration tables in capped mode.
    pub fn cap_fraction(&self) -> Option<f64> {
        match self {
            Hazard::Tornado | Hazard::Hail => Some(0.6),
            Hazard::Wind => Some(0.75),
            Hazard::Thunder => None,
        }
    }

    /// GRIB2 parameter number in discipline 0, category 19.
    pub fn grib_parameter(&self) -> u8 {
        match self {
            Hazard::Tornado => 197,
            Hazard::Hail => 198,
            Hazard::Wind => 199,
            Hazard::Thunder => 2,
        }
    }
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Hazard {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tor" | "tornado" => Ok(Hazard::Tornado),
            "hail" => Ok(Hazard::Hail),
            "wind" => Ok(Hazard::Wind),
            "thunder" => Ok(Hazard::Thunder),
            _ => Err(CommonError::unknown("hazard", s)),
        }
    }
}

/// Length of time a calibrated forecast covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationWindow {
    OneHour,
    FourHour,
    /// Convective day ending at 12Z, `hours` long (24 except late cycles).
    Day { hours: u32 },
    /// Thunder full period: hours remaining until the next 12Z.
    FullPeriod { hours: u32 },
}

impl AggregationWindow {
    pub fn hours(&self) -> u32 {
        match self {
            AggregationWindow::OneHour => 1,
            AggregationWindow::FourHour => 4,
            AggregationWindow::Day { hours } | AggregationWindow::FullPeriod { hours } => *hours,
        }
    }

    /// Label used in output file names.
    pub fn label(&self) -> &'static str {
        match self {
            AggregationWindow::OneHour => "1hr",
            AggregationWindow::FourHour => "4hr",
            AggregationWindow::Day { .. } => "24hr",
            AggregationWindow::FullPeriod { .. } => "full",
        }
    }
}
