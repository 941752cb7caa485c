//! Thunder predictor probabilities on the 40 km grid.
//!
//! Each member contributes three storm indicators (reflectivity, rainfall
//! and instability) over the product window. Indicators are masked where
//! the environment cannot support thunder, averaged over members and then
//! combined with fixed weights.

use std::collections::BTreeMap;
use std::sync::Arc;

use calib_common::Field2D;
use tracing::{debug, warn};

use crate::error::{GridProcessorError, Result};
use crate::remap::{GridMap, Reducer};

/// Reflectivity (dBZ) below which the masks treat a cell as storm-free.
const MASK_REFLECTIVITY: f32 = 35.0;

/// Which thunder forecast the predictors feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThunderProduct {
    OneHour,
    FourHour,
    /// Convective-day forecast over the hours remaining until 12Z.
    FullPeriod { hours: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Thresholds {
    reflectivity: f32,
    precipitation: f32,
    lifted_index: Option<f32>,
}

impl ThunderProduct {
    /// Hours covered by the window.
    pub fn period(&self) -> u32 {
        match self {
            ThunderProduct::OneHour => 1,
            ThunderProduct::FourHour => 4,
            ThunderProduct::FullPeriod { hours } => *hours,
        }
    }

    fn thresholds(&self) -> Thresholds {
        match self {
            ThunderProduct::OneHour => Thresholds {
                reflectivity: 40.0,
                precipitation: 1.0,
                lifted_index: Some(-3.0),
            },
            ThunderProduct::FourHour => Thresholds {
                reflectivity: 40.0,
                precipitation: 2.0,
                lifted_index: Some(-1.0),
            },
            ThunderProduct::FullPeriod { .. } => Thresholds {
                reflectivity: 40.0,
                precipitation: 2.0,
                lifted_index: None,
            },
        }
    }

    /// Weights for (reflectivity, precipitation, lifted index).
    fn weights(&self) -> (f32, f32, f32) {
        match self {
            ThunderProduct::FullPeriod { .. } => (0.6, 0.4, 0.0),
            _ => (0.6, 0.3, 0.1),
        }
    }
}

/// One hour of native-grid predictor fields.
#[derive(Debug, Clone)]
pub struct PredictorHour {
    /// Composite reflectivity, dBZ.
    pub reflectivity: Field2D,
    /// Precipitation accumulated over the hour ending at this hour, mm.
    pub precipitation: Field2D,
    /// Surface-based lifted index, K.
    pub lifted_index: Field2D,
}

/// Predictor fields of one ensemble member, keyed by the member's own
/// forecast hour.
#[derive(Debug, Clone)]
pub struct ThunderMember {
    name: String,
    hour_offset: u32,
    grid_map: Arc<GridMap>,
    hours: BTreeMap<u32, PredictorHour>,
}

impl ThunderMember {
    /// `hour_offset` shifts cycle forecast hours into this member's run
    /// (12 for lagged runs, 6 for the lagged HRRR).
    pub fn new(name: impl Into<String>, hour_offset: u32, grid_map: Arc<GridMap>) -> Self {
        Self {
            name: name.into(),
            hour_offset,
            grid_map,
            hours: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hour_offset(&self) -> u32 {
        self.hour_offset
    }

    pub fn insert_hour(&mut self, member_hour: u32, fields: PredictorHour) {
        self.hours.insert(member_hour, fields);
    }

    pub fn hour(&self, member_hour: u32) -> Option<&PredictorHour> {
        self.hours.get(&member_hour)
    }

    /// Number of loaded hours.
    pub fn loaded_hours(&self) -> usize {
        self.hours.len()
    }

    fn collect<'a>(
        &'a self,
        hours: impl Iterator<Item = u32>,
        pick: impl Fn(&'a PredictorHour) -> &'a Field2D,
    ) -> Option<Vec<&'a Field2D>> {
        hours.map(|h| self.hours.get(&h).map(&pick)).collect()
    }

    /// Indicator grids on the 40 km grid for a window starting at cycle
    /// forecast hour `start`. `None` if any required hour is missing.
    fn indicators(&self, product: ThunderProduct, start: u32) -> Result<Option<MemberIndicators>> {
        let first = start + self.hour_offset;
        let period = product.period();
        let thresholds = product.thresholds();

        let Some(refl) = self.collect(first..=first + period, |h| &h.reflectivity) else {
            return Ok(None);
        };
        let Some(precip) = self.collect(first + 1..=first + period, |h| &h.precipitation) else {
            return Ok(None);
        };
        let li = match thresholds.lifted_index {
            Some(_) => match self.collect(first..=first + period, |h| &h.lifted_index) {
                Some(li) => Some(li),
                None => return Ok(None),
            },
            None => None,
        };

        let refl = self.grid_map.apply(&Field2D::maximum_of(refl)?, Reducer::Max)?;
        let precip = self.grid_map.apply(&Field2D::sum_of(precip)?, Reducer::Max)?;
        let li = match li {
            Some(fields) => Some(self.grid_map.apply(&minimum_of(&fields)?, Reducer::Max)?),
            None => None,
        };

        let mask = match &li {
            Some(li) => li.zip_with(&refl, |l, r| {
                if l >= 0.0 && r < MASK_REFLECTIVITY {
                    0.0
                } else {
                    1.0
                }
            })?,
            None => refl.map(|r| if r < MASK_REFLECTIVITY { 0.0 } else { 1.0 }),
        };

        let exceed = |field: &Field2D, t: f32| field.map(|v| if v >= t { 1.0 } else { 0.0 });
        let reflectivity = exceed(&refl, thresholds.reflectivity).zip_with(&mask, |a, b| a * b)?;
        let precipitation =
            exceed(&precip, thresholds.precipitation).zip_with(&mask, |a, b| a * b)?;
        let lifted_index = match (li, thresholds.lifted_index) {
            (Some(li), Some(t)) => Some(
                li.map(|v| if v <= t { 1.0 } else { 0.0 })
                    .zip_with(&mask, |a, b| a * b)?,
            ),
            _ => None,
        };
        Ok(Some(MemberIndicators {
            reflectivity,
            precipitation,
            lifted_index,
        }))
    }
}

fn minimum_of(fields: &[&Field2D]) -> Result<Field2D> {
    let Some((first, rest)) = fields.split_first() else {
        return Err(GridProcessorError::empty_ensemble("lifted index window"));
    };
    Ok(rest
        .iter()
        .try_fold((*first).clone(), |acc, field| acc.min_with(field))?)
}

struct MemberIndicators {
    reflectivity: Field2D,
    precipitation: Field2D,
    lifted_index: Option<Field2D>,
}

/// Uncalibrated thunder probability (fraction 0-1) for the window starting
/// at cycle forecast hour `start`.
///
/// Members missing any hour of the window are left out. With no usable
/// member the result is all zeros on `target_shape` (rows, cols).
pub fn thunder_probability(
    members: &[ThunderMember],
    product: ThunderProduct,
    start: u32,
    target_shape: (usize, usize),
) -> Result<Field2D> {
    let (rows, cols) = target_shape;
    let mut refl_sum = Field2D::zeros(cols, rows);
    let mut precip_sum = Field2D::zeros(cols, rows);
    let mut li_sum = Field2D::zeros(cols, rows);
    let mut used = 0usize;

    for member in members {
        match member.indicators(product, start)? {
            Some(ind) => {
                refl_sum = refl_sum.zip_with(&ind.reflectivity, |a, b| a + b)?;
                precip_sum = precip_sum.zip_with(&ind.precipitation, |a, b| a + b)?;
                if let Some(li) = &ind.lifted_index {
                    li_sum = li_sum.zip_with(li, |a, b| a + b)?;
                }
                used += 1;
            }
            None => {
                warn!(
                    member = %member.name,
                    start_hour = start,
                    period = product.period(),
                    "Member is missing hours for the window, skipping"
                );
            }
        }
    }

    debug!(
        members = used,
        start_hour = start,
        period = product.period(),
        "Computed thunder predictors"
    );
    if used == 0 {
        return Ok(Field2D::zeros(cols, rows));
    }

    let n = used as f32;
    let (w_refl, w_precip, w_li) = product.weights();
    let combined = refl_sum
        .zip_with(&precip_sum, |r, p| w_refl * r / n + w_precip * p / n)?
        .zip_with(&li_sum, |acc, l| acc + w_li * l / n)?;
    Ok(combined)
}
