//! Collects a hazard's hourly calibrated fields and folds them into the
//! convective-day product.

use calib_common::{Field2D, Hazard};
use calibration::{BinScheme, CalibrationTable};
use tracing::debug;

use crate::error::{AggregationError, Result};

/// Every fourth hourly field starts a new, non-overlapping 4-hour window.
const WINDOW_STRIDE: usize = 4;

/// Hourly calibrated 4-hour probabilities for one hazard, in valid-time
/// order.
#[derive(Debug, Clone)]
pub struct HazardAccumulator {
    hazard: Hazard,
    fields: Vec<Field2D>,
}

impl HazardAccumulator {
    pub fn new(hazard: Hazard) -> Self {
        Self {
            hazard,
            fields: Vec::new(),
        }
    }

    pub fn hazard(&self) -> Hazard {
        self.hazard
    }

    /// Append the next hour. All fields must share a shape.
    pub fn push(&mut self, field: Field2D) -> Result<()> {
        if let Some(first) = self.fields.first() {
            first.ensure_same_shape(&field)?;
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field2D] {
        &self.fields
    }

    /// The non-overlapping windows: fields 0, 4, 8, ...
    fn disjoint_windows(&self) -> impl Iterator<Item = &Field2D> {
        self.fields.iter().step_by(WINDOW_STRIDE)
    }

    /// Full-period probability in percent.
    ///
    /// The sum and the maximum of the disjoint windows index `table` on the
    /// full-period bin scheme. The result never falls below any hourly
    /// field.
    pub fn full_period(&self, table: &CalibrationTable) -> Result<Field2D> {
        if self.fields.is_empty() {
            return Err(AggregationError::EmptyWindow(self.hazard.to_string()));
        }
        let total = Field2D::sum_of(self.disjoint_windows())?;
        let peak = Field2D::maximum_of(self.disjoint_windows())?;
        let calibrated = table.apply(&total, &peak, BinScheme::FullPeriod)?;
        let floor = Field2D::maximum_of(&self.fields)?;
        debug!(
            hazard = %self.hazard,
            hours = self.fields.len(),
            windows = self.disjoint_windows().count(),
            "Aggregated full period"
        );
        Ok(calibrated.max_with(&floor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, uniform_table};

    fn table() -> CalibrationTable {
        CalibrationTable::from_rows(uniform_table(0.05)).unwrap()
    }

    #[test]
    fn test_floor_is_hourly_maximum() {
        let mut acc = HazardAccumulator::new(Hazard::Tornado);
        for v in [2.0, 30.0, 4.0, 1.0, 3.0] {
            acc.push(Field2D::filled(2, 2, v)).unwrap();
        }
        let out = acc.full_period(&table()).unwrap();
        // Table gives 5%, but hour 1 reached 30%.
        assert!(out.data().iter().all(|&v| (v - 30.0).abs() < 1e-4));
    }

    #[test]
    fn test_table_value_when_above_inputs() {
        let mut acc = HazardAccumulator::new(Hazard::Hail);
        acc.push(Field2D::filled(1, 1, 1.0)).unwrap();
        let out = acc.full_period(&table()).unwrap();
        assert_approx_eq!(out.data()[0], 5.0, 1e-4);
    }

    #[test]
    fn test_uses_disjoint_windows() {
        // Bin (sum, max) of fields 0 and 4: 10 + 10 = 20 -> 4, max 10 -> 2.
        let mut rows = vec![vec![0.0; 11]; 11];
        rows[4][2] = 0.5;
        let table = CalibrationTable::from_rows(rows).unwrap();
        let mut acc = HazardAccumulator::new(Hazard::Wind);
        for v in [10.0, 0.0, 0.0, 0.0, 10.0, 0.0] {
            acc.push(Field2D::filled(1, 1, v)).unwrap();
        }
        assert_approx_eq!(acc.full_period(&table).unwrap().data()[0], 50.0, 1e-4);
    }

    #[test]
    fn test_empty_and_mismatched() {
        let mut acc = HazardAccumulator::new(Hazard::Wind);
        assert!(matches!(acc.full_period(&table()), Err(AggregationError::EmptyWindow(_))));
        acc.push(Field2D::zeros(2, 2)).unwrap();
        assert!(acc.push(Field2D::zeros(3, 2)).is_err());
    }
}
