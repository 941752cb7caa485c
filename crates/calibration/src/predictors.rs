//! SREF environmental predictors.
//!
//! The SREF is output every 3 hours. A 4-hour window is represented by the
//! (at most two) SREF hours inside it, and each predictor is the maximum
//! over those hours.

use std::collections::{BTreeMap, HashMap};

use calib_common::{Field2D, Hazard};

use crate::error::{CalibrationError, Result};

/// SREF variables each severe hazard needs.
pub fn sref_variables(hazard: Hazard) -> &'static [&'static str] {
    match hazard {
        Hazard::Tornado => &["sigtp1"],
        Hazard::Hail => &["hicapep1000", "eshrp20"],
        Hazard::Wind => &["hicapep250", "eshrp20"],
        Hazard::Thunder => &[],
    }
}

/// The pair of 3-hourly SREF hours covering the four hours ending at
/// `hour`. Both members are equal when only one falls in the window.
pub fn sref_hours(hour: u32) -> (u32, u32) {
    let h2 = 3 * (hour / 3);
    let h1 = h2 as i64 - 3;
    if h1 < 0 || h1 < hour as i64 - 4 {
        (h2, h2)
    } else {
        (h1 as u32, h2)
    }
}

/// SREF fields by forecast hour and variable name.
#[derive(Debug, Clone, Default)]
pub struct SrefPredictors {
    hours: BTreeMap<u32, HashMap<String, Field2D>>,
}

impl SrefPredictors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hour: u32, variable: impl Into<String>, field: Field2D) {
        self.hours.entry(hour).or_default().insert(variable.into(), field);
    }

    pub fn get(&self, hour: u32, variable: &str) -> Result<&Field2D> {
        self.hours
            .get(&hour)
            .and_then(|vars| vars.get(variable))
            .ok_or_else(|| CalibrationError::missing_predictor(variable, hour))
    }

    /// Forecast hours with at least one field.
    pub fn hours(&self) -> impl Iterator<Item = u32> + '_ {
        self.hours.keys().copied()
    }

    /// Maximum of `variable` over the SREF hour pair for `hour`.
    fn paired_max(&self, variable: &str, hour: u32) -> Result<Field2D> {
        let (h1, h2) = sref_hours(hour);
        let first = self.get(h1, variable)?;
        if h1 == h2 {
            return Ok(first.clone());
        }
        Ok(first.max_with(self.get(h2, variable)?)?)
    }

    /// The hazard's predictor field for the window ending at SREF hour `hour`.
    ///
    /// Tornado uses the significant tornado parameter probability directly.
    /// Hail and wind use the joint probability of instability and shear,
    /// `cape * shear / 100`.
    pub fn predictor(&self, hazard: Hazard, hour: u32) -> Result<Field2D> {
        match sref_variables(hazard) {
            [single] => self.paired_max(single, hour),
            [cape, shear] => {
                let cape = self.paired_max(cape, hour)?;
                let shear = self.paired_max(shear, hour)?;
                Ok(cape.zip_with(&shear, |c, s| c * s / 100.0)?)
            }
            _ => Err(CalibrationError::NoPredictor(hazard.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_sref_hour_pairs() {
        assert_eq!(sref_hours(19), (15, 18));
        assert_eq!(sref_hours(21), (18, 21));
        assert_eq!(sref_hours(20), (18, 18));
        assert_eq!(sref_hours(22), (18, 21));
        assert_eq!(sref_hours(7), (3, 6));
        assert_eq!(sref_hours(5), (3, 3));
        assert_eq!(sref_hours(3), (0, 3));
        assert_eq!(sref_hours(1), (0, 0));
    }

    #[test]
    fn test_tornado_predictor_takes_pair_max() {
        let mut sref = SrefPredictors::new();
        sref.insert(15, "sigtp1", Field2D::new(2, 1, vec![10.0, 40.0]).unwrap());
        sref.insert(18, "sigtp1", Field2D::new(2, 1, vec![30.0, 5.0]).unwrap());
        let p = sref.predictor(Hazard::Tornado, 19).unwrap();
        assert_eq!(p.data(), &[30.0, 40.0]);
    }

    #[test]
    fn test_hail_predictor_is_joint_probability() {
        let mut sref = SrefPredictors::new();
        for hour in [18, 21] {
            sref.insert(hour, "hicapep1000", Field2D::filled(1, 1, 80.0));
            sref.insert(hour, "eshrp20", Field2D::filled(1, 1, 50.0));
        }
        let p = sref.predictor(Hazard::Hail, 21).unwrap();
        assert_approx_eq!(p.data()[0], 40.0, 1e-5);
    }

    #[test]
    fn test_missing_variable() {
        let sref = SrefPredictors::new();
        let err = sref.predictor(Hazard::Wind, 21).unwrap_err();
        assert!(err.to_string().contains("hicapep250"));
        assert!(sref.predictor(Hazard::Thunder, 21).is_err());
    }
}
