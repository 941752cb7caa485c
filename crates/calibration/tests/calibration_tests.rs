//! End-to-end calibration of toy probability fields.

use calib_common::{hourly_table_name, Field2D, Hazard};
use calibration::{BinScheme, CalibrationError, CalibrationTable, SrefPredictors};
use test_utils::{assert_approx_eq, ramp_table, write_calibration_table};

#[test]
fn test_hail_lookup_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = ramp_table();
    rows[3][7] = 0.9;
    let name = hourly_table_name(Hazard::Hail, 0, 21);
    let path = write_calibration_table(dir.path(), &name, &rows);

    let table = CalibrationTable::load(&path).unwrap();
    assert_approx_eq!(table.lookup(3, 7).unwrap() * 100.0, 90.0, 1e-9);

    let capped = table.with_cap(Hazard::Hail.cap_fraction());
    assert_approx_eq!(capped.lookup(3, 7).unwrap() * 100.0, 60.0, 1e-9);

    // 30% probability and 70% joint predictor land in bins 3 and 7.
    let probs = Field2D::filled(2, 2, 30.0);
    let mut sref = SrefPredictors::new();
    for hour in [18, 21] {
        sref.insert(hour, "hicapep1000", Field2D::filled(2, 2, 100.0));
        sref.insert(hour, "eshrp20", Field2D::filled(2, 2, 70.0));
    }
    let predictor = sref.predictor(Hazard::Hail, 21).unwrap();
    let out = capped.apply(&probs, &predictor, BinScheme::Hourly).unwrap();
    assert!(out.data().iter().all(|&v| (v - 60.0).abs() < 1e-4));
}

#[test]
fn test_thunder_has_no_cap() {
    let table = CalibrationTable::from_rows(vec![vec![0.95]]).unwrap();
    let table = table.with_cap(Hazard::Thunder.cap_fraction());
    assert_approx_eq!(table.lookup(0, 0).unwrap(), 0.95, 1e-12);
}

#[test]
fn test_missing_table_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CalibrationTable::load(&dir.path().join(hourly_table_name(Hazard::Tornado, 12, 9)))
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, CalibrationError::TableMissing { .. }));
}

#[test]
fn test_predictor_shape_must_match_probability() {
    let table = CalibrationTable::from_rows(ramp_table()).unwrap();
    let err = table
        .apply(&Field2D::zeros(3, 2), &Field2D::zeros(2, 3), BinScheme::Hourly)
        .unwrap_err();
    assert!(matches!(err, CalibrationError::Grid(_)));
}

#[test]
fn test_loaded_table_output_stays_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = ramp_table();
    rows[10][10] = 1.2;
    rows[0][0] = -0.05;
    let path = write_calibration_table(dir.path(), &hourly_table_name(Hazard::Wind, 12, 9), &rows);
    let table = CalibrationTable::load(&path).unwrap();

    let probs = Field2D::new(3, 1, vec![0.0, 99.0, 50.0]).unwrap();
    let predictor = Field2D::new(3, 1, vec![0.0, 100.0, 50.0]).unwrap();

    let out = table.apply(&probs, &predictor, BinScheme::Hourly).unwrap();
    assert_eq!(out.data()[0], 0.0);
    assert_eq!(out.data()[1], 100.0);
    assert_approx_eq!(out.data()[2], 50.0, 1e-4);

    let capped = table.with_cap(Hazard::Wind.cap_fraction());
    let out = capped.apply(&probs, &predictor, BinScheme::Hourly).unwrap();
    assert_eq!(out.data()[0], 0.0);
    assert_approx_eq!(out.data()[1], 75.0, 1e-4);
    assert_approx_eq!(out.data()[2], 50.0, 1e-4);
}
