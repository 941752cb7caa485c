//! Tests for grid containers used across the pipeline.

use std::sync::Arc;

use calib_common::{CommonError, Field2D, ForecastGrid, GridCoords};

// ============================================================================
// Coordinate validation
// ============================================================================

#[test]
fn test_coords_reject_mismatched_lat_lon() {
    let err = GridCoords::new(2, 2, vec![0.0; 4], vec![0.0; 3]).unwrap_err();
    assert!(matches!(err, CommonError::InvalidDimensions(_)));
}

#[test]
fn test_forecast_grid_shares_coords() {
    let coords = Arc::new(GridCoords::new(2, 1, vec![30.0, 30.0], vec![-100.0, -99.0]).unwrap());
    let a = ForecastGrid::new(Field2D::zeros(2, 1), coords.clone()).unwrap();
    let b = ForecastGrid::new(Field2D::filled(2, 1, 1.0), coords.clone()).unwrap();
    assert!(Arc::ptr_eq(a.coords(), b.coords()));
    assert_eq!(b.values().data(), &[1.0, 1.0]);
}

// ============================================================================
// Field arithmetic
// ============================================================================

#[test]
fn test_zip_with_rejects_shape_mismatch() {
    let a = Field2D::zeros(2, 3);
    let b = Field2D::zeros(3, 2);
    let err = a.zip_with(&b, |x, y| x + y).unwrap_err();
    match err {
        CommonError::ShapeMismatch { expected, actual } => {
            assert_eq!(expected, (3, 2));
            assert_eq!(actual, (2, 3));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_fill_nan_and_max_value() {
    let field = Field2D::new(3, 1, vec![f32::NAN, 2.0, 7.5]).unwrap();
    assert_eq!(field.max_value(), Some(7.5));
    assert_eq!(field.fill_nan(0.0).data(), &[0.0, 2.0, 7.5]);
    assert!(Field2D::filled(2, 2, f32::NAN).all_nan());
    assert_eq!(Field2D::filled(2, 2, f32::NAN).max_value(), None);
}
