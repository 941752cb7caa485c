//! Integration tests: decode synthetic member files, encode products.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use grib2_codec::{
    FieldSelector, Grib2Codec, Grib2Error, GridCodec, GridTemplate, LambertGrid, MessageSpec,
    ProductSpec,
};
use test_utils::{
    assert_approx_eq, assert_values_approx_eq, concat_messages, create_storm_grid,
    require_test_file, Grib2Builder,
};

fn uh_selector() -> FieldSelector {
    FieldSelector::new(7, 199)
        .with_generating_process(2)
        .with_first_surface_value(5000)
}

#[test]
fn test_decode_member_updraft_helicity() {
    let values = create_storm_grid(4, 3, &[(1, 1, 80.0), (3, 2, 12.5)]);
    let bytes = Grib2Builder::new_uh_member()
        .with_data(values.clone())
        .with_forecast_hour(5)
        .build();

    let codec = Grib2Codec::new();
    let field = codec.find(Bytes::from(bytes), &uh_selector()).unwrap();

    assert_eq!(field.short_name(), "MXUPHL");
    assert_eq!(field.product.forecast_time, 5);
    assert_eq!(field.values.shape(), (3, 4));
    assert_values_approx_eq!(field.values.data(), &values, 0.01);

    let (lat, lon) = field.coords.point(0);
    assert_approx_eq!(lat, 30.0, 1e-9);
    assert_approx_eq!(lon, -100.0, 1e-9);
    // Row 1 is half a degree north (scanning mode 0x40).
    let (lat, _) = field.coords.point(4);
    assert_approx_eq!(lat, 30.5, 1e-9);
}

#[test]
fn test_find_skips_non_matching_fields() {
    let refl = Grib2Builder::new_uh_member()
        .with_parameter(16, 195)
        .with_level(20, 263)
        .instantaneous()
        .with_data(create_storm_grid(4, 3, &[(0, 0, 45.0)]))
        .build();
    let uh = Grib2Builder::new_uh_member()
        .with_data(create_storm_grid(4, 3, &[(2, 2, 150.0)]))
        .build();
    let bytes = Bytes::from(concat_messages(&[refl, uh]));

    let codec = Grib2Codec::new();
    let all = codec.decode(bytes.clone()).unwrap();
    assert_eq!(all.len(), 2);

    let uh_field = codec.find(bytes.clone(), &uh_selector()).unwrap();
    assert_approx_eq!(uh_field.values.get(2, 2).unwrap(), 150.0, 0.01);

    let refl_selector = FieldSelector::new(16, 195)
        .with_first_surface_value(263)
        .instantaneous();
    let refl_field = codec.find(bytes.clone(), &refl_selector).unwrap();
    assert_approx_eq!(refl_field.values.get(0, 0).unwrap(), 45.0, 0.01);

    // Both fields share one grid definition, so coordinates are shared.
    assert!(std::sync::Arc::ptr_eq(&uh_field.coords, &refl_field.coords));
}

#[test]
fn test_interval_length_selector() {
    let apcp_1h = Grib2Builder::new_uh_member()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_statistics(1, 1)
        .with_data(create_storm_grid(4, 3, &[(1, 0, 3.0)]))
        .build();
    let apcp_run = Grib2Builder::new_uh_member()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_statistics(1, 6)
        .with_data(create_storm_grid(4, 3, &[(1, 0, 20.0)]))
        .build();
    let bytes = Bytes::from(concat_messages(&[apcp_run, apcp_1h]));

    let selector = FieldSelector::new(1, 8)
        .with_generating_process(2)
        .with_interval_lengths(&[0, 1]);
    let field = Grib2Codec::new().find(bytes, &selector).unwrap();
    assert_approx_eq!(field.values.get(0, 1).unwrap(), 3.0, 0.01);
}

#[test]
fn test_missing_field_is_reported() {
    let bytes = Grib2Builder::new_uh_member().build();
    let err = Grib2Codec::new()
        .find(Bytes::from(bytes), &FieldSelector::new(7, 193))
        .unwrap_err();
    assert!(matches!(err, Grib2Error::FieldNotFound(_)));
    assert!(err.to_string().contains("4LFTX"));
}

#[test]
fn test_truncated_file_is_rejected() {
    let mut bytes = Grib2Builder::new_uh_member().build();
    bytes.truncate(bytes.len() - 10);
    assert!(Grib2Codec::new().decode(Bytes::from(bytes)).is_err());
    assert!(Grib2Codec::new().decode(Bytes::from_static(b"not grib")).is_err());
}

#[test]
fn test_encode_probability_on_grid_212() {
    let codec = Grib2Codec::new();
    let reference = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
    let spec = MessageSpec::ncep(reference, 1, GridTemplate::Lambert(LambertGrid::ncep_212()));

    let mut values = vec![0.0f32; 185 * 129];
    values[0] = 5.0;
    values[185 * 64 + 92] = 45.0;
    values[185 * 129 - 1] = 60.0;
    let product = ProductSpec::probability(19, 198, 0, end, 24);

    let bytes = codec.encode(&spec, &[(product, &values)]).unwrap();
    let decoded = codec.decode(Bytes::from(bytes)).unwrap();
    assert_eq!(decoded.len(), 1);

    let field = &decoded[0];
    assert_eq!(field.reference_time, reference);
    assert_eq!(field.product.template, 9);
    assert_eq!(field.product.parameter_category, 19);
    assert_eq!(field.product.parameter_number, 198);
    assert_eq!(field.product.statistics.as_ref().unwrap().end_time, end);
    assert_values_approx_eq!(field.values.data(), &values, 1e-3);

    let (lat, lon) = field.coords.point(0);
    assert_approx_eq!(lat, 12.19, 1e-6);
    assert_approx_eq!(lon, -133.459, 1e-6);
}

#[test]
fn test_encode_several_hazards_in_one_message() {
    let codec = Grib2Codec::new();
    let reference = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
    let spec = MessageSpec::ncep(reference, 1, GridTemplate::Lambert(LambertGrid::ncep_212()));

    let tor = vec![2.0f32; 185 * 129];
    let hail = vec![15.0f32; 185 * 129];
    let fields = [
        (ProductSpec::probability(19, 197, 16, end, 4), &tor[..]),
        (ProductSpec::probability(19, 198, 16, end, 4), &hail[..]),
    ];
    let bytes = codec.encode(&spec, &fields).unwrap();
    let decoded = codec.decode(Bytes::from(bytes)).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[1].product.parameter_number, 198);
    assert_approx_eq!(decoded[1].values.data()[100], 15.0, 1e-4);
}

#[test]
fn test_real_hrrr_file() {
    let path = require_test_file!("hrrr.t00z.wrfsfcf01.grib2");
    let bytes = std::fs::read(path).unwrap();
    let field = Grib2Codec::new()
        .find(Bytes::from(bytes), &uh_selector())
        .unwrap();
    assert_eq!(field.values.shape(), (1059, 1799));
    assert!(field.values.max_value().unwrap() >= 0.0);
}
