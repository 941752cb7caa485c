//! End-to-end thunder jobs on a toy 4x3 grid.
//!
//! Member files carry reflectivity only, all zero, so the raw probability
//! is zero everywhere and the products are the bin-0 corrections.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use calib_common::{thunder_output_name, thunder_table_path, AggregationWindow, Cycle, Field2D};
use grib2_codec::{Grib2Codec, GridCodec};
use ingestion::{thunder_members, HireswCore, ModelRoots, RetryPolicy};
use storage::{Product, ProductWriter};
use test_utils::{write_correction_table, Grib2Builder};
use thunder_calibrator::{ThunderConfig, ThunderPipeline};

fn config(root: &Path) -> ThunderConfig {
    ThunderConfig {
        models: ModelRoots {
            hiresw: root.join("com/hiresw"),
            hrrr: root.join("com/hrrr"),
            nam: root.join("com/nam"),
            nam_post: root.join("com/spc_post"),
        },
        hiresw_core: HireswCore::Fv3,
        fix_dir: root.join("fix"),
        output_dir: root.join("com/spc_post/out"),
        map_dir: root.join("data/gridmaps"),
        wait: RetryPolicy::new(Duration::from_secs(60), 3).with_warn_after(1),
        min_members: 5,
    }
}

fn write(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn member_file() -> Vec<u8> {
    Grib2Builder::new_uh_member()
        .with_parameter(16, 195)
        .with_level(103, 263)
        .instantaneous()
        .build()
}

fn reference_grid() -> Vec<u8> {
    Grib2Builder::new_uh_member().build()
}

/// Every cell and bin of `kind` corrected by `percent`.
fn write_tables(
    config: &ThunderConfig,
    kind: &str,
    cycle_hour: u32,
    valid_hours: impl Iterator<Item = u32>,
    percent: f64,
) {
    for hour in valid_hours {
        write_correction_table(
            &config.table_dir(),
            &thunder_table_path(kind, cycle_hour, hour),
            3,
            4,
            |_, _, _| percent,
        );
    }
}

fn decode(path: &Path) -> grib2_codec::DecodedField {
    let bytes = Bytes::from(std::fs::read(path).unwrap());
    Grib2Codec::new().decode(bytes).unwrap().remove(0)
}

fn assert_all(field: &Field2D, expected: f32) {
    assert!(
        field.data().iter().all(|&v| (v - expected).abs() < 0.11),
        "expected {expected}, got {:?}",
        field.data()
    );
}

#[tokio::test(start_paused = true)]
async fn test_hourly_job_writes_both_windows() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let cycle = Cycle::parse("20240501", "00").unwrap();
    write(&config.reference_grid(), &reference_grid());
    write_tables(&config, "grid1hr", 0, 5..=5, 30.0);
    write_tables(&config, "grid", 0, 5..=5, 20.0);

    let file = member_file();
    for member in thunder_members(&cycle, &config.models, HireswCore::Fv3) {
        for hour in 1..=5 {
            write(&member.path(hour), &file);
        }
    }

    let pipeline = ThunderPipeline::new(config.clone(), cycle, 5, Grib2Codec::new()).unwrap();
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.written.len(), 2);

    let one_hour = decode(&config.product_dir().join("hrefct.t00z.thunder_1hr.f005.grib2"));
    assert_eq!(one_hour.product.parameter_category, 19);
    assert_eq!(one_hour.product.parameter_number, 2);
    assert_eq!(one_hour.product.forecast_time, 4);
    assert_eq!(one_hour.product.statistics.as_ref().unwrap().length, 1);
    assert_all(&one_hour.values, 30.0);

    let four_hour = decode(&config.product_dir().join("hrefct.t00z.thunder_4hr.f005.grib2"));
    assert_eq!(four_hour.product.forecast_time, 1);
    assert_eq!(four_hour.product.statistics.as_ref().unwrap().length, 4);
    assert_all(&four_hour.values, 20.0);

    // Grid maps are built once and reused.
    assert!(config.map_dir.join("max_3x4_to_3x4.json").is_file());

    // A rerun finds both products and does nothing.
    let rerun = pipeline.run().await.unwrap();
    assert!(rerun.written.is_empty());
    assert_eq!(rerun.skipped, vec![5]);
}

#[tokio::test(start_paused = true)]
async fn test_early_hour_writes_one_hour_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let cycle = Cycle::parse("20240501", "12").unwrap();
    write(&config.reference_grid(), &reference_grid());
    write_tables(&config, "grid1hr", 12, 14..=14, 10.0);

    let file = member_file();
    for member in thunder_members(&cycle, &config.models, HireswCore::Fv3) {
        for hour in 1..=2 {
            write(&member.path(hour), &file);
        }
    }

    let pipeline = ThunderPipeline::new(config.clone(), cycle, 2, Grib2Codec::new()).unwrap();
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.written.len(), 1);
    assert!(config.product_dir().join("hrefct.t12z.thunder_1hr.f002.grib2").is_file());
    assert!(!config.product_dir().join("hrefct.t12z.thunder_4hr.f002.grib2").exists());
}

#[tokio::test(start_paused = true)]
async fn test_hourly_shortfall_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let cycle = Cycle::parse("20240501", "00").unwrap();
    write(&config.reference_grid(), &reference_grid());
    write_tables(&config, "grid1hr", 0, 5..=5, 30.0);
    write_tables(&config, "grid", 0, 5..=5, 20.0);

    // Only the first five members arrive: 25 of the 50 files expected.
    let file = member_file();
    for member in thunder_members(&cycle, &config.models, HireswCore::Fv3).iter().take(5) {
        for hour in 1..=5 {
            write(&member.path(hour), &file);
        }
    }

    let pipeline = ThunderPipeline::new(config.clone(), cycle, 5, Grib2Codec::new()).unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("25 of 50"));
    assert!(!config.product_dir().exists());
}

fn write_windowed(
    config: &ThunderConfig,
    cycle: &Cycle,
    window: AggregationWindow,
    fhour: u32,
    value: f32,
) {
    let template = grib2_codec::scan_fields(&Bytes::from(reference_grid()))
        .unwrap()
        .remove(0)
        .grid
        .template
        .clone();
    let writer = ProductWriter::new(Grib2Codec::new(), config.product_dir(), template, 2);
    let product = Product {
        name: thunder_output_name(cycle.hour, window, fhour),
        parameter: 2,
        forecast_time: fhour - window.hours(),
        end_time: cycle.valid_time(fhour),
        length: window.hours(),
        values: Field2D::filled(4, 3, value),
    };
    writer.write_all(cycle.reference_time(), &[product]).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_full_period_block() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let cycle = Cycle::parse("20240501", "00").unwrap();
    write(&config.reference_grid(), &reference_grid());
    // Full-period hours 36-47 verify at 12Z-23Z.
    write_tables(&config, "fullperiod", 0, 12..=23, 10.0);

    // Five current-run members cover the block.
    let file = member_file();
    for member in thunder_members(&cycle, &config.models, HireswCore::Fv3).iter().step_by(2) {
        for hour in 36..=48 {
            write(&member.path(hour), &file);
        }
    }
    write_windowed(&config, &cycle, AggregationWindow::FourHour, 40, 50.0);
    write_windowed(&config, &cycle, AggregationWindow::OneHour, 47, 30.0);

    // Job 51 covers hours 36-48 of the 00Z cycle.
    let pipeline = ThunderPipeline::new(config.clone(), cycle, 51, Grib2Codec::new()).unwrap();
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.written.len(), 12);

    let name = |fhour: u32| {
        config
            .product_dir()
            .join(thunder_output_name(0, AggregationWindow::FullPeriod { hours: 0 }, fhour))
    };
    let first = decode(&name(36));
    // The 4-hour forecast ending at 40 lifts the first hour.
    assert_all(&first.values, 50.0);
    assert_eq!(first.product.forecast_time, 36);
    assert_eq!(first.product.statistics.as_ref().unwrap().length, 12);

    // Later hours never rise above the previous one.
    assert_all(&decode(&name(37)).values, 10.0);
    // The 1-hour floor (30%) is clamped back to the previous 10%.
    assert_all(&decode(&name(45)).values, 10.0);
    assert!(!name(48).exists());

    // A rerun resumes from the written products.
    let rerun = pipeline.run().await.unwrap();
    assert!(rerun.written.is_empty());
    assert_eq!(rerun.skipped.len(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_full_period_needs_five_members() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let cycle = Cycle::parse("20240501", "12").unwrap();
    write(&config.reference_grid(), &reference_grid());

    let file = member_file();
    for member in thunder_members(&cycle, &config.models, HireswCore::Fv3).iter().take(4) {
        for hour in 0..=24 {
            write(&member.path(hour), &file);
        }
    }

    let pipeline = ThunderPipeline::new(config, cycle, 49, Grib2Codec::new()).unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(err.to_string().contains("Not enough HREF members"));
}

#[test]
fn test_job_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let cycle = Cycle::parse("20240501", "12").unwrap();
    assert!(ThunderPipeline::new(config(dir.path()), cycle, 51, Grib2Codec::new()).is_err());
    let full = ThunderPipeline::new(config(dir.path()), cycle, 50, Grib2Codec::new()).unwrap();
    assert_eq!(full.job(), &aggregation::ThunderJob::FullPeriod(24..=48));
}
