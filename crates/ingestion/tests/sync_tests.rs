//! Waiting on a partially delivered ensemble.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use calib_common::Cycle;
use grib2_codec::Grib2Codec;
use ingestion::{
    severe_members, thunder_members, ExpectedCounts, HireswCore, MemberLoader, ModelRoots,
    RetryPolicy, SevereEnsemble, SrefRequest, SyncError, Synchronizer, ThunderEnsemble,
};
use test_utils::{arrive_later, concat_messages, Grib2Builder};
use tokio_test::{assert_err, assert_ok};

fn roots(dir: &Path) -> ModelRoots {
    ModelRoots {
        hiresw: dir.join("com/hiresw"),
        hrrr: dir.join("com/hrrr"),
        nam: dir.join("com/nam"),
        nam_post: dir.join("com"),
    }
}

fn write(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn thunder_file() -> Vec<u8> {
    let refl = Grib2Builder::new_uh_member()
        .with_parameter(16, 195)
        .with_level(103, 263)
        .instantaneous()
        .with_data(vec![42.0; 12])
        .build();
    let precip = Grib2Builder::new_uh_member()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_data(vec![1.5; 12])
        .build();
    let li = Grib2Builder::new_uh_member()
        .with_parameter(7, 193)
        .instantaneous()
        .with_data(vec![-4.0; 12])
        .build();
    concat_messages(&[refl, precip, li])
}

#[tokio::test(start_paused = true)]
async fn test_thunder_hour_waits_for_late_hrrr() {
    let dir = tempfile::tempdir().unwrap();
    let cycle = Cycle::parse("20240501", "12").unwrap();
    let members = thunder_members(&cycle, &roots(dir.path()), HireswCore::Fv3);
    let expected = ExpectedCounts::for_cycle(&cycle, HireswCore::Fv3).files(2);
    assert_eq!(expected, 20);

    let mut arrivals = Vec::new();
    for (index, member) in members.iter().enumerate() {
        for hour in [1, 2] {
            if index >= 8 {
                arrivals.push(arrive_later(member.path(hour), Duration::from_secs(70), thunder_file()));
            } else {
                write(&member.path(hour), &thunder_file());
            }
        }
    }

    let sync = Synchronizer::new(RetryPolicy::thunder());
    let loader = MemberLoader::new(Grib2Codec::new());
    let mut ensemble = ThunderEnsemble::new(members, 1..=2);
    let report = assert_ok!(ensemble.synchronize(&loader, &sync, expected).await);
    for arrival in arrivals {
        arrival.await.unwrap();
    }

    assert_eq!(report.retries, 2);
    assert!(!report.delayed);
    let loaded = ensemble.into_members();
    assert_eq!(loaded.len(), 10);
    let hrrr_tl = &loaded[9];
    assert_eq!(hrrr_tl.descriptor.name, "hrrr_ncep_tl");
    let hour = &hrrr_tl.hours[&8];
    assert_eq!(hour.reflectivity.get(0, 0), Some(42.0));
    assert_eq!(hour.lifted_index.get(2, 3), Some(-4.0));
}

#[tokio::test(start_paused = true)]
async fn test_severe_reads_gzip_members() {
    let dir = tempfile::tempdir().unwrap();
    let cycle = Cycle::parse("20240501", "00").unwrap();
    let members = severe_members(&cycle, &roots(dir.path()), HireswCore::Nmmb);
    let mut data = vec![0.0; 12];
    data[0] = 150.0;
    let uh = gzip(&Grib2Builder::new_uh_member().with_data(data).build());
    for member in &members {
        write(&member.path(3), &uh);
    }

    let sync = Synchronizer::new(RetryPolicy::new(Duration::from_secs(60), 1));
    let loader = MemberLoader::new(Grib2Codec::new());
    let mut ensemble = SevereEnsemble::new(members, 3..=3);
    let report = assert_ok!(ensemble.synchronize(&loader, &sync).await);
    assert_eq!(report.retries, 0);

    // 150 exceeds the ARW, HRRR, NAM and NMMB thresholds alike.
    for index in 0..10 {
        assert_eq!(ensemble.member_masks(index)[0].get(0, 0), Some(1.0));
    }
}

#[tokio::test(start_paused = true)]
async fn test_sref_wait_exhausts_budget() {
    let dir = tempfile::tempdir().unwrap();
    let run = Cycle::parse("20240430", "21").unwrap();
    let request = SrefRequest::new(
        &dir.path().join("sref"),
        run,
        vec![15, 18],
        ["sigtp1"],
        dir.path().join("work"),
    );
    write(&request.source_file(15), b"gempak");

    let sync = Synchronizer::new(RetryPolicy::new(Duration::from_secs(60), 3));
    let started = tokio::time::Instant::now();
    let err = assert_err!(request.extract(&sync, Path::new("/usr/gempak/bin")).await);
    match err {
        SyncError::InsufficientEnsemble { retries, shortfall, .. } => {
            assert_eq!(retries, 3);
            assert!(shortfall.contains("spcsref_2024043021f018"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(started.elapsed(), Duration::from_secs(180));
    // Nothing ran, so no script was written.
    assert!(!request.script_path().exists());
}
