//! Locating sample model output for tests.
//!
//! Real HREF member files are tens of megabytes and not checked in. Tests
//! that decode one look in a few places and skip when nothing is found.

use std::path::PathBuf;

/// Environment variable naming an extra directory of sample files.
pub const TEST_DATA_ENV: &str = "TEST_DATA_DIR";

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// `crates/{crate_name}/testdata/`.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root().join("crates").join(crate_name).join("testdata")
}

/// First existing `name` under `$TEST_DATA_DIR`, the codec and ingestion
/// `testdata/` directories, then `testdata/` at the workspace root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let env_dir = std::env::var(TEST_DATA_ENV).ok().map(PathBuf::from);
    env_dir
        .into_iter()
        .chain([
            crate_testdata_dir("grib2-codec"),
            crate_testdata_dir("ingestion"),
            workspace_root().join("testdata"),
        ])
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}
