//! Incremental cache of neighborhood probability fields.
//!
//! Each hourly severe job stores the field it computed in its own file. The
//! full-period job merges those files into one cycle file the first time it
//! runs and reads that file afterwards. Files are gzip-compressed JSON maps
//! from valid time (`YYYYMMDDHH`) to field.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use calib_common::{cycle_cache_name, hourly_cache_name, CommonError, Cycle, Field2D};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::error::{Result, StorageError};

/// Probability fields keyed by valid time.
pub type ProbabilityFields = BTreeMap<String, Field2D>;

/// Directory of cached probability files.
#[derive(Debug, Clone)]
pub struct ProbabilityCache {
    dir: PathBuf,
}

impl ProbabilityCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn hourly_path(&self, cycle: &Cycle, fhour: u32) -> PathBuf {
        self.dir.join(hourly_cache_name(cycle, fhour))
    }

    pub fn cycle_path(&self, cycle: &Cycle) -> PathBuf {
        self.dir.join(cycle_cache_name(cycle))
    }

    pub fn has_hour(&self, cycle: &Cycle, fhour: u32) -> bool {
        self.hourly_path(cycle, fhour).is_file()
    }

    pub fn save_hour(&self, cycle: &Cycle, fhour: u32, fields: &ProbabilityFields) -> Result<()> {
        let path = self.hourly_path(cycle, fhour);
        save(&path, fields)?;
        info!(path = %path.display(), entries = fields.len(), "Saved probability cache");
        Ok(())
    }

    pub fn load_hour(&self, cycle: &Cycle, fhour: u32) -> Result<ProbabilityFields> {
        load(&self.hourly_path(cycle, fhour))
    }

    /// Fields for the whole day of `cycle`.
    ///
    /// Reads the consolidated file when present. Otherwise merges the
    /// hourly files of `href_cycle` for `hours` and saves the result as the
    /// consolidated file. A missing hourly file is `NotFound`.
    pub fn consolidate(
        &self,
        cycle: &Cycle,
        href_cycle: &Cycle,
        hours: RangeInclusive<u32>,
    ) -> Result<ProbabilityFields> {
        let path = self.cycle_path(cycle);
        if path.is_file() {
            debug!(path = %path.display(), "Using consolidated probability cache");
            return load(&path);
        }

        let mut merged = ProbabilityFields::new();
        for fhour in hours {
            merged.extend(self.load_hour(href_cycle, fhour)?);
        }
        check_shapes(&path, &merged)?;
        save(&path, &merged)?;
        info!(
            path = %path.display(),
            entries = merged.len(),
            "Consolidated probability cache"
        );
        Ok(merged)
    }
}

fn check_shapes(path: &Path, fields: &ProbabilityFields) -> Result<()> {
    let mut shapes = fields.values().map(Field2D::shape);
    if let Some(first) = shapes.next() {
        if let Some(other) = shapes.find(|s| *s != first) {
            return Err(StorageError::corrupt(path, CommonError::shape_mismatch(first, other)));
        }
    }
    Ok(())
}

fn save(path: &Path, fields: &ProbabilityFields) -> Result<()> {
    check_shapes(path, fields)?;
    let json = serde_json::to_vec(fields).map_err(|e| StorageError::corrupt(path, e))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    write_atomic(path, &encoder.finish()?)
}

fn load(path: &Path) -> Result<ProbabilityFields> {
    let file = File::open(path).map_err(|e| StorageError::from_io(path, e))?;
    let reader = BufReader::new(GzDecoder::new(file));
    let fields: ProbabilityFields =
        serde_json::from_reader(reader).map_err(|e| StorageError::corrupt(path, e))?;
    debug!(path = %path.display(), entries = fields.len(), "Loaded probability cache");
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle() -> Cycle {
        Cycle::parse("20240501", "00").unwrap()
    }

    fn single(key: &str, value: f32) -> ProbabilityFields {
        let mut fields = ProbabilityFields::new();
        fields.insert(key.to_string(), Field2D::filled(3, 2, value));
        fields
    }

    #[test]
    fn test_hourly_roundtrip_keeps_nan() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbabilityCache::new(dir.path());
        let mut fields = single("2024050116", 12.5);
        fields.get_mut("2024050116").unwrap().set(0, 1, f32::NAN);

        assert!(!cache.has_hour(&cycle(), 16));
        cache.save_hour(&cycle(), 16, &fields).unwrap();
        assert!(cache.has_hour(&cycle(), 16));
        assert!(cache
            .hourly_path(&cycle(), 16)
            .ends_with("nprob_2024050100f016.json.gz"));

        let loaded = cache.load_hour(&cycle(), 16).unwrap();
        let field = &loaded["2024050116"];
        assert!(field.get(0, 1).unwrap().is_nan());
        assert_eq!(field.get(1, 2), Some(12.5));
    }

    #[test]
    fn test_missing_hour_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbabilityCache::new(dir.path());
        assert!(matches!(
            cache.load_hour(&cycle(), 5),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbabilityCache::new(dir.path());
        std::fs::write(cache.hourly_path(&cycle(), 4), b"not gzip").unwrap();
        assert!(matches!(
            cache.load_hour(&cycle(), 4),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_mixed_shapes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProbabilityCache::new(dir.path());
        let mut fields = single("2024050116", 1.0);
        fields.insert("2024050117".to_string(), Field2D::zeros(2, 2));
        assert!(cache.save_hour(&cycle(), 16, &fields).is_err());
        assert!(!cache.has_hour(&cycle(), 16));
    }
}
