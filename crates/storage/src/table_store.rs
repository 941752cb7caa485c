//! Calibration tables read from the fix directory, kept in an LRU cache.
//!
//! A full-period severe job reads one hourly table per window and hazard,
//! and many windows share a table, so repeated reads are served from
//! memory.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calib_common::{day_table_name, hourly_table_name, thunder_table_path, Hazard};
use calibration::{CalibrationTable, CorrectionTable};
use lru::LruCache;
use tracing::debug;

use crate::error::Result;

/// Default number of tables kept in memory.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl TableStoreStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Reads reliability and correction tables under a fix directory.
pub struct TableStore {
    root: PathBuf,
    /// Apply the hazard ceilings to reliability tables.
    capped: bool,
    tables: LruCache<PathBuf, Arc<CalibrationTable>>,
    corrections: LruCache<PathBuf, Arc<CorrectionTable>>,
    stats: TableStoreStats,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>, capped: bool) -> Self {
        Self::with_capacity(root, capped, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, capped: bool, capacity: usize) -> Self {
        let size = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            capped,
            tables: LruCache::new(size),
            corrections: LruCache::new(size),
            stats: TableStoreStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Table for the 4-hour window ending at SREF hour `sref_hour`.
    pub fn hourly(&mut self, hazard: Hazard, cycle_hour: u32, sref_hour: u32) -> Result<Arc<CalibrationTable>> {
        let path = self.root.join(hourly_table_name(hazard, cycle_hour, sref_hour));
        self.reliability(hazard, path)
    }

    /// Convective-day table.
    pub fn day(&mut self, hazard: Hazard, cycle_hour: u32) -> Result<Arc<CalibrationTable>> {
        let path = self.root.join(day_table_name(hazard, cycle_hour));
        self.reliability(hazard, path)
    }

    /// Thunder correction for table kind `kind` (`grid1hr`, `grid` or
    /// `fullperiod`) at a valid hour of day.
    pub fn correction(&mut self, kind: &str, cycle_hour: u32, valid_hour: u32) -> Result<Arc<CorrectionTable>> {
        let path = self.root.join(thunder_table_path(kind, cycle_hour, valid_hour));
        if let Some(table) = self.corrections.get(&path) {
            self.stats.hits += 1;
            return Ok(table.clone());
        }
        self.stats.misses += 1;
        let table = Arc::new(CorrectionTable::load(&path)?);
        if self.corrections.push(path, table.clone()).is_some() {
            self.stats.evictions += 1;
        }
        Ok(table)
    }

    /// Tables are cached with the hazard cap already applied; a store is
    /// either capped or not for its whole life.
    fn reliability(&mut self, hazard: Hazard, path: PathBuf) -> Result<Arc<CalibrationTable>> {
        if let Some(table) = self.tables.get(&path) {
            self.stats.hits += 1;
            return Ok(table.clone());
        }
        self.stats.misses += 1;
        let cap = if self.capped { hazard.cap_fraction() } else { None };
        let table = Arc::new(CalibrationTable::load(&path)?.with_cap(cap));
        debug!(hazard = %hazard, path = %path.display(), capped = cap.is_some(), "Cached calibration table");
        if self.tables.push(path, table.clone()).is_some() {
            self.stats.evictions += 1;
        }
        Ok(table)
    }

    pub fn stats(&self) -> &TableStoreStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
