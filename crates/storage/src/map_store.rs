//! Persisted grid maps.
//!
//! Building a nearest-neighbour map over a 3 km grid is the most expensive
//! step of a cold start, so maps are computed once per grid pair and stored
//! as JSON.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::error::{Result, StorageError};

/// Directory of serialized maps.
#[derive(Debug, Clone)]
pub struct GridMapStore {
    dir: PathBuf,
}

impl GridMapStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        let bytes = fs::read(&path).map_err(|e| StorageError::from_io(&path, e))?;
        let map = serde_json::from_slice(&bytes).map_err(|e| StorageError::corrupt(&path, e))?;
        debug!(path = %path.display(), "Loaded grid map");
        Ok(map)
    }

    pub fn save<T: Serialize>(&self, name: &str, map: &T) -> Result<()> {
        let path = self.path(name);
        let bytes = serde_json::to_vec(map).map_err(|e| StorageError::corrupt(&path, e))?;
        write_atomic(&path, &bytes)
    }

    /// Load `name`, or build and save it when absent or unreadable.
    pub fn load_or_build<T, E, F>(&self, name: &str, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        match self.load(name) {
            Ok(map) => return Ok(map),
            Err(StorageError::NotFound { .. }) => {}
            Err(StorageError::Corrupt { path, reason }) => {
                info!(path = %path.display(), reason = %reason, "Rebuilding unreadable grid map");
            }
            Err(e) => return Err(e),
        }
        let map = build().map_err(|e| StorageError::Build {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.save(name, &map)?;
        info!(name, "Built grid map");
        Ok(map)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
