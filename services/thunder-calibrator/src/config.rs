//! Thunder calibrator configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ingestion::{HireswCore, ModelRoots, RetryPolicy};
use serde::{Deserialize, Serialize};

const FIX_SUBDIR: &str = "href_calib_thunder";

/// 40 km grid the products are written on.
const REFERENCE_GRID: &str = "grid.grib2";

/// Top-level thunder calibrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThunderConfig {
    /// HiResW, HRRR and post-processed NAM roots
    pub models: ModelRoots,

    /// Core in the `conushrw` slot
    pub hiresw_core: HireswCore,

    /// Fix directory (contains `href_calib_thunder/`)
    pub fix_dir: PathBuf,

    /// Products are written to `{output_dir}/thunder`
    pub output_dir: PathBuf,

    /// Grid maps built on first use
    pub map_dir: PathBuf,

    /// Wait budget for the hourly jobs
    pub wait: RetryPolicy,

    /// Full-period jobs need at least this many members
    pub min_members: usize,
}

impl Default for ThunderConfig {
    fn default() -> Self {
        Self {
            models: ModelRoots::default(),
            hiresw_core: HireswCore::default(),
            fix_dir: PathBuf::from("fix"),
            output_dir: PathBuf::from("com"),
            map_dir: PathBuf::from("data/gridmaps"),
            wait: RetryPolicy::thunder(),
            min_members: 5,
        }
    }
}

impl ThunderConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override settings from the operational environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override settings from `lookup`, keyed by environment variable name.
    ///
    /// The post-processed NAM lives beside this job's own output, so its
    /// root is the parent of `COMOUT`.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |name: &str| lookup(name).map(PathBuf::from);
        if let Some(p) = path("COMINhiresw") {
            self.models.hiresw = p;
        }
        if let Some(p) = path("COMINhrrr") {
            self.models.hrrr = p;
        }
        if let Some(p) = path("COMOUT") {
            self.models.nam_post = p.parent().map(Path::to_path_buf).unwrap_or(p);
        }
        if let Some(p) = path("FIXspc_post") {
            self.fix_dir = p;
        }
        if let Some(p) = path("COMOUTspc_post") {
            self.output_dir = p;
        }
        if let Some(p) = path("DATA") {
            self.map_dir = p.join("gridmaps");
        }
        if let Some(core) = lookup("COMINhrw_string") {
            self.hiresw_core = core
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid COMINhrw_string")?;
        }
        Ok(())
    }

    pub fn table_dir(&self) -> PathBuf {
        self.fix_dir.join(FIX_SUBDIR)
    }

    pub fn reference_grid(&self) -> PathBuf {
        self.table_dir().join(REFERENCE_GRID)
    }

    pub fn product_dir(&self) -> PathBuf {
        self.output_dir.join("thunder")
    }
}
