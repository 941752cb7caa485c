//! Severe calibrator configuration.
//!
//! Settings come from an optional YAML file, then the operational
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ingestion::{HireswCore, ModelRoots, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Subdirectory of the fix directory with the severe tables.
const FIX_SUBDIR: &str = "href_calib_severe";

/// SREF grid definition the products are written on.
const REFERENCE_GRID: &str = "srefGrid.grib2";

/// Top-level severe calibrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SevereConfig {
    /// HiResW, HRRR and NAM archive roots
    pub models: ModelRoots,

    /// Core in the third HiResW slot
    pub hiresw_core: HireswCore,

    /// SREF GEMPAK archive root
    pub sref_dir: PathBuf,

    /// Fix directory (contains `href_calib_severe/`)
    pub fix_dir: PathBuf,

    /// Products are written to `{output_dir}/severe`
    pub output_dir: PathBuf,

    /// Neighborhood probability caches and grid maps
    pub cache_dir: PathBuf,

    /// Scratch space for `gdlist` scripts and listings
    pub work_dir: PathBuf,

    /// GEMPAK executables
    pub gempak_dir: PathBuf,

    /// Cap calibrated probabilities at the hazard ceilings
    pub capped: bool,

    /// Wait budget for HREF member files
    pub href_wait: RetryPolicy,

    /// Wait budget for SREF files and listings
    pub sref_wait: RetryPolicy,
}

impl Default for SevereConfig {
    fn default() -> Self {
        Self {
            models: ModelRoots::default(),
            hiresw_core: HireswCore::default(),
            sref_dir: PathBuf::from("spcsref"),
            fix_dir: PathBuf::from("fix"),
            output_dir: PathBuf::from("com"),
            cache_dir: PathBuf::from("pickle"),
            work_dir: PathBuf::from("data"),
            gempak_dir: PathBuf::from("/usr/gempak/bin"),
            capped: false,
            href_wait: RetryPolicy::severe(),
            sref_wait: RetryPolicy::sref(),
        }
    }
}

impl SevereConfig {
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
        if let Some(p) = path("COMINnam") {
            self.models.nam = p;
        }
        if let Some(p) = path("COMINspcsref") {
            self.sref_dir = p;
        }
        if let Some(p) = path("FIXspc_post") {
            self.fix_dir = p;
        }
        if let Some(p) = path("COMOUT") {
            self.output_dir = p;
        }
        if let Some(p) = path("COMOUTspc_pickle") {
            self.cache_dir = p;
        }
        if let Some(p) = path("DATA") {
            self.work_dir = p;
        }
        if let Some(p) = path("GEMEXE") {
            self.gempak_dir = p;
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
        self.output_dir.join("severe")
    }

    pub fn map_dir(&self) -> PathBuf {
        self.cache_dir.join("gridmaps")
    }

    /// Scratch directory of one job, e.g. `{work_dir}/href_calib_severe/f015`.
    pub fn job_dir(&self, job: &str) -> PathBuf {
        self.work_dir.join(FIX_SUBDIR).join(job)
    }
}
