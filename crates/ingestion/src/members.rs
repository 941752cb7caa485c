//! Ensemble member descriptors and their file layouts.
//!
//! Each model contributes a current run and a time-lagged run. A lagged
//! member reads the hours of the older run that verify at the same times,
//! so cycle forecast hour `h` maps to member forecast hour `h + lag`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use calib_common::Cycle;
use serde::{Deserialize, Serialize};

/// Lag of the older HiResW and NAM runs, hours.
pub const LAG_HOURS: u32 = 12;

/// Lag of the older HRRR run, hours.
pub const HRRR_LAG_HOURS: u32 = 6;

/// Lagged twins of these members stop at this forecast hour for thunder.
pub const THUNDER_LAST_HOUR: u32 = 48;

/// Which core fills the third HiResW slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HireswCore {
    #[default]
    Fv3,
    Nmmb,
}

impl HireswCore {
    pub fn name(&self) -> &'static str {
        match self {
            HireswCore::Fv3 => "fv3",
            HireswCore::Nmmb => "nmmb",
        }
    }

    /// Updraft helicity exceedance threshold, m2/s2.
    pub fn uh_threshold(&self) -> f32 {
        match self {
            HireswCore::Fv3 => 200.0,
            HireswCore::Nmmb => 100.0,
        }
    }
}

impl fmt::Display for HireswCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HireswCore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fv3" => Ok(HireswCore::Fv3),
            "nmmb" => Ok(HireswCore::Nmmb),
            other => Err(format!("unknown HiResW core '{}' (expected fv3 or nmmb)", other)),
        }
    }
}

/// Model family, which fixes the file name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelKind {
    /// `hiresw.tRRz.{core}_3km.fFF.{domain}.grib2`
    Hiresw { core: String, domain: String },
    /// `hrrr.tRRz.wrfsfcfFF.grib2`
    Hrrr,
    /// `nam.tRRz.conusnest.camfldFF.tm00.grib2`. `post_processed` selects
    /// the SPC post-processed copy, which carries hourly precipitation.
    NamNest { post_processed: bool },
}

impl ModelKind {
    fn hiresw(core: &str, domain: &str) -> Self {
        ModelKind::Hiresw {
            core: core.to_string(),
            domain: domain.to_string(),
        }
    }

    pub fn file_name(&self, run_hour: u32, fhour: u32) -> String {
        match self {
            ModelKind::Hiresw { core, domain } => format!(
                "hiresw.t{:02}z.{}_3km.f{:02}.{}.grib2",
                run_hour, core, fhour, domain
            ),
            ModelKind::Hrrr => format!("hrrr.t{:02}z.wrfsfcf{:02}.grib2", run_hour, fhour),
            ModelKind::NamNest { .. } => format!(
                "nam.t{:02}z.conusnest.camfld{:02}.tm00.grib2",
                run_hour, fhour
            ),
        }
    }

    /// Native grid spacing, km.
    pub fn dx_km(&self) -> f64 {
        match self {
            ModelKind::Hiresw { .. } => 3.2,
            ModelKind::Hrrr | ModelKind::NamNest { .. } => 3.0,
        }
    }
}

/// Root directories of the model archives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRoots {
    pub hiresw: PathBuf,
    pub hrrr: PathBuf,
    pub nam: PathBuf,
    /// Parent of the SPC post-processed NAM output.
    pub nam_post: PathBuf,
}

impl ModelRoots {
    /// Directory holding the files of one run.
    pub fn run_dir(&self, kind: &ModelKind, run: &Cycle) -> PathBuf {
        let day = run.date_str();
        match kind {
            ModelKind::Hiresw { .. } => self.hiresw.join(format!("hiresw.{}", day)),
            ModelKind::Hrrr => self.hrrr.join(format!("hrrr.{}", day)).join("conus"),
            ModelKind::NamNest {
                post_processed: false,
            } => self.nam.join(format!("nam.{}", day)),
            ModelKind::NamNest {
                post_processed: true,
            } => self
                .nam_post
                .join(format!("spc_post.{}", day))
                .join("spc_nam"),
        }
    }
}

/// One (model, lag) member for one cycle. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: ModelKind,
    pub dir: PathBuf,
    /// Run the files come from.
    pub run: Cycle,
    /// Hours this run is older than the current one.
    pub lag_hours: u32,
    pub dx_km: f64,
    /// Updraft helicity exceedance threshold, m2/s2.
    pub threshold: f32,
    /// Last member forecast hour read, if the run is cut short.
    pub last_hour: Option<u32>,
}

impl MemberDescriptor {
    fn build(
        name: &str,
        kind: ModelKind,
        roots: &ModelRoots,
        current: &Cycle,
        lag_hours: u32,
        threshold: f32,
    ) -> Self {
        let run = current.shifted(-(lag_hours as i64));
        let name = if lag_hours > 0 {
            format!("{}_tl", name)
        } else {
            name.to_string()
        };
        let dir = roots.run_dir(&kind, &run);
        Self {
            name,
            dx_km: kind.dx_km(),
            kind,
            dir,
            run,
            lag_hours,
            threshold,
            last_hour: None,
        }
    }

    fn with_last_hour(mut self, hour: u32) -> Self {
        self.last_hour = Some(hour);
        self
    }

    pub fn is_lagged(&self) -> bool {
        self.lag_hours > 0
    }

    /// Member forecast hour verifying at cycle forecast hour `fhour`.
    pub fn member_hour(&self, fhour: u32) -> u32 {
        fhour + self.lag_hours
    }

    /// Whether this member has a file for cycle forecast hour `fhour`.
    pub fn covers(&self, fhour: u32) -> bool {
        self.last_hour.map_or(true, |last| self.member_hour(fhour) <= last)
    }

    /// File for cycle forecast hour `fhour`.
    pub fn path(&self, fhour: u32) -> PathBuf {
        self.dir
            .join(self.kind.file_name(self.run.hour, self.member_hour(fhour)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl fmt::Display for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}{:02}z)", self.name, self.run.date_str(), self.run.hour)
    }
}

/// The ten severe members for HREF run `href_run`, current run first in
/// each pair.
pub fn severe_members(href_run: &Cycle, roots: &ModelRoots, core: HireswCore) -> Vec<MemberDescriptor> {
    let mut members = Vec::with_capacity(10);
    let pairs = [
        ("arw_conusmem2", ModelKind::hiresw("arw", "conusmem2.subset"), 75.0, LAG_HOURS),
        ("arw_conus", ModelKind::hiresw("arw", "conus.subset"), 75.0, LAG_HOURS),
        (
            core.name(),
            ModelKind::hiresw(core.name(), "conus.subset"),
            core.uh_threshold(),
            LAG_HOURS,
        ),
        ("hrrr", ModelKind::Hrrr, 75.0, HRRR_LAG_HOURS),
        (
            "nam_conusnest",
            ModelKind::NamNest {
                post_processed: false,
            },
            100.0,
            LAG_HOURS,
        ),
    ];
    for (name, kind, threshold, lag) in pairs {
        members.push(MemberDescriptor::build(name, kind.clone(), roots, href_run, 0, threshold));
        members.push(MemberDescriptor::build(name, kind, roots, href_run, lag, threshold));
    }
    members
}

/// The ten thunder members for `cycle`.
///
/// `conusnssl`, `conusarw` and `hrrr_ncep` stop at forecast hour 48.
pub fn thunder_members(cycle: &Cycle, roots: &ModelRoots, core: HireswCore) -> Vec<MemberDescriptor> {
    let mut members = Vec::with_capacity(10);
    let pairs = [
        ("conusnssl", ModelKind::hiresw("arw", "conusmem2.subset"), 75.0, LAG_HOURS, true),
        ("conusarw", ModelKind::hiresw("arw", "conus.subset"), 75.0, LAG_HOURS, true),
        (
            "conushrw",
            ModelKind::hiresw(core.name(), "conus.subset"),
            core.uh_threshold(),
            LAG_HOURS,
            false,
        ),
        (
            "conusnest",
            ModelKind::NamNest {
                post_processed: true,
            },
            100.0,
            LAG_HOURS,
            false,
        ),
        ("hrrr_ncep", ModelKind::Hrrr, 75.0, HRRR_LAG_HOURS, true),
    ];
    for (name, kind, threshold, lag, capped) in pairs {
        for lag_hours in [0, lag] {
            let member = MemberDescriptor::build(name, kind.clone(), roots, cycle, lag_hours, threshold);
            members.push(if capped {
                member.with_last_hour(THUNDER_LAST_HOUR)
            } else {
                member
            });
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> ModelRoots {
        ModelRoots {
            hiresw: PathBuf::from("/com/hiresw"),
            hrrr: PathBuf::from("/com/hrrr"),
            nam: PathBuf::from("/com/nam"),
            nam_post: PathBuf::from("/com/spc_post"),
        }
    }

    fn cycle(compact: &str) -> Cycle {
        Cycle::parse_compact(compact).unwrap()
    }

    #[test]
    fn test_severe_paths() {
        let members = severe_members(&cycle("2024050100"), &roots(), HireswCore::Fv3);
        assert_eq!(members.len(), 10);

        assert_eq!(
            members[0].path(13),
            PathBuf::from("/com/hiresw/hiresw.20240501/hiresw.t00z.arw_3km.f13.conusmem2.subset.grib2")
        );
        // Lagged HiResW: previous day's 12Z, hour + 12.
        assert_eq!(
            members[1].path(13),
            PathBuf::from("/com/hiresw/hiresw.20240430/hiresw.t12z.arw_3km.f25.conusmem2.subset.grib2")
        );
        assert_eq!(
            members[4].path(2),
            PathBuf::from("/com/hiresw/hiresw.20240501/hiresw.t00z.fv3_3km.f02.conus.subset.grib2")
        );
        assert_eq!(members[4].threshold, 200.0);
        // Lagged HRRR: 18Z, hour + 6.
        assert_eq!(
            members[7].path(13),
            PathBuf::from("/com/hrrr/hrrr.20240430/conus/hrrr.t18z.wrfsfcf19.grib2")
        );
        assert_eq!(members[7].dx_km, 3.0);
        assert_eq!(
            members[8].path(5),
            PathBuf::from("/com/nam/nam.20240501/nam.t00z.conusnest.camfld05.tm00.grib2")
        );
        assert!(members[9].is_lagged());
        assert_eq!(members[9].name, "nam_conusnest_tl");
    }

    #[test]
    fn test_nmmb_threshold() {
        let members = severe_members(&cycle("2024050112"), &roots(), HireswCore::Nmmb);
        assert_eq!(members[5].threshold, 100.0);
        assert!(members[5].path(1).to_string_lossy().contains("nmmb_3km.f13"));
    }

    #[test]
    fn test_thunder_members() {
        let members = thunder_members(&cycle("2024050112"), &roots(), HireswCore::Fv3);
        assert_eq!(members.len(), 10);
        assert_eq!(
            members[6].path(4),
            PathBuf::from("/com/spc_post/spc_post.20240501/spc_nam/nam.t12z.conusnest.camfld04.tm00.grib2")
        );
        // conusnssl lagged stops at member hour 48.
        assert!(members[1].covers(36));
        assert!(!members[1].covers(37));
        // conushrw has no limit.
        assert!(members[5].covers(48));
        assert_eq!(members[9].lag_hours, HRRR_LAG_HOURS);
        assert!(members[9].covers(42));
        assert!(!members[9].covers(43));
    }

    #[test]
    fn test_core_parse() {
        assert_eq!("fv3".parse::<HireswCore>().unwrap(), HireswCore::Fv3);
        assert_eq!(" nmmb\n".parse::<HireswCore>().unwrap(), HireswCore::Nmmb);
        assert!("arw".parse::<HireswCore>().is_err());
    }
}
