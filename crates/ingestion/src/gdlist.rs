//! SREF extraction through GEMPAK `gdlist`.
//!
//! The SREF arrives as GEMPAK grid files. A csh script asks `gdlist` for
//! one text listing per (forecast hour, variable); the listings are then
//! parsed into fields on the SREF grid.
//!
//! ```text
//! spcsref_{run}fFFF ──gdlist.csh──> sref_{run}_{var}_FFF.txt ──parse──> Field2D
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use calib_common::{Cycle, Field2D};
use calibration::SrefPredictors;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::sync::{Readiness, Synchronizer};

/// Value `gdlist` prints for a missing grid point.
pub const MISSING_VALUE: f64 = -9999.0;

const SCRIPT_NAME: &str = "gdlist.csh";

/// One `gdlist` extraction for an SREF run.
#[derive(Debug, Clone)]
pub struct SrefRequest {
    sref_dir: PathBuf,
    run: Cycle,
    hours: Vec<u32>,
    variables: Vec<String>,
    work_dir: PathBuf,
}

impl SrefRequest {
    /// `sref_root` holds `spcsref.YYYYMMDD/gempak`; listings go to
    /// `work_dir`.
    pub fn new<S: Into<String>>(
        sref_root: &Path,
        run: Cycle,
        hours: Vec<u32>,
        variables: impl IntoIterator<Item = S>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sref_dir: sref_root
                .join(format!("spcsref.{}", run.date_str()))
                .join("gempak"),
            run,
            hours,
            variables: variables.into_iter().map(Into::into).collect(),
            work_dir: work_dir.into(),
        }
    }

    fn run_label(&self) -> String {
        format!("{}{}", self.run.date_str(), self.run.hour_str())
    }

    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    pub fn source_file(&self, fhour: u32) -> PathBuf {
        self.sref_dir
            .join(format!("spcsref_{}f{:03}", self.run_label(), fhour))
    }

    pub fn output_file(&self, variable: &str, fhour: u32) -> PathBuf {
        self.work_dir
            .join(format!("sref_{}_{}_{:03}.txt", self.run_label(), variable, fhour))
    }

    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join(SCRIPT_NAME)
    }

    pub fn missing_sources(&self) -> Vec<PathBuf> {
        self.hours
            .iter()
            .map(|&h| self.source_file(h))
            .filter(|p| !p.is_file())
            .collect()
    }

    pub fn missing_outputs(&self) -> Vec<PathBuf> {
        self.hours
            .iter()
            .flat_map(|&h| self.variables.iter().map(move |v| self.output_file(v, h)))
            .filter(|p| !p.is_file())
            .collect()
    }

    /// The csh script, one `run` block per hour and variable.
    pub fn script(&self) -> String {
        let label = self.run_label();
        let mut lines: Vec<String> = vec![
            "#!/bin/csh".into(),
            String::new(),
            "$GEMEXE/gdlist <<EOF".into(),
        ];
        for &fhour in &self.hours {
            for variable in &self.variables {
                lines.push(String::new());
                lines.push(format!("    GDFILE   = {}", self.source_file(fhour).display()));
                lines.push(format!(
                    "    GDATTIM  = {}/{}00F{:03}",
                    &label[2..8],
                    &label[8..],
                    fhour
                ));
                lines.push("    GLEVEL   = 0".into());
                lines.push("    GVCORD   = none".into());
                lines.push(format!("    GFUNC    = {}", variable));
                lines.push("    GAREA    = grid".into());
                lines.push("    PROJ     =".into());
                lines.push("    SCALE    = 0".into());
                lines.push(format!(
                    "    OUTPUT   = f/{}",
                    self.output_file(variable, fhour).display()
                ));
                lines.push(String::new());
                lines.push("run".into());
            }
        }
        lines.extend(["", "exit", "", "EOF"].map(String::from));
        lines.join("\n")
    }

    /// Write the script to the work directory, executable.
    pub fn write_script(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.work_dir)?;
        let path = self.script_path();
        std::fs::write(&path, self.script())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(path)
    }

    /// Run the script with `GEMEXE` pointing at the GEMPAK binaries.
    pub async fn execute(&self, gemexe: &Path) -> Result<()> {
        let script = self.write_script()?;
        info!(script = %script.display(), blocks = self.hours.len() * self.variables.len(), "Running gdlist");
        let output = tokio::process::Command::new(&script)
            .env("GEMEXE", gemexe)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .output()
            .await?;
        if output.status.success() {
            debug!(stdout_bytes = output.stdout.len(), "gdlist finished");
        } else {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "gdlist exited with an error"
            );
        }
        Ok(())
    }

    /// Parse every listing into predictors.
    pub fn read_outputs(&self) -> Result<SrefPredictors> {
        let mut predictors = SrefPredictors::new();
        for &fhour in &self.hours {
            for variable in &self.variables {
                let path = self.output_file(variable, fhour);
                if !path.is_file() {
                    return Err(SyncError::missing(format!(
                        "gdlist output {}",
                        path.display()
                    )));
                }
                predictors.insert(fhour, variable.clone(), read_gdlist(&path)?);
            }
        }
        Ok(predictors)
    }

    /// Wait for the SREF files, extract them and parse the listings.
    /// Listings already in the work directory are not extracted again.
    ///
    /// A listing still absent once the wait budget is spent is a missing
    /// configuration, not an ensemble shortfall.
    pub async fn extract(&self, sync: &Synchronizer, gemexe: &Path) -> Result<SrefPredictors> {
        sync.wait_until("SREF files", || {
            Ok(Readiness::from_missing(&display_all(self.missing_sources())))
        })
        .await?;

        // A rerun in the same work directory reuses its listings.
        if self.missing_outputs().is_empty() {
            debug!(run = %self.run_label(), "Reusing existing gdlist listings");
        } else {
            self.execute(gemexe).await?;
        }

        sync.wait_until("gdlist output", || {
            Ok(Readiness::from_missing(&display_all(self.missing_outputs())))
        })
        .await
        .map_err(|e| match e {
            SyncError::InsufficientEnsemble { shortfall, .. } => {
                SyncError::missing(format!("gdlist output ({})", shortfall))
            }
            other => other,
        })?;

        let predictors = self.read_outputs()?;
        info!(
            run = %self.run_label(),
            hours = self.hours.len(),
            variables = self.variables.len(),
            "Extracted SREF predictors"
        );
        Ok(predictors)
    }
}

fn display_all(paths: Vec<PathBuf>) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Read a `gdlist` listing from disk.
pub fn read_gdlist(path: &Path) -> Result<Field2D> {
    let text = std::fs::read_to_string(path)?;
    parse_gdlist(&text).map_err(|reason| SyncError::malformed(path, reason))
}

/// Parse a `gdlist` listing.
///
/// The `GRID SIZE` line gives (lonsize, latsize), the optional
/// `Scale factor` line a power of ten applied to every value. Values start
/// at the `ROW{latsize}` line and run north to south; the returned field
/// is south-first. Missing points become NaN.
pub fn parse_gdlist(text: &str) -> std::result::Result<Field2D, String> {
    let mut size: Option<(usize, usize)> = None;
    let mut scale = 1.0f64;
    let mut started = false;
    let mut values: Vec<f32> = Vec::new();

    for line in text.lines() {
        let (_, latsize) = match size {
            Some(size) => size,
            None => {
                if !line.contains("GRID SIZE") {
                    continue;
                }
                let parsed = parse_grid_size(line)?;
                size = Some(parsed);
                parsed
            }
        };

        if line.contains("Scale factor") {
            scale = parse_scale(line)?;
        }

        let tokens: Vec<&str> =
            if line.contains(&format!("ROW{:3}", latsize)) || (started && line.contains("ROW")) {
                started = true;
                line.split_once("ROW")
                    .map(|(_, rest)| rest.split_whitespace().skip(1).collect())
                    .unwrap_or_default()
            } else if started {
                line.split_whitespace().collect()
            } else {
                continue;
            };

        for token in tokens {
            let raw: f64 = token
                .parse()
                .map_err(|_| format!("unexpected token '{}' in data", token))?;
            values.push(if raw == MISSING_VALUE {
                f32::NAN
            } else {
                (raw * scale) as f32
            });
        }
    }

    let (lonsize, latsize) = size.ok_or("no GRID SIZE line")?;
    if values.is_empty() {
        return Err(format!("no data rows (expected ROW{:3})", latsize));
    }
    if latsize == 0 || values.len() != lonsize * latsize {
        return Err(format!(
            "{} values for a {} x {} grid",
            values.len(),
            lonsize,
            latsize
        ));
    }
    let field = Field2D::new(lonsize, latsize, values).map_err(|e| e.to_string())?;
    Ok(field.flip_rows())
}

fn parse_grid_size(line: &str) -> std::result::Result<(usize, usize), String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let parse = |t: Option<&&str>| -> std::result::Result<usize, String> {
        t.and_then(|t| t.parse().ok())
            .ok_or_else(|| format!("bad GRID SIZE line '{}'", line.trim()))
    };
    let latsize = parse(tokens.last())?;
    let lonsize = parse(tokens.len().checked_sub(2).and_then(|i| tokens.get(i)))?;
    Ok((lonsize, latsize))
}

fn parse_scale(line: &str) -> std::result::Result<f64, String> {
    let exponent = line
        .split_whitespace()
        .last()
        .map(|t| t.trim_start_matches("10**"))
        .and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(|| format!("bad Scale factor line '{}'", line.trim()))?;
    Ok(10f64.powf(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, gdlist};

    fn request(dir: &Path) -> SrefRequest {
        SrefRequest::new(
            &dir.join("sref"),
            Cycle::parse("20240430", "21").unwrap(),
            vec![18, 21],
            ["hicapep1000", "eshrp20"],
            dir.join("work"),
        )
    }

    #[test]
    fn test_parse_small_listing() {
        let field = parse_gdlist(gdlist::SMALL).unwrap();
        assert_eq!(field.shape(), (2, 3));
        assert_eq!(field.get(0, 0), Some(4.0));
        assert!(field.get(0, 1).unwrap().is_nan());
        assert_eq!(field.get(0, 2), Some(6.0));
        assert_eq!(&field.data()[3..], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parse_wrapped_and_scaled() {
        let rows = vec![vec![10.0, 20.0, 30.0], vec![40.0, 50.0, -9999.0]];
        let text = gdlist::listing(&rows, -1, 2);
        let field = parse_gdlist(&text).unwrap();
        assert_approx_eq!(field.get(1, 0).unwrap(), 1.0, 1e-6);
        assert_approx_eq!(field.get(1, 2).unwrap(), 3.0, 1e-6);
        assert_approx_eq!(field.get(0, 1).unwrap(), 5.0, 1e-6);
        assert!(field.get(0, 2).unwrap().is_nan());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_gdlist("nothing here").unwrap_err().contains("GRID SIZE"));
        let short = " GRID SIZE:     3    2\n ROW  2   1.0 2.0 3.0\n ROW  1   4.0\n";
        assert!(parse_gdlist(short).unwrap_err().contains("4 values"));
        let junk = " GRID SIZE:     1    1\n ROW  1   abc\n";
        assert!(parse_gdlist(junk).is_err());
    }

    #[test]
    fn test_script_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        let script = req.script();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(&lines[..3], &["#!/bin/csh", "", "$GEMEXE/gdlist <<EOF"]);
        assert_eq!(script.matches("\nrun").count(), 4);
        assert!(script.ends_with("\nexit\n\nEOF"));
        assert!(script.contains("    GDATTIM  = 240430/2100F021"));
        assert!(script.contains("    GFUNC    = eshrp20"));
        assert!(script.contains(&format!(
            "    GDFILE   = {}",
            dir.path()
                .join("sref/spcsref.20240430/gempak/spcsref_2024043021f018")
                .display()
        )));
        assert!(script.contains("sref_2024043021_hicapep1000_018.txt"));
    }

    #[test]
    fn test_missing_files_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        assert_eq!(req.missing_sources().len(), 2);
        assert_eq!(req.missing_outputs().len(), 4);

        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        for h in [18, 21] {
            for v in ["hicapep1000", "eshrp20"] {
                std::fs::write(req.output_file(v, h), gdlist::SMALL).unwrap();
            }
        }
        assert!(req.missing_outputs().is_empty());
        let predictors = req.read_outputs().unwrap();
        assert_eq!(predictors.hours().collect::<Vec<_>>(), vec![18, 21]);
        assert_eq!(predictors.get(21, "eshrp20").unwrap().get(1, 2), Some(3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_reuses_listings() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        for h in [18, 21] {
            let source = req.source_file(h);
            std::fs::create_dir_all(source.parent().unwrap()).unwrap();
            std::fs::write(source, b"gempak").unwrap();
            for v in ["hicapep1000", "eshrp20"] {
                std::fs::write(req.output_file(v, h), gdlist::SMALL).unwrap();
            }
        }
        let sync = Synchronizer::new(crate::retry::RetryPolicy::new(
            std::time::Duration::from_secs(60),
            0,
        ));
        let predictors = req.extract(&sync, Path::new("/nonexistent/gempak")).await.unwrap();
        assert_eq!(predictors.get(18, "hicapep1000").unwrap().shape(), (2, 3));
        assert!(!req.script_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = request(dir.path()).write_script().unwrap();
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
