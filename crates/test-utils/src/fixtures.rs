//! Common test fixtures for the calibration workspace.
//!
//! `gdlist` listings, calibration-table files and delayed member files
//! representing the scenarios the pipelines see operationally.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;

/// `gdlist` text listings.
pub mod gdlist {
    /// A 3x2 listing. North row first; the middle of the south row is missing.
    ///
    /// Parsed south-first, this is `[[4, NaN, 6], [1, 2, 3]]`.
    pub const SMALL: &str = "\
 GRID FILE: /com/spcsref/spcsref_2024043021f012

 GRID NAVIGATION:
     PROJECTION:          LCC
 GRID SIZE:     3    2

 GDATTIM: 240430/2100F012
 GFUNC:   sigtp1
 Scale factor: 10**  0

 COLUMN:     1         2         3
 ROW  2      1.00      2.00      3.00
 ROW  1      4.00  -9999.00      6.00
";

    /// Render a listing the way `gdlist` prints it. `rows` is north-first;
    /// at most `per_line` values go on a line and the rest wrap.
    pub fn listing(rows: &[Vec<f32>], exponent: i32, per_line: usize) -> String {
        let latsize = rows.len();
        let lonsize = rows.first().map_or(0, Vec::len);
        let mut out = String::new();
        out.push_str(" GRID FILE: /com/spcsref/spcsref_test\n\n");
        out.push_str(&format!(" GRID SIZE: {:5} {:4}\n\n", lonsize, latsize));
        out.push_str(&format!(" Scale factor: 10** {:2}\n\n", exponent));
        out.push_str(" COLUMN:     1\n");
        for (i, row) in rows.iter().enumerate() {
            let number = latsize - i;
            for (chunk_index, chunk) in row.chunks(per_line.max(1)).enumerate() {
                if chunk_index == 0 {
                    out.push_str(&format!(" ROW{:3}", number));
                } else {
                    out.push_str("       ");
                }
                for value in chunk {
                    out.push_str(&format!(" {:9.2}", value));
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Write a calibration table as `{"calib_table": [[...]]}`.
pub fn write_calibration_table(dir: &Path, name: &str, table: &[Vec<f64>]) -> PathBuf {
    let path = dir.join(name);
    let body = json!({ "calib_table": table });
    fs::write(&path, body.to_string()).expect("Failed to write calibration table");
    path
}

/// An 11 x 11 table whose entry `[i][j]` is `(i + j) / 20`.
pub fn ramp_table() -> Vec<Vec<f64>> {
    (0..11)
        .map(|i| (0..11).map(|j| (i + j) as f64 / 20.0).collect())
        .collect()
}

/// Every entry equal to `value`.
pub fn uniform_table(value: f64) -> Vec<Vec<f64>> {
    vec![vec![value; 11]; 11]
}

/// Write a thunder correction table as `{"corrections": [[[...]]]}`
/// (`[row][col][bin]`, percent), creating parent directories.
pub fn write_correction_table(
    dir: &Path,
    relative: &str,
    rows: usize,
    cols: usize,
    value: impl Fn(usize, usize, usize) -> f64,
) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create table directory");
    }
    let corrections: Vec<Vec<Vec<f64>>> = (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| (0..10).map(|b| value(r, c, b)).collect())
                .collect()
        })
        .collect();
    let body = json!({ "corrections": corrections });
    fs::write(&path, body.to_string()).expect("Failed to write correction table");
    path
}

/// Write `contents` to `path` after `delay`, simulating a member file that
/// lands while a synchronizer is waiting. Must be called inside a runtime.
pub fn arrive_later(
    path: PathBuf,
    delay: Duration,
    contents: Vec<u8>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create member directory");
        }
        fs::write(&path, contents).expect("Failed to write delayed file");
    })
}
