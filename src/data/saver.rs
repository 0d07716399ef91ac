//! CSV persistence for sweep tables.

use crate::error::Result;
use crate::sweep::SweepTable;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Builds `<base>_<timestamp>.<ext>` with a local second-resolution stamp,
/// so repeated runs of the same measurement never clobber each other.
pub fn timestamped_name(base: &str, ext: &str) -> String {
    format!(
        "{base}_{}.{ext}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Writes `table` as a headed CSV file under `dir` and returns the path.
///
/// The directory is created if missing. Values are written in shortest
/// round-trip form, so loading the file back yields the original numbers.
pub fn save_table(table: &SweepTable, dir: &Path, base: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(timestamped_name(base, "csv"));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    writer.flush()?;

    info!("saved {} rows to '{}'", table.len(), path.display());
    Ok(path)
}
