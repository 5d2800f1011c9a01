//! Result export.

use std::path::{Path, PathBuf};

use checknarc_portal_models::LookupResult;

use crate::BatchError;

/// Name of the results file written into the output directory.
pub const RESULTS_FILE_NAME: &str = "patients.csv";

/// Header row of the results file.
pub const RESULT_COLUMNS: [&str; 4] = ["First Name", "Last Name", "DOB", "Response"];

/// Writes one row per result, in order, to `patients.csv` under `dir`.
///
/// The header row is written even when `results` is empty.
///
/// # Errors
///
/// Returns [`BatchError::Io`] if `dir` cannot be created, or
/// [`BatchError::Csv`] if the file cannot be written.
pub fn write_results(dir: &Path, results: &[LookupResult]) -> Result<PathBuf, BatchError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(RESULTS_FILE_NAME);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;
    writer.write_record(RESULT_COLUMNS)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;

    log::info!("Wrote {} result(s) to {}", results.len(), path.display());
    Ok(path)
}
