//! Patient list input.
//!
//! The input is a CSV export with at least the columns
//! `Patient First Name`, `Patient Last Name` and `Patient DOB`. Any other
//! columns are ignored.

use std::io::Read;
use std::path::Path;

use checknarc_portal_models::PatientQuery;
use serde::Deserialize;

use crate::BatchError;

#[derive(Debug, Deserialize)]
struct PatientRow {
    #[serde(rename = "Patient First Name")]
    first_name: String,
    #[serde(rename = "Patient Last Name")]
    last_name: String,
    #[serde(rename = "Patient DOB")]
    dob: String,
}

/// Reads the patient list from a CSV file.
///
/// # Errors
///
/// Returns [`BatchError::Csv`] if the file cannot be opened or a required
/// column is missing, or [`BatchError::InvalidRow`] for a row whose date
/// of birth cannot be parsed.
pub fn read_patients(path: &Path) -> Result<Vec<PatientQuery>, BatchError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let patients = collect(reader)?;
    log::info!("Read {} patient(s) from {}", patients.len(), path.display());
    Ok(patients)
}

/// Reads the patient list from any CSV source.
///
/// # Errors
///
/// See [`read_patients`].
pub fn read_patients_from<R: Read>(source: R) -> Result<Vec<PatientQuery>, BatchError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);

    collect(reader)
}

fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<PatientQuery>, BatchError> {
    let headers = reader.headers()?.clone();
    let mut record = csv::StringRecord::new();
    let mut patients = Vec::new();

    while reader.read_record(&mut record)? {
        let row: PatientRow = record.deserialize(Some(&headers))?;
        let patient = PatientQuery::new(&row.first_name, &row.last_name, &row.dob)
            .map_err(|source| BatchError::InvalidRow {
                line: record.position().map_or(0, csv::Position::line),
                source,
            })?;
        patients.push(patient);
    }

    Ok(patients)
}
