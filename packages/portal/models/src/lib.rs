#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data types shared by the portal client and the batch runner.
//!
//! A run starts from a list of [`PatientQuery`] values, may act on behalf
//! of a [`Delegate`], queues a [`PendingDocument`] for every generated
//! report, and produces one [`LookupResult`] per patient.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Date format the portal expects for birthdates and search windows.
pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

/// Number of days covered by every prescription search, ending today.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 100;

/// Input formats accepted for a date of birth, tried in order.
const DOB_INPUT_FORMATS: &[&str] = &[PORTAL_DATE_FORMAT, "%Y-%m-%d"];

/// Errors produced while building model values from caller input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    /// The date of birth could not be parsed.
    #[error("Invalid date of birth '{0}' (expected M/D/YYYY)")]
    InvalidDob(String),
}

/// Normalizes a date of birth to zero-padded `MM/DD/YYYY`.
///
/// Accepts `M/D/YYYY` (padded or not) and ISO `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns [`ModelError::InvalidDob`] if the string is not a valid
/// calendar date in one of the accepted formats.
pub fn normalize_dob(raw: &str) -> Result<String, ModelError> {
    let trimmed = raw.trim();

    DOB_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .map(|date| date.format(PORTAL_DATE_FORMAT).to_string())
        .ok_or_else(|| ModelError::InvalidDob(raw.to_owned()))
}

/// A single patient to look up on the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientQuery {
    /// Patient first name, as submitted to the search form.
    pub first_name: String,
    /// Patient last name, as submitted to the search form.
    pub last_name: String,
    /// Date of birth, always `MM/DD/YYYY`.
    pub dob: String,
}

impl PatientQuery {
    /// Builds a query, trimming names and normalizing the date of birth.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidDob`] if `dob` cannot be normalized.
    pub fn new(first_name: &str, last_name: &str, dob: &str) -> Result<Self, ModelError> {
        Ok(Self {
            first_name: first_name.trim().to_owned(),
            last_name: last_name.trim().to_owned(),
            dob: normalize_dob(dob)?,
        })
    }

    /// File stem used for this patient's report (`{first}{last}`).
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("{}{}", self.first_name, self.last_name)
    }
}

/// A portal user the authenticated account may search on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    /// Visible name from the supervisor drop-down.
    pub name: String,
    /// Option value submitted with each search.
    pub id: String,
}

/// A generated report waiting to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDocument {
    /// Absolute URL of the PDF download.
    pub download_url: String,
    /// Server-side background document id (used to cancel it).
    pub document_id: String,
    /// Search request the document was generated from.
    pub request_id: String,
    /// Output file stem, without the `.pdf` extension.
    pub file_name: String,
}

/// Reason the portal rejected a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum AuthFailure {
    /// Username or password is wrong.
    #[strum(serialize = "Incorrect Login")]
    IncorrectLogin,
    /// The account password must be changed on the portal first.
    #[strum(serialize = "Password has expired")]
    PasswordExpired,
}

/// How a single patient search was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The patient exists but has no prescriptions in the window.
    NoResults,
    /// No patient matched the submitted details.
    NotFound,
    /// A PDF report was generated and queued under this file stem.
    Report {
        /// Output file stem, without the `.pdf` extension.
        file_name: String,
    },
    /// The response matched no known marker; holds the raw body.
    Unrecognized(String),
    /// The lookup could not be completed; holds a diagnostic message.
    Failed(String),
}

impl LookupOutcome {
    /// The text written to the `Response` column.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::NoResults => "Valid Patient, No Results".to_owned(),
            Self::NotFound => "No Patient Found".to_owned(),
            Self::Report { file_name } => format!("See {file_name}.pdf"),
            Self::Unrecognized(body) => body.clone(),
            Self::Failed(message) => message.clone(),
        }
    }
}

/// One row of the exported result file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    /// Patient first name.
    #[serde(rename = "First Name")]
    pub first_name: String,
    /// Patient last name.
    #[serde(rename = "Last Name")]
    pub last_name: String,
    /// Normalized date of birth.
    #[serde(rename = "DOB")]
    pub dob: String,
    /// Classification label or diagnostic text.
    #[serde(rename = "Response")]
    pub response: String,
}

impl LookupResult {
    /// Builds the result row for `query` from its classified outcome.
    #[must_use]
    pub fn new(query: &PatientQuery, outcome: &LookupOutcome) -> Self {
        Self {
            first_name: query.first_name.clone(),
            last_name: query.last_name.clone(),
            dob: query.dob.clone(),
            response: outcome.label(),
        }
    }
}

/// Inclusive fill-date range submitted with every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    /// First fill date included.
    pub begin: NaiveDate,
    /// Last fill date included.
    pub end: NaiveDate,
}

impl SearchWindow {
    /// A window of `days` days ending on `today`.
    #[must_use]
    pub fn ending(today: NaiveDate, days: i64) -> Self {
        Self {
            begin: today - Duration::days(days),
            end: today,
        }
    }

    /// Window start formatted for the portal.
    #[must_use]
    pub fn begin_param(&self) -> String {
        self.begin.format(PORTAL_DATE_FORMAT).to_string()
    }

    /// Window end formatted for the portal.
    #[must_use]
    pub fn end_param(&self) -> String {
        self.end.format(PORTAL_DATE_FORMAT).to_string()
    }
}
