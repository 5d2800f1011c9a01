#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch runner for patient lookups.
//!
//! Reads a patient list from CSV, drives one [`checknarc_portal::Scraper`]
//! session through it, downloads the generated reports and writes
//! `patients.csv`. Progress is reported as [`RunEvent`]s over a tokio
//! channel so any front end can render it, and a
//! [`tokio_util::sync::CancellationToken`] stops the run between patients.

pub mod events;
pub mod input;
pub mod output;
pub mod runner;

use checknarc_portal::PortalError;
use checknarc_portal_models::ModelError;

pub use events::{RunEvent, RunStatus};
pub use runner::{Credentials, RunReport, run};

/// Errors that can occur during a batch run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The portal session failed.
    #[error(transparent)]
    Portal(#[from] PortalError),

    /// Reading or writing a CSV file failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input row could not be turned into a patient query.
    #[error("Invalid patient on line {line}: {source}")]
    InvalidRow {
        /// 1-based line in the input file, counting the header.
        line: u64,
        /// What was wrong with the row.
        source: ModelError,
    },

    /// Username or password is empty.
    #[error("{0}")]
    MissingCredentials(&'static str),
}
