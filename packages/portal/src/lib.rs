#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Session and workflow engine for the PMP AWARxE prescription portal.
//!
//! The portal has no public API, so [`Scraper`] drives it the way a
//! browser would: it logs in through the HTML form, follows the rotating
//! `csrf-token` meta tag across requests, submits patient searches through
//! the same AJAX endpoint the search page uses, and classifies the
//! server-rendered JavaScript that comes back.
//!
//! A run always goes through the same stages, in order:
//!
//! 1. [`Scraper::login`] (which also runs [`Scraper::discover_delegates`])
//! 2. optionally [`Scraper::set_delegate`]
//! 3. [`Scraper::lookup`] for every patient
//! 4. [`Scraper::fetch_documents`] once, for every queued report

pub mod auth;
pub mod client;
pub mod config;
pub mod delegation;
pub mod documents;
pub mod endpoints;
pub mod lookup;
pub mod retry;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

use checknarc_portal_models::AuthFailure;

pub use auth::LoginOutcome;
pub use client::{PortalClient, PortalRequest};
pub use config::ScraperConfig;
pub use documents::{FailedDownload, FetchReport};
pub use session::Scraper;

/// Errors that can occur while talking to the portal.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// An HTTP request failed after all attempts.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An expected element or field was missing from a response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The portal rejected the supplied credentials.
    #[error("Login rejected: {0}")]
    Auth(AuthFailure),

    /// Writing a downloaded report failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
