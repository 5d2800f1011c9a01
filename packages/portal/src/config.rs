//! Tunables for a [`crate::Scraper`] session.

use std::time::Duration;

use checknarc_portal_models::DEFAULT_LOOKBACK_DAYS;
use chrono::NaiveDate;

/// Production portal.
pub const DEFAULT_BASE_URL: &str = "https://arkansas.pmpaware.net";

/// Browser user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:62.0) Gecko/20100101 Firefox/62.0";

/// Attempts per request when a connection fails.
pub const DEFAULT_ATTEMPTS: u32 = 2;

/// Pause before downloading when exactly one report is queued.
pub const SINGLE_DOCUMENT_PAUSE: Duration = Duration::from_secs(4);

/// Configuration for a portal session.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Scheme and host of the portal, without a trailing slash.
    pub base_url: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Total attempts for requests that may be retried.
    pub attempts: u32,
    /// Pause before a single-report download batch.
    pub single_document_pause: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Length of the fill-date window, in days.
    pub lookback_days: i64,
    /// Overrides the local date the search window ends on.
    pub today: Option<NaiveDate>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            attempts: DEFAULT_ATTEMPTS,
            single_document_pause: SINGLE_DOCUMENT_PAUSE,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            today: None,
        }
    }
}

impl ScraperConfig {
    /// Points the session at a different host (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        base_url.trim_end_matches('/').clone_into(&mut self.base_url);
        self
    }

    /// Sets the number of attempts for retryable requests.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the pause applied before a single-report download batch.
    #[must_use]
    pub const fn with_single_document_pause(mut self, pause: Duration) -> Self {
        self.single_document_pause = pause;
        self
    }

    /// Fixes the date the search window ends on.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}
