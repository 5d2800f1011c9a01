//! Shared fixtures for the wiremock-backed tests.

use std::time::Duration;

use chrono::NaiveDate;
use wiremock::MockServer;

use crate::{Scraper, ScraperConfig};

/// Token every [`scraper_for`] session starts with.
pub const TEST_TOKEN: &str = "test-token";

/// Config pointing at `server`, with no download pause and a fixed date.
pub fn config_for(server: &MockServer) -> ScraperConfig {
    ScraperConfig::default()
        .with_base_url(&server.uri())
        .with_single_document_pause(Duration::ZERO)
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
}

/// A session for `server` that behaves as if already signed in.
pub fn scraper_for(server: &MockServer) -> Scraper {
    let mut scraper = Scraper::new(config_for(server)).unwrap();
    TEST_TOKEN.clone_into(&mut scraper.token);
    scraper
}

/// A minimal Rails page carrying `token` and `body`.
pub fn page_with_token(token: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head>
<meta name="csrf-param" content="authenticity_token" />
<meta name="csrf-token" content="{token}" />
</head><body>{body}</body></html>"#
    )
}
