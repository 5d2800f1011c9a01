//! Fixed portal paths.
//!
//! All paths are relative to [`crate::config::DEFAULT_BASE_URL`]. They
//! mirror the routes the portal's own pages call and will break if the
//! site changes them.

/// Landing page that carries the initial `csrf-token`.
pub const ROOT: &str = "/";

/// Identity callback the login form posts to.
pub const LOGIN_CALLBACK: &str = "/auth/identity/callback";

/// Search form page, also used for delegate discovery.
pub const SEARCH_FORM: &str = "/rx_search_requests/new";

/// AJAX endpoint that creates a patient search request.
pub const SEARCH_REQUESTS: &str = "/rx_search_requests";

/// Endpoint that starts a background PDF job.
pub const NEW_BACKGROUND_DOCUMENT: &str = "/background_documents/new";

/// Detail page for a search request.
#[must_use]
pub fn search_request(request_id: &str) -> String {
    format!("{SEARCH_REQUESTS}/{request_id}")
}

/// Download URL path for a finished background document.
#[must_use]
pub fn document_download(document_id: &str) -> String {
    format!("/background_documents/{document_id}/download")
}

/// Path that deletes a background document on the server.
#[must_use]
pub fn document_cancel(document_id: &str) -> String {
    format!("/background_documents/{document_id}/cancel")
}
