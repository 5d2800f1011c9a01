//! Bounded retry for connection-level failures.
//!
//! The portal reports errors as `200 OK` pages with embedded messages, so
//! HTTP status codes are never retried here; each flow decides what a
//! successful body looks like. Only failures to reach the server at all
//! (refused connections, connect timeouts) get another attempt. A request
//! that timed out after connecting may already have been processed, and the
//! search and login posts must not be submitted twice.

use crate::PortalError;

/// Sends the request built by `build_request`, making at most
/// `max_attempts` attempts.
///
/// The closure is called once per attempt because a
/// [`reqwest::RequestBuilder`] is consumed by `.send()`. There is no
/// backoff between attempts. A `max_attempts` of zero is treated as one.
///
/// # Errors
///
/// Returns [`PortalError::Http`] with the last error once every attempt
/// has failed, or immediately for errors that are not connection-level.
pub async fn send_with_attempts<F>(
    build_request: F,
    max_attempts: u32,
) -> Result<reqwest::Response, PortalError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match build_request().send().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < max_attempts && is_connection_failure(&e) => {
                log::warn!("  connection failure (attempt {attempt}/{max_attempts}): {e}");
                attempt += 1;
            }
            Err(e) => return Err(PortalError::Http(e)),
        }
    }
}

/// Returns `true` if the request never reached the server.
///
/// A connect timeout reports both `is_connect` and `is_timeout`; a read
/// timeout only the latter, so it is not retried.
fn is_connection_failure(e: &reqwest::Error) -> bool {
    e.is_connect()
}
