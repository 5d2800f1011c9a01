//! Login handshake.
//!
//! The portal serves its login form at `/` and posts it to an OmniAuth
//! identity callback. A failed login is not an HTTP error: the callback
//! re-renders the form with a flash message, so the outcome is read from
//! the body text.

use checknarc_portal_models::{AuthFailure, Delegate};

use crate::client::PortalRequest;
use crate::{PortalError, Scraper, endpoints};

/// Flash message shown for a wrong username or password.
pub const INCORRECT_LOGIN_MARKER: &str = "Authentication failed, please try again.";

/// Flash message shown when the account password must be changed.
pub const PASSWORD_EXPIRED_MARKER: &str = "Your password has expired.";

/// Result of a login attempt that reached the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signed in. Holds the delegates the account may search for (empty
    /// when the account has none).
    Authenticated {
        /// Delegates offered by the search form.
        delegates: Vec<Delegate>,
    },
    /// The portal refused the credentials.
    Rejected(AuthFailure),
}

impl LoginOutcome {
    /// Converts a rejection into [`PortalError::Auth`].
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Auth`] if the login was rejected.
    pub fn into_delegates(self) -> Result<Vec<Delegate>, PortalError> {
        match self {
            Self::Authenticated { delegates } => Ok(delegates),
            Self::Rejected(failure) => Err(PortalError::Auth(failure)),
        }
    }
}

/// Reads a login response for a known failure message.
///
/// Anything without one of the failure markers counts as success.
#[must_use]
pub fn classify_login(body: &str) -> Option<AuthFailure> {
    if body.contains(INCORRECT_LOGIN_MARKER) {
        Some(AuthFailure::IncorrectLogin)
    } else if body.contains(PASSWORD_EXPIRED_MARKER) {
        Some(AuthFailure::PasswordExpired)
    } else {
        None
    }
}

impl Scraper {
    /// Signs in and discovers delegates.
    ///
    /// The landing page is fetched with a single attempt: if the portal is
    /// unreachable there is nothing to retry into.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if the portal cannot be reached, or
    /// [`PortalError::Parse`] if the landing page or the signed-in page
    /// lacks an anti-forgery token.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, PortalError> {
        log::info!("Opening portal at {}", self.config.base_url);
        let landing = self
            .client
            .text(&PortalRequest::get(self.client.url(endpoints::ROOT)), 1)
            .await?;
        self.refresh_token(&landing)?;

        log::info!("Signing in as {username}");
        let request = PortalRequest::post(self.client.url(endpoints::LOGIN_CALLBACK))
            .form_field("auth_key", username)
            .form_field("authenticity_token", &self.token)
            .form_field("commit", "Log+In")
            .form_field("password", password)
            .form_field("utf8", "\u{2713}");
        let body = self.client.text(&request, self.config.attempts).await?;

        if let Some(failure) = classify_login(&body) {
            log::warn!("Login rejected: {failure}");
            return Ok(LoginOutcome::Rejected(failure));
        }

        self.refresh_token(&body)?;
        log::info!("Signed in");

        let delegates = self.discover_delegates().await;
        Ok(LoginOutcome::Authenticated { delegates })
    }
}
