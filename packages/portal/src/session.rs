//! The portal session.

use checknarc_portal_models::{Delegate, PendingDocument, SearchWindow};

use crate::{PortalClient, PortalError, ScraperConfig, token};

/// One authenticated portal session.
///
/// Owns the cookie jar, the most recent anti-forgery token, the chosen
/// delegate and the queue of reports waiting to be downloaded. Every
/// operation that touches the token or the queue takes `&mut self`, so a
/// session can only be driven by one caller at a time.
#[derive(Debug)]
pub struct Scraper {
    pub(crate) client: PortalClient,
    pub(crate) config: ScraperConfig,
    pub(crate) token: String,
    pub(crate) delegate: Option<Delegate>,
    pub(crate) pending: Vec<PendingDocument>,
    pub(crate) window: SearchWindow,
}

impl Scraper {
    /// Creates an unauthenticated session.
    ///
    /// The search window is fixed here: it ends on `config.today` (or the
    /// local date) and spans `config.lookback_days`.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ScraperConfig) -> Result<Self, PortalError> {
        let client = PortalClient::new(&config)?;
        let today = config
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let window = SearchWindow::ending(today, config.lookback_days);

        Ok(Self {
            client,
            config,
            token: String::new(),
            delegate: None,
            pending: Vec::new(),
            window,
        })
    }

    /// The most recent anti-forgery token seen.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Fill-date range used for every search in this session.
    #[must_use]
    pub const fn window(&self) -> SearchWindow {
        self.window
    }

    /// The delegate searches are made on behalf of, if any.
    #[must_use]
    pub const fn delegate(&self) -> Option<&Delegate> {
        self.delegate.as_ref()
    }

    /// Sets the delegate attached to every later search.
    ///
    /// A delegate can only be chosen once per session; later calls are
    /// ignored and return `false`.
    pub fn set_delegate(&mut self, delegate: Delegate) -> bool {
        if let Some(current) = &self.delegate {
            log::warn!(
                "Delegate already set to '{}', ignoring '{}'",
                current.name,
                delegate.name
            );
            return false;
        }

        log::info!("Searching on behalf of '{}'", delegate.name);
        self.delegate = Some(delegate);
        true
    }

    /// Reports generated so far and not yet downloaded.
    #[must_use]
    pub fn pending_documents(&self) -> &[PendingDocument] {
        &self.pending
    }

    /// Replaces the token with the one in `html`.
    pub(crate) fn refresh_token(&mut self, html: &str) -> Result<(), PortalError> {
        self.token = token::extract_token(html)?;
        Ok(())
    }

    /// Replaces the token if `html` carries one, leaving it untouched
    /// otherwise.
    pub(crate) fn absorb_token(&mut self, html: &str) {
        if let Ok(token) = token::extract_token(html) {
            self.token = token;
        }
    }
}
