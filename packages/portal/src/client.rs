//! Cookie-persisting HTTP client for the portal.
//!
//! Every request goes through [`PortalClient::send`] so that it shares the
//! session cookie jar, carries the browser user agent, and gets the
//! bounded connection retry from [`crate::retry`].

use reqwest::Method;

use crate::{PortalError, ScraperConfig, retry};

/// `Accept` header the portal's jQuery UJS handlers send.
const SCRIPT_ACCEPT: &str = "*/*;q=0.5, text/javascript, application/javascript, \
                             application/ecmascript, application/x-ecmascript";

/// One request, described independently of the client so it can be
/// rebuilt for every attempt.
#[derive(Debug, Clone)]
pub struct PortalRequest {
    method: Method,
    url: String,
    headers: Vec<(&'static str, String)>,
    form: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl PortalRequest {
    fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            form: Vec::new(),
            query: Vec::new(),
        }
    }

    /// A `GET` request for `url`.
    #[must_use]
    pub fn get(url: String) -> Self {
        Self::new(Method::GET, url)
    }

    /// A `POST` request for `url`.
    #[must_use]
    pub fn post(url: String) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_owned()));
        self
    }

    /// Adds a URL-encoded form field to the body.
    #[must_use]
    pub fn form_field(mut self, key: &str, value: &str) -> Self {
        self.form.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Adds a query-string parameter.
    #[must_use]
    pub fn query_param(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Adds the headers the portal expects on its AJAX endpoints,
    /// including the anti-forgery token.
    #[must_use]
    pub fn xhr(self, token: &str) -> Self {
        self.header("Accept", SCRIPT_ACCEPT)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-CSRF-Token", token)
    }

    fn build(&self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = http.request(self.method.clone(), &self.url);

        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if !self.form.is_empty() {
            builder = builder.form(&self.form);
        }
        for (name, value) in &self.headers {
            builder = builder.header(*name, value.as_str());
        }

        builder
    }
}

/// HTTP client bound to one portal host and one cookie jar.
#[derive(Debug, Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
}

impl PortalClient {
    /// Builds a client with a fresh cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &ScraperConfig) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Absolute URL for a portal path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends `request`, retrying connection failures up to `max_attempts`
    /// attempts. Any HTTP status is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if every attempt fails.
    pub async fn send(
        &self,
        request: &PortalRequest,
        max_attempts: u32,
    ) -> Result<reqwest::Response, PortalError> {
        log::debug!("{} {}", request.method, request.url);
        retry::send_with_attempts(|| request.build(&self.http), max_attempts).await
    }

    /// Sends `request` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if the request fails or the body
    /// cannot be read.
    pub async fn text(
        &self,
        request: &PortalRequest,
        max_attempts: u32,
    ) -> Result<String, PortalError> {
        let response = self.send(request, max_attempts).await?;
        Ok(response.text().await?)
    }

    /// Sends `request` and returns the raw body of a successful response.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] if the request fails or the server
    /// answers with a non-success status.
    pub async fn bytes(
        &self,
        request: &PortalRequest,
        max_attempts: u32,
    ) -> Result<Vec<u8>, PortalError> {
        let response = self
            .send(request, max_attempts)
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
