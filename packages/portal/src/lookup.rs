//! Patient search and response classification.
//!
//! The search form is submitted through jQuery UJS, so the portal answers
//! with a JavaScript snippet rather than HTML. The snippet is matched
//! against a fixed list of markers taken from the portal's own templates.

use checknarc_portal_models::{LookupOutcome, LookupResult, PatientQuery};

use crate::client::PortalRequest;
use crate::{PortalError, Scraper, endpoints};

/// Kind of response a marker identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Patient matched, no prescriptions in the window.
    NoResults,
    /// No patient matched.
    NotFound,
    /// A report was generated and the page redirects to it.
    ReportGenerated,
}

/// One classification rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Substring that identifies the response.
    pub marker: &'static str,
    /// What the response means.
    pub kind: ResponseKind,
}

/// Classification rules, checked in order. The first match wins.
pub const RESPONSE_RULES: &[Rule] = &[
    Rule {
        marker: "  $('#patients_found_but_no_results_modal').modal('toggle');",
        kind: ResponseKind::NoResults,
    },
    Rule {
        marker: r#"div_string += "No matching patient identified.""#,
        kind: ResponseKind::NotFound,
    },
    Rule {
        marker: "top.location",
        kind: ResponseKind::ReportGenerated,
    },
];

const REQUEST_ID_PREFIX: &str = "rx_search_requests/";

/// Finds the first rule whose marker appears in `body`.
#[must_use]
pub fn classify_response(body: &str) -> Option<ResponseKind> {
    RESPONSE_RULES
        .iter()
        .find(|rule| body.contains(rule.marker))
        .map(|rule| rule.kind)
}

/// Pulls the search request id out of a `top.location` redirect snippet.
///
/// # Errors
///
/// Returns [`PortalError::Parse`] if the snippet has no
/// `rx_search_requests/` path or the id after it is empty.
pub fn extract_request_id(body: &str) -> Result<String, PortalError> {
    let (_, rest) = body.split_once(REQUEST_ID_PREFIX).ok_or_else(|| {
        PortalError::Parse(format!("no '{REQUEST_ID_PREFIX}' path in redirect"))
    })?;
    let id = rest.split('"').next().unwrap_or_default().trim();

    if id.is_empty() {
        return Err(PortalError::Parse("empty search request id".to_owned()));
    }

    Ok(id.to_owned())
}

impl Scraper {
    /// Searches for one patient and classifies the answer.
    ///
    /// Failures never escape: a network error, or a report that could not
    /// be generated, becomes the diagnostic text of the returned row so
    /// the rest of the batch can continue.
    pub async fn lookup(&mut self, query: &PatientQuery) -> LookupResult {
        let outcome = match self.search(query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Lookup failed for {} {}: {e}", query.first_name, query.last_name);
                LookupOutcome::Failed(format!("Lookup failed: {e}"))
            }
        };

        LookupResult::new(query, &outcome)
    }

    async fn search(&mut self, query: &PatientQuery) -> Result<LookupOutcome, PortalError> {
        let mut request = PortalRequest::post(self.client.url(endpoints::SEARCH_REQUESTS))
            .xhr(&self.token)
            .form_field("authenticity_token", &self.token)
            .form_field("utf8", "\u{2713}")
            .form_field("rx_search_request[first_name]", &query.first_name)
            .form_field("rx_search_request[last_name]", &query.last_name)
            .form_field("rx_search_request[birthdate]", &query.dob)
            .form_field(
                "rx_search_request[filled_at_begin]",
                &self.window.begin_param(),
            )
            .form_field("rx_search_request[filled_at_end]", &self.window.end_param())
            .form_field("rx_search_request[search_type]", "interconnect");
        if let Some(delegate) = &self.delegate {
            request = request.form_field("rx_search_request[supervisor_id]", &delegate.id);
        }

        let body = self.client.text(&request, self.config.attempts).await?;

        let outcome = match classify_response(&body) {
            Some(ResponseKind::NoResults) => LookupOutcome::NoResults,
            Some(ResponseKind::NotFound) => LookupOutcome::NotFound,
            Some(ResponseKind::ReportGenerated) => {
                let file_name = query.file_stem();
                match self.materialize(&body, &file_name).await {
                    Ok(()) => LookupOutcome::Report { file_name },
                    Err(e) => {
                        log::warn!("PDF generation failed for {file_name}: {e}");
                        LookupOutcome::Failed(format!("PDF generation failed: {e}"))
                    }
                }
            }
            None => {
                log::warn!(
                    "Unrecognized response for {} {}",
                    query.first_name,
                    query.last_name
                );
                LookupOutcome::Unrecognized(body)
            }
        };

        log::debug!("{} {}: {}", query.first_name, query.last_name, outcome.label());
        Ok(outcome)
    }

    async fn materialize(&mut self, body: &str, file_name: &str) -> Result<(), PortalError> {
        let request_id = extract_request_id(body)?;
        self.generate_pdf(&request_id, file_name).await?;
        Ok(())
    }
}
