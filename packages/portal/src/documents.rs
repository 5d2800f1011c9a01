//! PDF report generation, download and cleanup.
//!
//! Generating a report is a two step exchange: opening the search request
//! page rotates the token, and asking for a new background document
//! returns its id as JSON. The report is then rendered by the server in
//! the background, so downloads are deferred until every patient has been
//! searched.

use std::path::{Path, PathBuf};

use checknarc_portal_models::PendingDocument;

use crate::client::PortalRequest;
use crate::{PortalError, Scraper, endpoints};

/// `request_type` sent when asking for a background document.
pub const REQUEST_TYPE: &str = "RxSearchRequest";

/// Section ordering requested for generated reports.
pub const REPORT_SORT: &str = "Prescriptions/filled_at/desc|Prescribers/prescriber_last_name/asc|Dispensers/dispensary_name/desc";

const DOCUMENT_ID_START: &str = "\"id\":";
const DOCUMENT_ID_END: &str = ",\"user_id\"";

/// A report that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    /// Output file stem of the report.
    pub file_name: String,
    /// Why the download failed.
    pub error: String,
}

/// Summary of a [`Scraper::fetch_documents`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Files written, in queue order.
    pub written: Vec<PathBuf>,
    /// Reports that could not be downloaded.
    pub failed: Vec<FailedDownload>,
    /// File stems of reports left on the server without a download
    /// attempt.
    pub skipped: Vec<String>,
}

/// Reads the background document id from the JSON the portal returns.
///
/// # Errors
///
/// Returns [`PortalError::Parse`] if the `"id":` field is missing or not
/// numeric.
pub fn parse_document_id(body: &str) -> Result<String, PortalError> {
    let (_, rest) = body
        .split_once(DOCUMENT_ID_START)
        .ok_or_else(|| PortalError::Parse("no document id in response".to_owned()))?;
    let (id, _) = rest
        .split_once(DOCUMENT_ID_END)
        .ok_or_else(|| PortalError::Parse("no user id after document id".to_owned()))?;
    let id = id.trim();

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortalError::Parse(format!("invalid document id '{id}'")));
    }

    Ok(id.to_owned())
}

impl Scraper {
    /// Asks the portal to render a report for a search request and queues
    /// it for download.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Http`] on network failure, or
    /// [`PortalError::Parse`] if the request page has no token or the
    /// document id cannot be read.
    pub async fn generate_pdf(
        &mut self,
        request_id: &str,
        file_name: &str,
    ) -> Result<PendingDocument, PortalError> {
        let request =
            PortalRequest::get(self.client.url(&endpoints::search_request(request_id)))
                .xhr(&self.token);
        let page = self.client.text(&request, self.config.attempts).await?;
        self.refresh_token(&page)?;

        let request = PortalRequest::get(self.client.url(endpoints::NEW_BACKGROUND_DOCUMENT))
            .query_param("request_id", request_id)
            .query_param("request_type", REQUEST_TYPE)
            .query_param("sort", REPORT_SORT)
            .xhr(&self.token);
        let body = self.client.text(&request, self.config.attempts).await?;
        let document_id = parse_document_id(&body)?;

        log::info!("Queued report {document_id} for {file_name}");
        let document = PendingDocument {
            download_url: self.client.url(&endpoints::document_download(&document_id)),
            document_id,
            request_id: request_id.to_owned(),
            file_name: file_name.to_owned(),
        };
        self.pending.push(document.clone());

        Ok(document)
    }

    /// Downloads every queued report into `output_dir` and cancels each
    /// server-side document once its file is written.
    ///
    /// The queue is drained even if some downloads fail; those are listed
    /// in the returned report and their documents are left on the server.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Io`] if `output_dir` cannot be created.
    pub async fn fetch_documents(&mut self, output_dir: &Path) -> Result<FetchReport, PortalError> {
        let queue = std::mem::take(&mut self.pending);
        let mut report = FetchReport::default();

        if queue.is_empty() {
            return Ok(report);
        }

        tokio::fs::create_dir_all(output_dir).await?;

        // A lone report may still be rendering.
        if queue.len() == 1 && !self.config.single_document_pause.is_zero() {
            log::debug!(
                "Waiting {:?} for the report to render",
                self.config.single_document_pause
            );
            tokio::time::sleep(self.config.single_document_pause).await;
        }

        log::info!("Downloading {} report(s)", queue.len());
        for document in queue {
            match self.download(&document, output_dir).await {
                Ok(path) => {
                    self.cancel_document(&document).await;
                    report.written.push(path);
                }
                Err(e) => {
                    log::error!("Failed to download {}.pdf: {e}", document.file_name);
                    report.failed.push(FailedDownload {
                        file_name: document.file_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Empties the queue without downloading anything.
    ///
    /// The server-side documents are left in place so they can still be
    /// retrieved from the portal.
    pub fn skip_documents(&mut self) -> FetchReport {
        let skipped: Vec<String> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|document| document.file_name)
            .collect();

        if !skipped.is_empty() {
            log::warn!("Leaving {} report(s) on the portal", skipped.len());
        }

        FetchReport {
            skipped,
            ..FetchReport::default()
        }
    }

    async fn download(
        &self,
        document: &PendingDocument,
        output_dir: &Path,
    ) -> Result<PathBuf, PortalError> {
        let request = PortalRequest::get(document.download_url.clone());
        let bytes = self.client.bytes(&request, self.config.attempts).await?;

        let path = output_dir.join(format!("{}.pdf", document.file_name));
        tokio::fs::write(&path, &bytes).await?;
        log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());

        Ok(path)
    }

    /// Deletes a downloaded document on the server, keyed by its background
    /// document id rather than the search request id it came from.
    async fn cancel_document(&self, document: &PendingDocument) {
        let request =
            PortalRequest::get(self.client.url(&endpoints::document_cancel(&document.document_id)))
                .xhr(&self.token);
        if let Err(e) = self.client.send(&request, self.config.attempts).await {
            log::warn!("Could not cancel document {}: {e}", document.document_id);
        }
    }
}
