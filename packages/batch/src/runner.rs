//! The cancellable run loop.

use std::path::{Path, PathBuf};

use checknarc_portal::{FetchReport, PortalError, Scraper, ScraperConfig};
use checknarc_portal_models::{Delegate, LookupResult, PatientQuery};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::events::percent;
use crate::output::write_results;
use crate::{BatchError, RunEvent, RunStatus};

/// Portal login.
#[derive(Clone)]
pub struct Credentials {
    /// Portal username.
    pub username: String,
    /// Portal password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Rejects an empty username or password before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::MissingCredentials`] with the message to show
    /// the user.
    pub fn check(&self) -> Result<(), BatchError> {
        match (
            self.username.trim().is_empty(),
            self.password.is_empty(),
        ) {
            (true, true) => Err(BatchError::MissingCredentials(
                "Please enter a username and password!",
            )),
            (true, false) => Err(BatchError::MissingCredentials("Please enter a username!")),
            (false, true) => Err(BatchError::MissingCredentials("Please enter a password!")),
            (false, false) => Ok(()),
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// [`RunStatus::Succeeded`] or [`RunStatus::Cancelled`].
    pub status: RunStatus,
    /// One row per processed patient, in input order.
    pub results: Vec<LookupResult>,
    /// Reports downloaded, failed, or left on the portal by a cancelled
    /// run.
    pub fetch: FetchReport,
    /// Path of the exported `patients.csv`.
    pub results_file: PathBuf,
}

/// Runs a whole batch: login, optional delegate choice, one lookup per
/// patient, report downloads and result export.
///
/// `cancel` is checked before each patient and before the downloads. A
/// cancelled run skips the downloads but still exports the rows it
/// finished; rows whose report was not downloaded say so instead of
/// pointing at a missing file. The last event sent is always
/// [`RunEvent::Finished`].
///
/// # Errors
///
/// Returns an error if the credentials are empty, the login fails or is
/// rejected, or the output cannot be written. Per-patient failures are
/// not errors; they end up in that patient's row.
pub async fn run(
    config: ScraperConfig,
    credentials: &Credentials,
    patients: &[PatientQuery],
    output_dir: &Path,
    events: &mpsc::Sender<RunEvent>,
    cancel: &CancellationToken,
) -> Result<RunReport, BatchError> {
    match execute(config, credentials, patients, output_dir, events, cancel).await {
        Ok(report) => {
            emit(events, RunEvent::Finished(report.status.clone())).await;
            Ok(report)
        }
        Err(e) => {
            let reason = match &e {
                BatchError::Portal(PortalError::Auth(failure)) => failure.to_string(),
                other => other.to_string(),
            };
            log::error!("Run failed: {reason}");
            emit(events, RunEvent::Finished(RunStatus::Failed { reason })).await;
            Err(e)
        }
    }
}

async fn execute(
    config: ScraperConfig,
    credentials: &Credentials,
    patients: &[PatientQuery],
    output_dir: &Path,
    events: &mpsc::Sender<RunEvent>,
    cancel: &CancellationToken,
) -> Result<RunReport, BatchError> {
    emit(events, RunEvent::Initializing).await;
    credentials.check()?;

    let mut scraper = Scraper::new(config)?;
    let delegates = scraper
        .login(&credentials.username, &credentials.password)
        .await?
        .into_delegates()?;

    let mut cancelled = false;
    if !delegates.is_empty() {
        match choose_delegate(events, delegates, cancel).await {
            Some(delegate) => {
                scraper.set_delegate(delegate);
            }
            None => {
                log::info!("No delegate chosen, cancelling");
                cancelled = true;
            }
        }
    }

    let total = patients.len();
    let mut results = Vec::with_capacity(total);

    if !cancelled {
        for (index, patient) in patients.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Cancelled after {index} of {total} patient(s)");
                cancelled = true;
                break;
            }

            results.push(scraper.lookup(patient).await);

            let completed = index + 1;
            emit(
                events,
                RunEvent::Status(format!("Downloaded {}", patient.last_name)),
            )
            .await;
            emit(
                events,
                RunEvent::Progress {
                    completed,
                    total,
                    percent: percent(completed, total),
                },
            )
            .await;
        }
    }

    if cancel.is_cancelled() {
        cancelled = true;
    }

    let fetch = if cancelled {
        scraper.skip_documents()
    } else {
        emit(
            events,
            RunEvent::Status("Downloading PDF reports".to_owned()),
        )
        .await;
        scraper.fetch_documents(output_dir).await?
    };
    relabel_missing_reports(&mut results, &fetch);

    emit(events, RunEvent::Status("Exporting Data".to_owned())).await;
    let results_file = write_results(output_dir, &results)?;

    let status = if cancelled {
        emit(events, RunEvent::Status("Cancelled".to_owned())).await;
        RunStatus::Cancelled
    } else {
        emit(events, RunEvent::Status("Finished!".to_owned())).await;
        RunStatus::Succeeded
    };

    Ok(RunReport {
        status,
        results,
        fetch,
        results_file,
    })
}

/// Rewrites `See {file}.pdf` rows whose report never reached the output
/// directory.
fn relabel_missing_reports(results: &mut [LookupResult], fetch: &FetchReport) {
    let missing = fetch
        .failed
        .iter()
        .map(|failed| {
            (
                failed.file_name.as_str(),
                format!("Report download failed: {}", failed.error),
            )
        })
        .chain(fetch.skipped.iter().map(|file_name| {
            (
                file_name.as_str(),
                "Report not downloaded (run cancelled), still on the portal".to_owned(),
            )
        }));

    for (file_name, label) in missing {
        let pointer = format!("See {file_name}.pdf");
        for result in results.iter_mut().filter(|r| r.response == pointer) {
            result.response.clone_from(&label);
        }
    }
}

/// Asks the front end to pick a delegate and waits for the answer.
///
/// Returns `None` if the front end declines, goes away, or the run is
/// cancelled while waiting.
async fn choose_delegate(
    events: &mpsc::Sender<RunEvent>,
    delegates: Vec<Delegate>,
    cancel: &CancellationToken,
) -> Option<Delegate> {
    let (reply, choice) = oneshot::channel();
    emit(events, RunEvent::ChooseDelegate { delegates, reply }).await;

    tokio::select! {
        () = cancel.cancelled() => None,
        answer = choice => answer.ok().flatten(),
    }
}

async fn emit(events: &mpsc::Sender<RunEvent>, event: RunEvent) {
    let _ = events.send(event).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use checknarc_portal_models::AuthFailure;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;

    const NO_RESULTS: &str = "  $('#patients_found_but_no_results_modal').modal('toggle');";
    const NOT_FOUND: &str = r#"div_string += "No matching patient identified.";"#;
    const REDIRECT: &str = "top.location = \"/rx_search_requests/4521\"\n";

    fn page(token: &str, body: &str) -> String {
        format!(
            r#"<html><head><meta name="csrf-token" content="{token}"></head><body>{body}</body></html>"#
        )
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "nurse".to_owned(),
            password: "secret".to_owned(),
        }
    }

    fn patient(first: &str, last: &str) -> PatientQuery {
        PatientQuery::new(first, last, "1/2/1980").unwrap()
    }

    fn config_for(server: &MockServer) -> ScraperConfig {
        ScraperConfig::default()
            .with_base_url(&server.uri())
            .with_single_document_pause(Duration::ZERO)
    }

    async fn mount_login(server: &MockServer, search_form: &str) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t1", "")))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/identity/callback"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t2", "Welcome")))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rx_search_requests/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t3", search_form)))
            .mount(server)
            .await;
    }

    async fn mount_lookup(server: &MockServer, last_name: &str, body: &str) {
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .and(body_string_contains(format!(
                "rx_search_request%5Blast_name%5D={last_name}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_report(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rx_search_requests/4521"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t4", "")))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":88,"user_id":1}"#))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/88/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/88/cancel"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(server)
            .await;
    }

    fn drain(rx: &mut mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn pdf_count(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "pdf"))
            .count()
    }

    /// Answers a lookup and cancels the run while doing so.
    struct CancelDuring {
        cancel: CancellationToken,
    }

    impl Respond for CancelDuring {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.cancel.cancel();
            ResponseTemplate::new(200).set_body_string(NOT_FOUND)
        }
    }

    #[test]
    fn credential_messages() {
        let check = |username: &str, password: &str| {
            Credentials {
                username: username.to_owned(),
                password: password.to_owned(),
            }
            .check()
            .map_err(|e| e.to_string())
        };

        assert_eq!(
            check("", "").unwrap_err(),
            "Please enter a username and password!"
        );
        assert_eq!(check(" ", "pw").unwrap_err(), "Please enter a username!");
        assert_eq!(check("nurse", "").unwrap_err(), "Please enter a password!");
        assert!(check("nurse", "pw").is_ok());
    }

    #[test]
    fn debug_hides_password() {
        let printed = format!("{:?}", credentials());
        assert!(printed.contains("nurse"));
        assert!(!printed.contains("secret"));
    }

    #[tokio::test]
    async fn three_patients_one_report() {
        let server = MockServer::start().await;
        mount_login(&server, "").await;
        mount_lookup(&server, "Doe", REDIRECT).await;
        mount_lookup(&server, "Roe", NOT_FOUND).await;
        mount_lookup(&server, "Poe", NO_RESULTS).await;
        mount_report(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let patients = vec![
            patient("John", "Doe"),
            patient("Jane", "Roe"),
            patient("Edgar", "Poe"),
        ];

        let report = run(
            config_for(&server),
            &credentials(),
            &patients,
            dir.path(),
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.status, RunStatus::Succeeded);
        let responses: Vec<&str> = report.results.iter().map(|r| r.response.as_str()).collect();
        assert_eq!(
            responses,
            vec![
                "See JohnDoe.pdf",
                "No Patient Found",
                "Valid Patient, No Results"
            ]
        );
        assert_eq!(pdf_count(dir.path()), 1);
        assert!(dir.path().join("JohnDoe.pdf").exists());

        let csv = std::fs::read_to_string(&report.results_file).unwrap();
        assert_eq!(csv.lines().count(), 4);
        assert!(csv.lines().nth(1).unwrap().starts_with("John,Doe,"));
        assert!(csv.lines().nth(3).unwrap().starts_with("Edgar,Poe,"));

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(RunEvent::Initializing)));
        assert!(matches!(
            events.last(),
            Some(RunEvent::Finished(RunStatus::Succeeded))
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Progress {
                completed: 3,
                total: 3,
                percent: 100
            }
        )));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, RunEvent::Status(s) if s == "Downloaded Roe"))
        );
    }

    #[tokio::test]
    async fn cancelling_after_second_patient_keeps_two_rows() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        mount_login(&server, "").await;
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .and(body_string_contains("rx_search_request%5Blast_name%5D=Two"))
            .respond_with(CancelDuring {
                cancel: cancel.clone(),
            })
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .respond_with(ResponseTemplate::new(200).set_body_string(NOT_FOUND))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let patients: Vec<PatientQuery> = ["One", "Two", "Three", "Four", "Five"]
            .into_iter()
            .map(|last| patient("Pat", last))
            .collect();

        let report = run(
            config_for(&server),
            &credentials(),
            &patients,
            dir.path(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.results.len(), 2);
        let csv = std::fs::read_to_string(&report.results_file).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(matches!(
            drain(&mut rx).last(),
            Some(RunEvent::Finished(RunStatus::Cancelled))
        ));
    }

    #[tokio::test]
    async fn cancelled_run_relabels_queued_report() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        mount_login(&server, "").await;
        mount_lookup(&server, "Doe", REDIRECT).await;
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .and(body_string_contains("rx_search_request%5Blast_name%5D=Roe"))
            .respond_with(CancelDuring {
                cancel: cancel.clone(),
            })
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rx_search_requests/4521"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t4", "")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":88,"user_id":1}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/88/download"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(64);
        let patients = vec![
            patient("John", "Doe"),
            patient("Jane", "Roe"),
            patient("Edgar", "Poe"),
        ];

        let report = run(
            config_for(&server),
            &credentials(),
            &patients,
            dir.path(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.fetch.skipped, vec!["JohnDoe".to_owned()]);
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].response.starts_with("Report not downloaded"));
        assert_eq!(pdf_count(dir.path()), 0);
        let csv = std::fs::read_to_string(&report.results_file).unwrap();
        assert!(!csv.contains("See JohnDoe.pdf"));
    }

    #[tokio::test]
    async fn failed_download_relabels_row() {
        let server = MockServer::start().await;
        mount_login(&server, "").await;
        mount_lookup(&server, "Doe", REDIRECT).await;
        mount_lookup(&server, "Roe", NOT_FOUND).await;
        Mock::given(method("GET"))
            .and(path("/rx_search_requests/4521"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t4", "")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":88,"user_id":1}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/88/download"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/background_documents/88/cancel"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(64);

        let report = run(
            config_for(&server),
            &credentials(),
            &[patient("John", "Doe"), patient("Jane", "Roe")],
            dir.path(),
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.fetch.failed.len(), 1);
        assert!(
            report.results[0]
                .response
                .starts_with("Report download failed:")
        );
        assert_eq!(report.results[1].response, "No Patient Found");
        assert_eq!(pdf_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn delegate_choice_is_applied_to_lookups() {
        let server = MockServer::start().await;
        mount_login(
            &server,
            r#"<select id="rx_search_request_supervisor_id">
                <option value="">Myself</option>
                <option value="42">Dr. Alice Smith</option>
            </select>"#,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .and(body_string_contains("rx_search_request%5Bsupervisor_id%5D=42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(NOT_FOUND))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let front_end = tokio::spawn(async move {
            let mut offered = Vec::new();
            while let Some(event) = rx.recv().await {
                if let RunEvent::ChooseDelegate { delegates, reply } = event {
                    offered.clone_from(&delegates);
                    let _ = reply.send(delegates.into_iter().next());
                }
            }
            offered
        });

        let report = run(
            config_for(&server),
            &credentials(),
            &[patient("John", "Doe")],
            dir.path(),
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(report.results[0].response, "No Patient Found");
        let offered = front_end.await.unwrap();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].name, "Dr. Alice Smith");
    }

    #[tokio::test]
    async fn declining_delegate_cancels_before_lookups() {
        let server = MockServer::start().await;
        mount_login(
            &server,
            r#"<select id="rx_search_request_supervisor_id">
                <option value="">Myself</option>
                <option value="42">Dr. Alice Smith</option>
            </select>"#,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let front_end = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let RunEvent::ChooseDelegate { reply, .. } = event {
                    let _ = reply.send(None);
                }
            }
        });

        let report = run(
            config_for(&server),
            &credentials(),
            &[patient("John", "Doe")],
            dir.path(),
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        drop(tx);
        front_end.await.unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn rejected_login_fails_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page("t1", "")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/identity/callback"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(
                "t1",
                "Authentication failed, please try again.",
            )))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rx_search_requests"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        let result = run(
            config_for(&server),
            &credentials(),
            &[patient("John", "Doe")],
            dir.path(),
            &tx,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(BatchError::Portal(PortalError::Auth(
                AuthFailure::IncorrectLogin
            )))
        ));
        assert!(!dir.path().join("patients.csv").exists());
        match drain(&mut rx).last() {
            Some(RunEvent::Finished(RunStatus::Failed { reason })) => {
                assert_eq!(reason, "Incorrect Login");
            }
            other => panic!("unexpected last event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_credentials_never_reach_the_portal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(64);
        let credentials = Credentials {
            username: String::new(),
            password: "secret".to_owned(),
        };

        let result = run(
            config_for(&server),
            &credentials,
            &[],
            dir.path(),
            &tx,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(BatchError::MissingCredentials(_))));
    }
}
