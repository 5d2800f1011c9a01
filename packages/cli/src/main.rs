#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for bulk prescription-history lookups.
//!
//! Reads a patient CSV, signs in to the portal, and runs the batch on a
//! background task while this task renders its [`RunEvent`]s. Ctrl-C
//! stops the run after the current patient; completed rows are still
//! exported.
//!
//! Uses `indicatif-log-bridge` (via [`checknarc_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the progress bar never fight for the terminal.

mod credentials;
mod delegate;

use std::path::PathBuf;

use checknarc_batch::{RunEvent, RunStatus};
use checknarc_cli_utils::PatientProgress;
use checknarc_portal::ScraperConfig;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Look up prescription histories for a list of patients.
#[derive(Parser)]
#[command(name = "checknarc")]
#[command(about = "Look up prescription histories for a list of patients")]
struct Cli {
    /// CSV with `Patient First Name`, `Patient Last Name` and `Patient DOB`
    /// columns.
    #[arg(long)]
    input: PathBuf,

    /// Directory for `patients.csv` and the PDF reports.
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Portal username. Falls back to `CHECKNARC_USERNAME`, then a prompt.
    #[arg(long)]
    username: Option<String>,

    /// Supervisor to search under, by name or id.
    #[arg(long)]
    delegate: Option<String>,
}

/// Waits for the next run event. A pending cancel is shown on the bar as
/// soon as it is requested, before the run reaches its next check.
async fn next_event(
    rx: &mut mpsc::Receiver<RunEvent>,
    cancel: &CancellationToken,
    progress: &PatientProgress,
    announced: &mut bool,
) -> Option<RunEvent> {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled(), if !*announced => {
                *announced = true;
                progress.set_status("Cancelling");
            }
            event = rx.recv() => return event,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = checknarc_cli_utils::init_logger();
    let cli = Cli::parse();

    let patients = checknarc_batch::input::read_patients(&cli.input)?;
    let credentials = credentials::resolve(cli.username)?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Cancelling after the current patient");
            watcher.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel(32);
    let mut progress = PatientProgress::new(&multi, patients.len() as u64);
    let output = cli.output.clone();
    let run_cancel = cancel.clone();
    let runner = tokio::spawn(async move {
        checknarc_batch::run(
            ScraperConfig::default(),
            &credentials,
            &patients,
            &output,
            &tx,
            &run_cancel,
        )
        .await
    });

    let mut announced = false;
    while let Some(event) = next_event(&mut rx, &cancel, &progress, &mut announced).await {
        match event {
            RunEvent::Initializing => progress.set_status("Initializing"),
            RunEvent::Status(status) => progress.set_status(&status),
            RunEvent::Progress { completed, .. } => progress.set_completed(completed as u64),
            RunEvent::ChooseDelegate { delegates, reply } => {
                let choice = delegate::choose(&delegates, cli.delegate.as_deref(), &progress);
                let _ = reply.send(choice);
            }
            RunEvent::Finished(status) => match status {
                RunStatus::Succeeded => progress.finish("Finished!"),
                RunStatus::Cancelled => progress.finish("Cancelled"),
                RunStatus::Failed { reason } => progress.finish(&reason),
            },
        }
    }

    let report = runner.await??;

    println!();
    println!(
        "{} patient(s) processed, results in {}",
        report.results.len(),
        report.results_file.display()
    );
    if !report.fetch.written.is_empty() {
        println!("{} report(s) downloaded", report.fetch.written.len());
    }
    if !report.fetch.skipped.is_empty() {
        println!(
            "{} report(s) left on the portal (run cancelled)",
            report.fetch.skipped.len()
        );
    }
    for failed in &report.fetch.failed {
        println!("  could not download {}.pdf: {}", failed.file_name, failed.error);
    }

    Ok(())
}
