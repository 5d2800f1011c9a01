#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for CheckNarc.
//!
//! Provides the patient [`PatientProgress`] bar plus [`init_logger`], which
//! sets up `indicatif-log-bridge` so that `log::info!` and friends are
//! suspended while the bar redraws.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Progress over the patients of one run.
///
/// Starts as a spinner while signing in and turns into a bar once the
/// first patient completes.
pub struct PatientProgress {
    bar: ProgressBar,
    bar_style: ProgressStyle,
    started: bool,
}

impl PatientProgress {
    /// Adds a spinner for a run over `total` patients to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress, total: u64) -> Self {
        let bar = multi.add(ProgressBar::new(total));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let bar_style = ProgressStyle::with_template(
            "  {msg:20} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self {
            bar,
            bar_style,
            started: false,
        }
    }

    /// A bar that draws nothing, for non-interactive use.
    #[must_use]
    pub fn hidden(total: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total);

        Self {
            bar,
            bar_style: ProgressStyle::default_bar(),
            started: false,
        }
    }

    /// Current status text.
    #[must_use]
    pub fn status(&self) -> String {
        self.bar.message()
    }

    /// Replaces the status text.
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_owned());
    }

    /// Moves the bar to `completed` patients.
    pub fn set_completed(&mut self, completed: u64) {
        if !self.started {
            self.bar.set_style(self.bar_style.clone());
            self.started = true;
        }
        self.bar.set_position(completed);
    }

    /// Stops the bar, leaving `message` on screen.
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_owned());
    }

    /// Runs `f` with the bar hidden, for interactive prompts.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set (tests)

    log::set_max_level(level);

    multi
}
