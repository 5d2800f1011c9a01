//! Lifecycle notifications sent to the front end.

use checknarc_portal_models::Delegate;
use tokio::sync::oneshot;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every patient was processed and the results exported.
    Succeeded,
    /// The run was stopped early. Rows completed before the stop were
    /// still exported.
    Cancelled,
    /// The run aborted before exporting anything.
    Failed {
        /// User-facing reason, e.g. `Incorrect Login`.
        reason: String,
    },
}

/// Progress notifications emitted by [`crate::run`].
#[derive(Debug)]
pub enum RunEvent {
    /// The run has started and is signing in.
    Initializing,
    /// A one-line status message.
    Status(String),
    /// A patient finished.
    Progress {
        /// Patients processed so far.
        completed: usize,
        /// Patients in the batch.
        total: usize,
        /// `completed` as a percentage of `total`.
        percent: u8,
    },
    /// The account can search on behalf of other users. The run waits for
    /// a reply; `None` (or dropping the sender) cancels it.
    ChooseDelegate {
        /// Supervisors offered by the portal.
        delegates: Vec<Delegate>,
        /// Where to send the choice.
        reply: oneshot::Sender<Option<Delegate>>,
    },
    /// The run is over. Always the last event.
    Finished(RunStatus),
}

/// Integer percentage of `completed` out of `total`.
#[must_use]
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from(completed.min(total) * 100 / total).unwrap_or(100)
}
