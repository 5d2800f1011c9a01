//! Supervisor selection.

use checknarc_cli_utils::PatientProgress;
use checknarc_portal_models::Delegate;
use dialoguer::Select;

/// Finds a delegate by id, or by name ignoring ASCII case.
#[must_use]
pub fn find_delegate<'a>(delegates: &'a [Delegate], wanted: &str) -> Option<&'a Delegate> {
    let wanted = wanted.trim();
    delegates
        .iter()
        .find(|d| d.id == wanted || d.name.eq_ignore_ascii_case(wanted))
}

/// Picks the delegate to search under.
///
/// Uses `preferred` (from `--delegate`) when it matches, and asks the user
/// otherwise. Returns `None` if the user backs out of the prompt, which
/// cancels the run.
pub fn choose(
    delegates: &[Delegate],
    preferred: Option<&str>,
    progress: &PatientProgress,
) -> Option<Delegate> {
    if let Some(wanted) = preferred {
        if let Some(delegate) = find_delegate(delegates, wanted) {
            return Some(delegate.clone());
        }
        log::warn!("No supervisor matches '{wanted}'");
    }

    let labels: Vec<&str> = delegates.iter().map(|d| d.name.as_str()).collect();
    let picked = progress.suspend(|| {
        Select::new()
            .with_prompt("Pick a Supervisor to search under")
            .items(&labels)
            .default(0)
            .interact_opt()
    });

    match picked {
        Ok(index) => index.and_then(|i| delegates.get(i)).cloned(),
        Err(e) => {
            log::error!("Supervisor prompt failed: {e}");
            None
        }
    }
}
