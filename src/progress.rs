//! Progress bar for download runs.

use std::sync::Arc;
use std::time::Duration;

use festival_fetch::{JobOutcome, OutcomeHook, OutcomeStatus};
use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar over `total` outcomes and the hook that advances it.
/// Returns `None` when `enabled` is false or there is nothing to track.
pub(crate) fn progress_hook(enabled: bool, total: usize) -> Option<(ProgressBar, OutcomeHook)> {
    if !enabled || total == 0 {
        return None;
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let hook_bar = bar.clone();
    let hook: OutcomeHook = Arc::new(move |outcome: &JobOutcome| {
        hook_bar.set_message(progress_message(outcome));
        hook_bar.inc(1);
    });
    Some((bar, hook))
}

fn progress_message(outcome: &JobOutcome) -> String {
    match (&outcome.status, &outcome.failure) {
        (OutcomeStatus::Failed, Some(failure)) => format!("{} failed: {}", outcome.id, failure.kind),
        (status, _) => format!("{} {status}", outcome.id),
    }
}
