//! Progress bar display for bundle downloads
//!
//! Bridges the engine's progress tracker to an indicatif bar. The tracker
//! already throttles delivery, so the bar is updated directly from each
//! admitted sample.

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::progress::{ProgressSample, ProgressTracker, ThrottleConfig};

/// Subscribe an indicatif bar to a download identity
///
/// The returned bar belongs to the caller; call `finish_and_clear` (or let
/// the failure message stand) when the download completes, and remove the
/// identity from the tracker afterwards.
pub fn attach_progress_bar(
    tracker: &ProgressTracker,
    identity: &str,
    throttle: ThrottleConfig,
) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let display = bar.clone();
    tracker.attach(
        identity,
        Box::new(move |sample| match sample {
            ProgressSample::Bytes { received, total } => {
                if display.length() != Some(total) {
                    display.set_length(total);
                }
                display.set_position(received);
            }
            ProgressSample::Failed { message } => {
                display.abandon_with_message(format!("download failed: {message}"));
            }
        }),
        throttle,
    );

    bar
}
