// src/reveal.rs
//! Answer gate: answers become visible only after a simulated advertisement.

use std::time::Duration;

use tokio::sync::watch;

use crate::job::JobState;

/// Clears the busy flag if the reveal is abandoned mid-wait, so a dropped
/// future never leaves the view stuck on the advertisement.
struct AdGuard<'a> {
    state: &'a watch::Sender<JobState>,
    finished: bool,
}

impl Drop for AdGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_modify(|s| s.is_showing_ad = false);
        }
    }
}

/// Sets the busy flag, waits `delay`, then reveals the answers.
pub async fn reveal_answers(state: &watch::Sender<JobState>, delay: Duration) -> bool {
    let started = state.send_if_modified(|s| {
        if !s.can_reveal() {
            return false;
        }
        s.is_showing_ad = true;
        true
    });
    if !started {
        return false;
    }

    let shown_for = state.borrow().job_result.clone();
    let mut guard = AdGuard { state, finished: false };
    log::debug!("Showing advertisement for {}ms", delay.as_millis());
    tokio::time::sleep(delay).await;

    // Only the result the advertisement was started for may be revealed.
    let revealed = state.send_if_modified(|s| {
        if !s.is_showing_ad || s.job_result != shown_for {
            return false;
        }
        s.is_showing_ad = false;
        s.show_answers = true;
        true
    });
    guard.finished = true;
    revealed
}
