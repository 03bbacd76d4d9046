// src/history.rs
//! Admin history view: refreshes the job table on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use num_format::{Locale, ToFormattedString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backend::Backend;
use crate::errors::ClientError;
use crate::models::HistoryRecord;

const ERROR_PREVIEW_CHARS: usize = 50;
const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
    pub history: Vec<HistoryRecord>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Number of fetches that have finished, successfully or not.
    pub refreshes: u64,
}

/// The mounted history view. Dropping it cancels the refresh timer.
pub struct HistoryView {
    state: Arc<watch::Sender<HistoryState>>,
    poller: JoinHandle<()>,
}

impl HistoryView {
    /// Fetches immediately, then every `interval` until dropped.
    pub fn mount<B: Backend>(backend: Arc<B>, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(HistoryState { is_loading: true, ..Default::default() });
        let state = Arc::new(tx);
        let poller = tokio::spawn(poll_history(backend, Arc::clone(&state), interval));
        Self { state, poller }
    }

    pub fn subscribe(&self) -> watch::Receiver<HistoryState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> HistoryState {
        self.state.borrow().clone()
    }
}

impl Drop for HistoryView {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

async fn poll_history<B: Backend>(
    backend: Arc<B>,
    state: Arc<watch::Sender<HistoryState>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        refresh(backend.as_ref(), &state, interval).await;
    }
}

/// Runs one fetch, giving up after `limit` so a slow backend cannot push the
/// next scheduled refresh back. A failure keeps the rows from the last good fetch.
pub async fn refresh<B: Backend>(backend: &B, state: &watch::Sender<HistoryState>, limit: Duration) {
    state.send_if_modified(|s| !std::mem::replace(&mut s.is_loading, true));

    let outcome = match tokio::time::timeout(limit, backend.fetch_history()).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ClientError::Timeout(limit.as_millis())),
    };

    state.send_modify(|s| {
        s.is_loading = false;
        s.refreshes += 1;
        match outcome {
            Ok(rows) => {
                log::debug!("History refreshed: {} rows", rows.len());
                s.history = rows;
                s.error = None;
            }
            Err(e) => {
                log::warn!("History refresh failed: {}", e);
                s.error = Some(e.to_string());
            }
        }
    });
}

/// CSS class for a status badge; unknown statuses get no class.
pub fn status_class(status: &str) -> &'static str {
    match status {
        "completed" => "status-completed",
        "failed" => "status-failed",
        "processing" => "status-processing",
        "pending" => "status-pending",
        _ => "",
    }
}

pub fn display_title(record: &HistoryRecord) -> &str {
    record
        .exam_title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
}

/// First 50 characters of the error message, with `...` when cut.
pub fn error_preview(message: &str) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(ERROR_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub fn format_tokens(total: i64) -> String {
    total.to_formatted_string(&Locale::en)
}

pub fn format_created_at(record: &HistoryRecord) -> String {
    record
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Renders the rows as a plain-text table for the terminal.
pub fn render_table(records: &[HistoryRecord]) -> String {
    let header = ["ID", "Exam title", "Created at", "Status", "Total tokens", "Error"];
    let rows: Vec<[String; 6]> = records
        .iter()
        .map(|r| {
            [
                r.id.clone(),
                display_title(r).to_string(),
                format_created_at(r),
                r.status.clone(),
                format_tokens(r.total_tokens),
                error_preview(&r.error_message),
            ]
        })
        .collect();

    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header.map(str::to_string), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, w)| format!("{}{}", cell, " ".repeat(w - cell.chars().count())))
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}
