// src/backend/mod.rs

use crate::errors::Result;
use crate::job::JobInput;
use crate::models::{Accepted, HistoryRecord, StatusResponse};

pub mod http;

pub use http::HttpBackend;

pub const HISTORY_PATH: &str = "/api/v1/admin/history";
pub const GENERATE_PATH: &str = "/api/v1/generate";

pub fn status_path(job_id: &str) -> String {
    format!("/api/v1/problems/{}/status", job_id)
}

/// The generation backend as seen by the views.
///
/// The views only ever talk to the backend through this trait, so the pollers
/// can be driven by the real HTTP client or by an in-memory stand-in.
/// Methods return `Send` futures so a poller holding the backend can run on a
/// spawned task.
pub trait Backend: Send + Sync + 'static {
    /// Fetches the most recent generation jobs for the admin view.
    fn fetch_history(&self) -> impl std::future::Future<Output = Result<Vec<HistoryRecord>>> + Send;

    /// Submits a generation job. Success means the backend answered 202 Accepted.
    fn submit(&self, input: &JobInput) -> impl std::future::Future<Output = Result<Accepted>> + Send;

    /// Reads the current status of a previously accepted job.
    fn job_status(&self, job_id: &str) -> impl std::future::Future<Output = Result<StatusResponse>> + Send;
}
