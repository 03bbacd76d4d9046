// src/job.rs
//! Generation view: submits one job at a time and mirrors its status by
//! polling the backend at a fixed interval until the job is terminal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::models::{GeneratedOutput, JobStatus, StatusResponse};
use crate::reveal;

pub const EMPTY_INPUT: &str = "Input is empty. Please provide text or a PDF file.";
const JOB_FAILED_FALLBACK: &str = "Job processing failed.";

/// Source material for a generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum JobInput {
    /// Lecture notes or past exam text, sent as the raw request body.
    Text(String),
    /// A PDF document, sent as the `pdfFile` multipart field.
    Pdf { file_name: String, bytes: Vec<u8> },
}

impl JobInput {
    /// Reads a PDF from disk. Only the file name travels with the upload.
    pub async fn pdf_from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        Ok(JobInput::Pdf { file_name, bytes })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobInput::Text(_) => "text",
            JobInput::Pdf { .. } => "pdf",
        }
    }

    /// Empty input of either kind never reaches the network.
    pub fn validate(&self) -> Result<()> {
        let empty = match self {
            JobInput::Text(text) => text.trim().is_empty(),
            JobInput::Pdf { bytes, .. } => bytes.is_empty(),
        };
        if empty {
            return Err(ClientError::Validation(EMPTY_INPUT.to_string()));
        }
        Ok(())
    }
}

/// Local mirror of the job being generated, plus the view flags around it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobState {
    /// Set while a job is open; cleared once polling for it ends.
    pub job_id: Option<String>,
    pub job_status: Option<JobStatus>,
    pub job_result: Option<GeneratedOutput>,
    pub error: Option<String>,
    pub show_answers: bool,
    pub is_showing_ad: bool,
    /// True while the submit request itself is in flight.
    pub is_loading: bool,
}

impl JobState {
    fn reset(&mut self) {
        *self = JobState::default();
    }

    /// Submission is disabled while a request is in flight, a job is open,
    /// or the advertisement for the current result is still running.
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.job_id.is_some() || self.is_showing_ad
    }

    /// The job id to poll, if the job is open and still queued or running.
    pub fn polling_job(&self) -> Option<&str> {
        match (&self.job_id, &self.job_status) {
            (Some(id), Some(status)) if status.is_open() => Some(id),
            _ => None,
        }
    }

    /// The result, once the job completed.
    pub fn completed_result(&self) -> Option<&GeneratedOutput> {
        match self.job_status {
            Some(JobStatus::Completed) => self.job_result.as_ref(),
            _ => None,
        }
    }

    /// Answers can be requested once per completed result that has questions.
    pub fn can_reveal(&self) -> bool {
        !self.show_answers
            && !self.is_showing_ad
            && self.completed_result().is_some_and(GeneratedOutput::has_questions)
    }

    /// Folds one status response into the state. Returns whether anything
    /// observable changed. Responses for a job that is no longer open are
    /// discarded.
    pub fn apply_status(&mut self, job_id: &str, resp: StatusResponse) -> bool {
        if self.job_id.as_deref() != Some(job_id) {
            log::debug!("Discarding stale status for job {}", job_id);
            return false;
        }

        let mut changed = false;
        if self.job_status.as_ref() != Some(&resp.status) {
            log::info!("Job {} is now {}", job_id, resp.status);
            self.job_status = Some(resp.status.clone());
            changed = true;
        }

        match resp.status {
            JobStatus::Completed => {
                self.job_result = resp.generated_output;
                self.job_id = None;
                changed = true;
            }
            JobStatus::Failed => {
                let message = resp
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| JOB_FAILED_FALLBACK.to_string());
                log::warn!("Job {} failed: {}", job_id, ClientError::JobFailure(message.clone()));
                self.error = Some(message);
                self.job_id = None;
                changed = true;
            }
            JobStatus::Unknown(ref other) => {
                log::warn!("Job {} reported unrecognised status '{}'", job_id, other);
                self.error = Some(format!("Job reported an unrecognised status '{}'.", other));
                self.job_id = None;
                changed = true;
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }

        changed
    }

    /// A status check that could not be completed ends the job as failed.
    pub fn apply_poll_error(&mut self, job_id: &str, err: &ClientError) -> bool {
        if self.job_id.as_deref() != Some(job_id) {
            return false;
        }
        log::error!("Status check for job {} failed: {}", job_id, err);
        self.error = Some(err.to_string());
        self.job_status = Some(JobStatus::Failed);
        self.job_id = None;
        true
    }
}

/// The mounted generation view. Dropping it stops the status poller.
pub struct GenerationView<B: Backend> {
    backend: Arc<B>,
    state: Arc<watch::Sender<JobState>>,
    reveal_delay: Duration,
    poller: JoinHandle<()>,
}

impl<B: Backend> GenerationView<B> {
    /// Mounts the view and starts its poller. Must be called inside a tokio runtime.
    pub fn mount(backend: Arc<B>, config: &ClientConfig) -> Self {
        let (tx, _rx) = watch::channel(JobState::default());
        let state = Arc::new(tx);
        let poller = tokio::spawn(poll_jobs(
            Arc::clone(&backend),
            Arc::clone(&state),
            config.job_poll_interval,
        ));

        Self { backend, state, reveal_delay: config.reveal_delay, poller }
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Submits a new job. On acceptance the status becomes `pending`, which
    /// wakes the poller. Any failure is also recorded as the view's error.
    pub async fn submit(&self, input: JobInput) -> Result<String> {
        let claimed = self.state.send_if_modified(|s| {
            if s.is_busy() {
                return false;
            }
            s.reset();
            s.is_loading = true;
            true
        });
        if !claimed {
            return Err(ClientError::Validation("A job is already in progress.".to_string()));
        }

        let outcome = match input.validate() {
            Ok(()) => self.backend.submit(&input).await,
            Err(e) => Err(e),
        };

        self.state.send_modify(|s| {
            s.is_loading = false;
            match &outcome {
                Ok(accepted) => {
                    log::info!("✅ Job {} accepted", accepted.problem_id);
                    s.job_id = Some(accepted.problem_id.clone());
                    s.job_status = Some(JobStatus::Pending);
                }
                Err(e) => {
                    log::error!("❌ Submission failed: {}", e);
                    s.error = Some(e.to_string());
                }
            }
        });

        outcome.map(|accepted| accepted.problem_id)
    }

    /// Shows the advertisement, then the answers. Returns `false` when there
    /// is nothing to reveal or a reveal is already running.
    pub async fn reveal_answers(&self) -> bool {
        reveal::reveal_answers(&self.state, self.reveal_delay).await
    }
}

impl<B: Backend> Drop for GenerationView<B> {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

/// Waits for an open job and polls it every `interval` until the state no
/// longer names it as open. The condition is re-read before every tick.
async fn poll_jobs<B: Backend>(
    backend: Arc<B>,
    state: Arc<watch::Sender<JobState>>,
    interval: Duration,
) {
    let mut rx = state.subscribe();

    loop {
        let job_id = match rx.wait_for(|s| s.polling_job().is_some()).await {
            Ok(s) => s.polling_job().map(str::to_string),
            Err(_) => return,
        };
        let Some(job_id) = job_id else { continue };

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if state.borrow().polling_job() != Some(job_id.as_str()) {
                break;
            }

            let outcome = backend.job_status(&job_id).await;
            state.send_if_modified(|s| match outcome {
                Ok(resp) => s.apply_status(&job_id, resp),
                Err(ref e) => s.apply_poll_error(&job_id, e),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::models::{Accepted, ExamMeta, Question};

    fn status(s: JobStatus) -> StatusResponse {
        StatusResponse { problem_id: None, status: s, generated_output: None, error: None }
    }

    fn sample_output() -> GeneratedOutput {
        GeneratedOutput {
            exam_meta: Some(ExamMeta { exam_title: Some("Thermodynamics".to_string()), ..Default::default() }),
            questions: vec![Question {
                question_index: "1".to_string(),
                topic: Some("Entropy".to_string()),
                keywords: Vec::new(),
                difficulty: None,
                question_text: "Define $S$.".to_string(),
                answer_text: "$S = k \\ln W$".to_string(),
            }],
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::default()
    }

    fn accepted(id: &str) -> Result<Accepted> {
        Ok(Accepted { problem_id: id.to_string() })
    }

    /// Lets spawned tasks run up to their next await point.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn tick(d: Duration) {
        tokio::time::advance(d).await;
        settle().await;
    }

    #[test]
    fn open_job_is_polled_only_while_pending_or_processing() {
        let mut state = JobState { job_id: Some("1".into()), ..Default::default() };
        assert_eq!(state.polling_job(), None);

        state.job_status = Some(JobStatus::Processing);
        assert_eq!(state.polling_job(), Some("1"));

        state.job_status = Some(JobStatus::Unknown("archived".into()));
        assert_eq!(state.polling_job(), None);
    }

    #[test]
    fn identical_status_is_not_a_change() {
        let mut state = JobState {
            job_id: Some("1".into()),
            job_status: Some(JobStatus::Processing),
            ..Default::default()
        };
        assert!(!state.apply_status("1", status(JobStatus::Processing)));
        assert!(state.apply_status("1", status(JobStatus::Failed)));
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut state = JobState {
            job_id: Some("2".into()),
            job_status: Some(JobStatus::Pending),
            ..Default::default()
        };
        assert!(!state.apply_status("1", status(JobStatus::Completed)));
        assert_eq!(state.job_id.as_deref(), Some("2"));
        assert!(!state.apply_poll_error("1", &ClientError::JobFailure("late".into())));
    }

    #[test]
    fn failed_without_message_uses_fallback() {
        let mut state = JobState {
            job_id: Some("1".into()),
            job_status: Some(JobStatus::Processing),
            ..Default::default()
        };
        state.apply_status("1", StatusResponse { error: Some(String::new()), ..status(JobStatus::Failed) });
        assert_eq!(state.error.as_deref(), Some(JOB_FAILED_FALLBACK));
        assert_eq!(state.job_id, None);
    }

    #[test]
    fn whitespace_text_is_empty_input() {
        assert!(JobInput::Text("  \n".into()).validate().is_err());
        assert!(JobInput::Pdf { file_name: "a.pdf".into(), bytes: Vec::new() }.validate().is_err());
        assert!(JobInput::Text("Fourier series".into()).validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_fails_before_network() {
        let backend = Arc::new(ScriptedBackend::default());
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        let err = view.submit(JobInput::Text(String::new())).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(backend.submit_calls(), 0);
        let snapshot = view.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some(EMPTY_INPUT));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_job_becomes_pending_and_is_polled() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("abc"));
        backend.push_status(Ok(status(JobStatus::Processing)));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        let id = view.submit(JobInput::Text("Maxwell equations".into())).await.unwrap();
        settle().await;

        assert_eq!(id, "abc");
        let snapshot = view.snapshot();
        assert_eq!(snapshot.job_id.as_deref(), Some("abc"));
        assert_eq!(snapshot.job_status, Some(JobStatus::Pending));
        assert_eq!(backend.status_calls(), 0);

        tick(Duration::from_millis(3_000)).await;
        assert_eq!(backend.status_calls(), 1);
        assert_eq!(view.snapshot().job_status, Some(JobStatus::Processing));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_job_stops_polling() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("7"));
        backend.push_status(Ok(StatusResponse {
            generated_output: Some(sample_output()),
            ..status(JobStatus::Completed)
        }));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("Entropy".into())).await.unwrap();
        settle().await;
        tick(Duration::from_millis(3_000)).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.job_id, None);
        assert_eq!(snapshot.job_status, Some(JobStatus::Completed));
        assert_eq!(snapshot.completed_result(), Some(&sample_output()));

        tick(Duration::from_millis(3_000)).await;
        tick(Duration::from_millis(3_000)).await;
        assert_eq!(backend.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_surfaces_backend_error() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("9"));
        backend.push_status(Ok(StatusResponse { error: Some("x".into()), ..status(JobStatus::Failed) }));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("Graph theory".into())).await.unwrap();
        settle().await;
        tick(Duration::from_millis(3_000)).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some("x"));
        assert_eq!(snapshot.job_id, None);

        tick(Duration::from_millis(6_000)).await;
        assert_eq!(backend.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_forces_failed() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("5"));
        backend.push_status(Err(ClientError::Api { status: 404, body: "Status check failed.".into() }));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("Optics".into())).await.unwrap();
        settle().await;
        tick(Duration::from_millis(3_000)).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.job_status, Some(JobStatus::Failed));
        assert_eq!(snapshot.error.as_deref(), Some("Status check failed."));
        assert_eq!(snapshot.job_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_status_does_not_notify_observers() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("3"));
        backend.push_status(Ok(status(JobStatus::Processing)));
        backend.push_status(Ok(status(JobStatus::Processing)));
        let view = GenerationView::mount(Arc::clone(&backend), &config());
        let mut rx = view.subscribe();

        view.submit(JobInput::Text("Topology".into())).await.unwrap();
        settle().await;
        tick(Duration::from_millis(3_000)).await;
        rx.borrow_and_update();

        tick(Duration::from_millis(3_000)).await;
        assert_eq!(backend.status_calls(), 2);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_view_stops_polling() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("4"));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("Set theory".into())).await.unwrap();
        settle().await;
        drop(view);

        tick(Duration::from_millis(30_000)).await;
        assert_eq!(backend.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_is_refused_while_a_job_is_open() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("1"));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("first".into())).await.unwrap();
        let err = view.submit(JobInput::Text("second".into())).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(backend.submit_calls(), 1);
        assert_eq!(view.snapshot().job_id.as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_submission_records_body_as_error() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(Err(ClientError::Api { status: 400, body: "Invalid file in form data".into() }));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        let input = JobInput::Pdf { file_name: "notes.pdf".into(), bytes: b"%PDF-1.7".to_vec() };
        assert!(view.submit(input).await.is_err());

        let snapshot = view.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some("Invalid file in form data"));
        assert!(!snapshot.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognised_status_ends_tracking() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("1"));
        backend.push_status(Ok(status(JobStatus::Unknown("archived".into()))));
        backend.push_submission(accepted("2"));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("Number theory".into())).await.unwrap();
        settle().await;
        tick(Duration::from_millis(3_000)).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.job_id, None);
        assert_eq!(snapshot.job_status, Some(JobStatus::Unknown("archived".into())));
        assert!(snapshot.error.as_deref().unwrap().contains("archived"));
        assert!(!snapshot.is_busy());

        let id = view.submit(JobInput::Text("Number theory, again".into())).await.unwrap();
        assert_eq!(id, "2");
        assert_eq!(backend.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_is_refused_while_the_advertisement_runs() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_submission(accepted("1"));
        backend.push_status(Ok(StatusResponse {
            generated_output: Some(sample_output()),
            ..status(JobStatus::Completed)
        }));
        backend.push_submission(accepted("2"));
        let view = GenerationView::mount(Arc::clone(&backend), &config());

        view.submit(JobInput::Text("Entropy".into())).await.unwrap();
        settle().await;
        tick(Duration::from_millis(3_000)).await;
        assert!(view.snapshot().can_reveal());

        let (revealed, second) = tokio::join!(view.reveal_answers(), async {
            tick(Duration::from_millis(1_000)).await;
            view.submit(JobInput::Text("Enthalpy".into())).await
        });

        assert!(revealed);
        assert!(matches!(second, Err(ClientError::Validation(_))));
        assert_eq!(backend.submit_calls(), 1);

        let snapshot = view.snapshot();
        assert!(snapshot.show_answers);
        assert!(!snapshot.is_showing_ad);
        assert_eq!(snapshot.completed_result(), Some(&sample_output()));
        assert!(!snapshot.is_busy());
    }
}
