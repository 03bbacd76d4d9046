// src/backend/http.rs

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Instant;

use crate::backend::{status_path, Backend, GENERATE_PATH, HISTORY_PATH};
use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::job::JobInput;
use crate::models::{Accepted, HistoryRecord, StatusResponse};

const SUBMIT_FALLBACK: &str = "Failed to submit job to the server.";
const STATUS_FALLBACK: &str = "Status check failed.";

/// Talks to the generation API gateway over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` around an existing client.
    pub fn new(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    /// Builds a client with the configured request timeout.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Backend for HttpBackend {
    async fn fetch_history(&self) -> Result<Vec<HistoryRecord>> {
        let url = self.config.endpoint(HISTORY_PATH);
        log::debug!("📡 Fetching history: {}", url);

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: format!("HTTP error! status: {}", status.as_u16()),
            });
        }

        let body = resp.text().await?;
        // The gateway encodes an empty result set as `null`.
        let records: Option<Vec<HistoryRecord>> = serde_json::from_str(&body)?;
        Ok(records.unwrap_or_default())
    }

    async fn submit(&self, input: &JobInput) -> Result<Accepted> {
        input.validate()?;

        let url = self.config.endpoint(GENERATE_PATH);
        let request = match input {
            JobInput::Text(text) => self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(text.clone()),
            JobInput::Pdf { file_name, bytes } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str("application/pdf")?;
                self.client.post(&url).multipart(Form::new().part("pdfFile", part))
            }
        };

        log::info!("📡 Submitting {} job to {}", input.kind(), url);
        let start = Instant::now();
        let resp = request.send().await?;
        let status = resp.status();
        log::info!("📥 Submit response status: {} ({}ms)", status, start.elapsed().as_millis());

        if status != StatusCode::ACCEPTED {
            let error_body = resp.text().await.unwrap_or_default();
            let body = if error_body.trim().is_empty() {
                SUBMIT_FALLBACK.to_string()
            } else {
                error_body.trim_end().to_string()
            };
            return Err(ClientError::Api { status: status.as_u16(), body });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusResponse> {
        let url = self.config.endpoint(&status_path(job_id));
        log::debug!("📡 Checking job status: {}", url);

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let error_body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: status_error_message(&error_body),
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pulls `message` out of a JSON error body, falling back to a generic text.
fn status_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| STATUS_FALLBACK.to_string())
}
