// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Processing state of a generation job as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any value the backend sends that this client does not know about.
    Unknown(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Polling continues only while the job is queued or running.
    pub fn is_open(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => JobStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobStatus::from(s.as_str()))
    }
}

/// The backend hands out numeric ids; keep them as strings on this side.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of the 202 response to a generation request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Accepted {
    #[serde(deserialize_with = "string_or_number")]
    pub problem_id: String,
}

/// Body of `GET /api/v1/problems/{id}/status`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StatusResponse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub problem_id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub generated_output: Option<GeneratedOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ExamMeta {
    #[serde(default)]
    pub exam_title: Option<String>,
    #[serde(default)]
    pub open_book: bool,
    #[serde(default)]
    pub question_format_is_latex: bool,
    #[serde(default)]
    pub answer_format_is_latex: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Question {
    #[serde(deserialize_with = "string_or_number")]
    pub question_index: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub question_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub answer_text: String,
}

/// Problems and answers produced for one job. Never mutated after receipt.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GeneratedOutput {
    #[serde(default)]
    pub exam_meta: Option<ExamMeta>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl GeneratedOutput {
    pub fn exam_title(&self) -> Option<&str> {
        self.exam_meta
            .as_ref()
            .and_then(|m| m.exam_title.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn has_questions(&self) -> bool {
        !self.questions.is_empty()
    }
}

/// One row of the admin history table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HistoryRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub exam_title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "processing_status")]
    pub status: String,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error_message: String,
    #[serde(default)]
    pub structure_prompt_tokens: i64,
    #[serde(default)]
    pub structure_candidates_tokens: i64,
    #[serde(default)]
    pub generation_prompt_tokens: i64,
    #[serde(default)]
    pub generation_candidates_tokens: i64,
}
