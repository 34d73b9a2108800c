use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::results::{AnalysisResults, ImageUrls};

/// Progress label reported while the backend gives no progress text.
pub const DEFAULT_PROGRESS: &str = "Processing...";

/// Reason reported for a failed job whose backend payload carries no error.
pub const DEFAULT_FAILURE_REASON: &str = "Processing failed";

/// Status of an analysis job as reported by the backend.
///
/// Both `complete` and `completed` are accepted and decode into
/// [`JobStatus::Completed`]; downstream code never sees the raw spelling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    #[serde(alias = "complete")]
    #[strum(to_string = "completed", serialize = "complete")]
    Completed,
    Failed,
}

/// Logical state the client tracks for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Queued or processing on the backend.
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn state(self) -> JobState {
        match self {
            JobStatus::Queued | JobStatus::Processing => JobState::Pending,
            JobStatus::Completed => JobState::Succeeded,
            JobStatus::Failed => JobState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.state().is_terminal()
    }
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

/// A job accepted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Snapshot of a job at one polling instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    progress: Option<String>,
    #[serde(default)]
    results: Option<AnalysisResults>,
    #[serde(default)]
    image_urls: Option<ImageUrls>,
    #[serde(default)]
    error: Option<String>,
    /// When this snapshot was read. Client-side only.
    #[serde(skip, default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn state(&self) -> JobState {
        self.status.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Change list, only once the job has succeeded.
    pub fn results(&self) -> Option<&AnalysisResults> {
        match self.state() {
            JobState::Succeeded => self.results.as_ref(),
            _ => None,
        }
    }

    /// Image references, only once the job has succeeded.
    pub fn image_urls(&self) -> Option<&ImageUrls> {
        match self.state() {
            JobState::Succeeded => self.image_urls.as_ref(),
            _ => None,
        }
    }

    /// Backend progress text, only while the job is still pending.
    pub fn progress(&self) -> Option<&str> {
        match self.state() {
            JobState::Pending => self.progress.as_deref(),
            _ => None,
        }
    }

    /// Backend error message, only for failed jobs.
    pub fn error(&self) -> Option<&str> {
        match self.state() {
            JobState::Failed => self.error.as_deref(),
            _ => None,
        }
    }

    /// Reason to surface for a failed job, falling back to a generic message.
    pub fn failure_reason(&self) -> String {
        self.error()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_FAILURE_REASON)
            .to_string()
    }

    /// Text suitable for a progress indicator.
    pub fn progress_text(&self) -> String {
        if let Some(progress) = self.progress().filter(|p| !p.is_empty()) {
            return progress.to_string();
        }
        match self.state() {
            JobState::Pending => DEFAULT_PROGRESS.to_string(),
            JobState::Succeeded => "Complete".to_string(),
            JobState::Failed => "Failed".to_string(),
        }
    }
}
