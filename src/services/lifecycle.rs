//! Job submission and status polling.
//!
//! The backend owns job state. [`JobController`] only observes it: every poll
//! replays the backend's current answer into one of the logical states in
//! [`JobState`], and a polling loop stops for good on the first terminal
//! answer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::models::artifact::ImageUpload;
use crate::models::job::{Job, JobResult, JobState, JobStatus};
use crate::models::results::SubmitResponse;
use crate::services::transport::{ApiClient, TransportError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Submits jobs and watches them until they finish.
#[derive(Debug, Clone)]
pub struct JobController {
    api: Arc<ApiClient>,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
}

impl JobController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Deadline applied to every [`PollingTask`] created by [`watch`](Self::watch).
    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Upload a baseline/current pair and start a backend job.
    pub async fn submit(&self, baseline: ImageUpload, current: ImageUpload) -> Result<Job, JobError> {
        let form = Form::new()
            .part("baseline", upload_part(baseline)?)
            .part("current", upload_part(current)?);

        let response: SubmitResponse = self
            .api
            .post_multipart(&["pipeline"], form)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Job submission failed");
                JobError::Submission(e)
            })?;

        metrics::counter!("analysis_jobs_submitted_total").increment(1);
        tracing::info!(
            job_id = %response.job_id,
            status = %response.status,
            "Analysis job submitted"
        );

        Ok(Job {
            job_id: response.job_id,
            status: response.status,
            message: response.message,
        })
    }

    /// Fetch the current status of a job once.
    ///
    /// A job the backend reports as failed is an `Ok` value here.
    pub async fn poll_once(&self, job_id: &str) -> Result<JobResult, JobError> {
        let mut result: JobResult = self
            .api
            .get_json(&["results", job_id])
            .await
            .map_err(|source| JobError::Poll {
                job_id: job_id.to_string(),
                source,
            })?;

        if result.job_id.is_empty() {
            result.job_id = job_id.to_string();
        }

        metrics::counter!("analysis_polls_total").increment(1);
        tracing::debug!(
            job_id,
            status = %result.status,
            progress = result.progress().unwrap_or(""),
            "Polled job status"
        );

        Ok(result)
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// `on_progress` receives `(progress_text, status)` after every successful
    /// poll, terminal ones included. A transport error ends the loop at once,
    /// without a progress report for that attempt. `cancel` is checked before
    /// every poll and interrupts both an in-flight poll and the wait between
    /// polls.
    pub async fn poll_until_terminal<F>(
        &self,
        job_id: &str,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError>
    where
        F: FnMut(&str, JobStatus),
    {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(JobError::cancelled(job_id));
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::cancelled(job_id)),
                polled = self.poll_once(job_id) => polled.inspect_err(|e| {
                    tracing::error!(job_id, attempt, error = %e, "Polling aborted");
                })?,
            };

            on_progress(&result.progress_text(), result.status);

            match result.state() {
                JobState::Pending => {}
                JobState::Succeeded => {
                    metrics::counter!("analysis_jobs_completed").increment(1);
                    tracing::info!(job_id, attempt, "Analysis job completed");
                    return Ok(result);
                }
                JobState::Failed => {
                    let reason = result.failure_reason();
                    metrics::counter!("analysis_jobs_failed").increment(1);
                    tracing::warn!(job_id, attempt, reason = %reason, "Analysis job failed");
                    return Err(JobError::JobFailed {
                        job_id: job_id.to_string(),
                        reason,
                    });
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::cancelled(job_id)),
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    /// Create a polling task for `job_id` with its own cancellation state.
    pub fn watch(&self, job_id: impl Into<String>) -> PollingTask {
        PollingTask {
            controller: self.clone(),
            job_id: job_id.into(),
            cancel: CancellationToken::new(),
            deadline: self.poll_timeout,
            running: AtomicBool::new(false),
        }
    }

    /// Like [`watch`](Self::watch), but also cancelled when `parent` is.
    pub fn watch_under(&self, job_id: impl Into<String>, parent: &CancellationToken) -> PollingTask {
        PollingTask {
            cancel: parent.child_token(),
            ..self.watch(job_id)
        }
    }

    /// Submit a pair and wait for the job to finish.
    pub async fn submit_and_wait<F>(
        &self,
        baseline: ImageUpload,
        current: ImageUpload,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError>
    where
        F: FnMut(&str, JobStatus),
    {
        let job = self.submit(baseline, current).await?;
        self.watch_under(job.job_id, cancel).run(on_progress).await
    }
}

fn upload_part(upload: ImageUpload) -> Result<Part, JobError> {
    let mime = upload.mime_type();
    let file_name = upload.file_name.clone();
    Part::bytes(upload.bytes)
        .file_name(upload.file_name)
        .mime_str(mime)
        .map_err(|source| JobError::InvalidUpload { file_name, source })
}

/// One caller-owned polling loop for one job.
///
/// Dropping the task without running it issues no requests. Cancelling it,
/// from here or through a [`cancel_handle`](Self::cancel_handle), stops the
/// loop before its next poll. At most one [`run`](Self::run) of a task is
/// active at a time; a concurrent second call fails with
/// [`JobError::AlreadyRunning`].
#[derive(Debug)]
pub struct PollingTask {
    controller: JobController,
    job_id: String,
    cancel: CancellationToken,
    deadline: Option<Duration>,
    running: AtomicBool,
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PollingTask {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn run<F>(&self, on_progress: F) -> Result<JobResult, JobError>
    where
        F: FnMut(&str, JobStatus),
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(JobError::AlreadyRunning {
                job_id: self.job_id.clone(),
            });
        }
        let _running = RunningGuard(&self.running);

        let poll = self
            .controller
            .poll_until_terminal(&self.job_id, on_progress, &self.cancel);

        let Some(limit) = self.deadline else {
            return poll.await;
        };

        match tokio::time::timeout(limit, poll).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.cancel.cancel();
                tracing::warn!(job_id = %self.job_id, timeout_ms = limit.as_millis() as u64, "Polling timed out");
                Err(JobError::TimedOut {
                    job_id: self.job_id.clone(),
                    after: limit,
                })
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job submission failed: {0}")]
    Submission(#[source] TransportError),

    #[error("Upload {file_name} could not be prepared: {source}")]
    InvalidUpload {
        file_name: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Status poll for job {job_id} failed: {source}")]
    Poll {
        job_id: String,
        #[source]
        source: TransportError,
    },

    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Polling for job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("Job {job_id} did not finish within {after:?}")]
    TimedOut { job_id: String, after: Duration },

    #[error("Polling task for job {job_id} is already running")]
    AlreadyRunning { job_id: String },
}

impl JobError {
    fn cancelled(job_id: &str) -> Self {
        JobError::Cancelled {
            job_id: job_id.to_string(),
        }
    }

    /// Backend-supplied reason for a failed job.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            JobError::JobFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Transport error behind a submission or poll failure.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            JobError::Submission(e) | JobError::Poll { source: e, .. } => Some(e),
            _ => None,
        }
    }
}
