use std::sync::Arc;
use std::time::Instant;

use crate::models::artifact::{ImageKind, ImageSet, RetrievedImage};
use crate::models::job::{JobState, JobStatus};
use crate::services::lifecycle::{JobController, JobError};
use crate::services::transport::{ApiClient, TransportError};

/// Fetches the annotated images of finished jobs.
#[derive(Debug, Clone)]
pub struct ImageRetriever {
    api: Arc<ApiClient>,
    jobs: JobController,
}

impl ImageRetriever {
    pub fn new(api: Arc<ApiClient>, jobs: JobController) -> Self {
        Self { api, jobs }
    }

    /// Download one image of a job.
    pub async fn fetch_image(
        &self,
        job_id: &str,
        kind: ImageKind,
    ) -> Result<RetrievedImage, RetrievalError> {
        let kind_segment = kind.to_string();
        let start = Instant::now();

        let bytes = self
            .api
            .get_bytes(&["images", job_id, &kind_segment])
            .await
            .map_err(|source| {
                tracing::error!(job_id, kind = %kind, error = %source, "Image fetch failed");
                RetrievalError::ImageFetch {
                    job_id: job_id.to_string(),
                    kind,
                    source,
                }
            })?;

        metrics::histogram!("analysis_image_fetch_seconds", "kind" => kind.to_string())
            .record(start.elapsed().as_secs_f64());
        tracing::debug!(job_id, kind = %kind, size = bytes.len(), "Fetched image");

        Ok(RetrievedImage::new(job_id, kind, bytes))
    }

    /// Download the before/after images of a finished job.
    ///
    /// Re-reads the job status first and refuses, without touching the image
    /// endpoints, unless the job has succeeded. Both images are fetched
    /// concurrently; if either fails the whole call fails.
    pub async fn fetch_all_images(&self, job_id: &str) -> Result<ImageSet, RetrievalError> {
        let snapshot = self.jobs.poll_once(job_id).await?;

        if snapshot.state() != JobState::Succeeded {
            tracing::warn!(job_id, status = %snapshot.status, "Images requested before job completed");
            return Err(RetrievalError::NotReady {
                job_id: job_id.to_string(),
                status: snapshot.status,
            });
        }

        let (baseline, current) = tokio::try_join!(
            self.fetch_image(job_id, ImageKind::Baseline),
            self.fetch_image(job_id, ImageKind::Current),
        )?;

        Ok(ImageSet::from_pair(baseline, current))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Fetching {kind} image for job {job_id} failed: {source}")]
    ImageFetch {
        job_id: String,
        kind: ImageKind,
        #[source]
        source: TransportError,
    },

    #[error("Job {job_id} is not ready (status: {status})")]
    NotReady { job_id: String, status: JobStatus },

    #[error(transparent)]
    Status(#[from] JobError),
}
