use serde::{Deserialize, Serialize};

/// One detected change between the baseline and current image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    pub id: i64,
    /// Bounding box as `[x0, y0, x1, y1]` in current-image pixels.
    pub bbox: [f64; 4],
    pub part: String,
    pub confidence: f64,
}

/// Structured output of a successful analysis job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResults {
    pub num_changes: u32,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
    #[serde(default)]
    pub url: Option<String>,
}

impl AnalysisResults {
    /// Changes at or above `min_confidence`, in backend order.
    pub fn confident_changes(&self, min_confidence: f64) -> impl Iterator<Item = &ChangeRecord> {
        self.changes
            .iter()
            .filter(move |c| c.confidence >= min_confidence)
    }
}

/// Backend-relative references to the annotated images of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrls {
    pub baseline: String,
    pub current: String,
    pub combined: String,
}

/// Response to `POST /pipeline`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: crate::models::job::JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response to `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
