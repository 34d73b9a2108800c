use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::services::{
    lifecycle::JobController,
    retrieval::ImageRetriever,
    transport::{ApiClient, TransportError},
};

/// Shared client handle passed to every caller.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub api: Arc<ApiClient>,
    pub jobs: JobController,
    pub images: ImageRetriever,
}

impl ClientState {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let api = ApiClient::from_config(config)?;
        Ok(Self::from_parts(
            api,
            config.poll_interval(),
            config.poll_timeout(),
        ))
    }

    pub fn from_parts(api: ApiClient, poll_interval: Duration, poll_timeout: Option<Duration>) -> Self {
        let api = Arc::new(api);
        let jobs = JobController::new(api.clone())
            .with_poll_interval(poll_interval)
            .with_poll_timeout(poll_timeout);
        let images = ImageRetriever::new(api.clone(), jobs.clone());
        Self { api, jobs, images }
    }
}
