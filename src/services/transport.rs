use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::models::results::HealthResponse;

/// Header that tells the tunnel in front of the backend to skip its
/// interstitial browser-warning page.
pub const TUNNEL_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Thin HTTP client for the analysis backend.
///
/// Every call performs exactly one request. Retries are the caller's business.
/// Endpoints are addressed by path segments; each segment is percent-encoded,
/// so an opaque job id can never change the query, fragment or route.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(TUNNEL_BYPASS_HEADER, HeaderValue::from_static("true"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// URL of the endpoint under the base path made of `segments`.
    ///
    /// Empty, `.` and `..` segments are rejected rather than resolved.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(TransportError::InvalidPath(bad.to_string()));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and turn any non-2xx status into [`TransportError::Request`].
    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, TransportError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(path, error = %e, "Backend request did not complete");
            TransportError::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            // The error body is informational only; it may not even be JSON.
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), "Backend returned an error status");
            return Err(TransportError::Request { status, body });
        }

        Ok(response)
    }

    /// GET the endpoint at `segments` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, TransportError> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.http.get(url.clone()), url.path()).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(TransportError::Decode)
    }

    /// GET the endpoint at `segments` and return the raw body.
    pub async fn get_bytes(&self, segments: &[&str]) -> Result<Vec<u8>, TransportError> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.http.get(url.clone()), url.path()).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// POST a multipart form to the endpoint at `segments` and decode the JSON body.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        form: Form,
    ) -> Result<T, TransportError> {
        let url = self.endpoint(segments)?;
        let response = self
            .send(self.http.post(url.clone()).multipart(form), url.path())
            .await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(TransportError::Decode)
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse, TransportError> {
        self.get_json(&["health"]).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    Request { status: StatusCode, body: String },

    #[error("Unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid path segment: {0:?}")]
    InvalidPath(String),
}

impl TransportError {
    /// HTTP status of a non-2xx response, if that is what failed.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}
