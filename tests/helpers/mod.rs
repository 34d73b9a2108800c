//! In-process mock of the analysis backend
//!
//! Serves the four backend endpoints from a scripted state so tests can
//! drive the client through exact status sequences and count requests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use trackshift_client::app_state::ClientState;
use trackshift_client::services::transport::{ApiClient, TUNNEL_BYPASS_HEADER};

/// One scripted answer to `GET /results/{job_id}`.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Json(Value),
    Error(StatusCode, &'static str),
    /// Never answer within the client's request timeout.
    Hang,
}

#[derive(Default)]
pub struct MockState {
    pub job_id: String,
    status_script: Mutex<VecDeque<StatusReply>>,
    last_status: Mutex<Option<StatusReply>>,
    images: Mutex<HashMap<String, Vec<u8>>>,
    failing_images: Mutex<HashSet<String>>,
    submit_error: Mutex<Option<StatusCode>>,
    pub submitted_parts: Mutex<Vec<(String, Vec<u8>)>>,
    pub polled_ids: Mutex<Vec<String>>,
    pub fetched_images: Mutex<Vec<String>>,
    pub image_job_ids: Mutex<Vec<String>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
    pub requests_without_bypass: AtomicUsize,
}

impl MockState {
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn requests_without_bypass(&self) -> usize {
        self.requests_without_bypass.load(Ordering::SeqCst)
    }

    fn note_headers(&self, headers: &HeaderMap) {
        let bypassed = headers
            .get(TUNNEL_BYPASS_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "true");
        if !bypassed {
            self.requests_without_bypass.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockBackend {
    pub async fn start(job_id: &str) -> Self {
        let state = Arc::new(MockState {
            job_id: job_id.to_string(),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/pipeline", post(submit))
            .route("/results/{job_id}", get(results))
            .route("/images/{job_id}/{kind}", get(image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("No local address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend crashed");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    /// Queue status replies. The last one keeps being served once the script runs out.
    pub fn script_statuses(&self, replies: Vec<StatusReply>) {
        self.state.status_script.lock().unwrap().extend(replies);
    }

    pub fn serve_image(&self, kind: &str, bytes: Vec<u8>) {
        self.state
            .images
            .lock()
            .unwrap()
            .insert(kind.to_string(), bytes);
    }

    pub fn fail_image(&self, kind: &str) {
        self.state
            .failing_images
            .lock()
            .unwrap()
            .insert(kind.to_string());
    }

    pub fn reject_submissions(&self, status: StatusCode) {
        *self.state.submit_error.lock().unwrap() = Some(status);
    }

    /// Client state pointing at this backend with test-sized timings.
    pub fn client(&self) -> ClientState {
        let api = ApiClient::new(&self.base_url, Duration::from_millis(300))
            .expect("Failed to build API client");
        ClientState::from_parts(api, Duration::from_millis(10), None)
    }
}

async fn health(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Json<Value> {
    state.note_headers(&headers);
    state.health_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "healthy" }))
}

async fn submit(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.note_headers(&headers);
    state.submit_calls.fetch_add(1, Ordering::SeqCst);

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.submitted_parts.lock().unwrap().push((name, data));
    }

    if let Some(status) = *state.submit_error.lock().unwrap() {
        return (status, "pipeline unavailable").into_response();
    }

    Json(json!({
        "job_id": state.job_id,
        "status": "queued",
        "message": "Pipeline started"
    }))
    .into_response()
}

async fn results(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Response {
    state.note_headers(&headers);
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    state.polled_ids.lock().unwrap().push(job_id);

    let reply = {
        let next = state.status_script.lock().unwrap().pop_front();
        let mut last = state.last_status.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone()
    };

    match reply {
        Some(StatusReply::Json(body)) => Json(body).into_response(),
        Some(StatusReply::Error(status, body)) => (status, body).into_response(),
        Some(StatusReply::Hang) => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        None => (StatusCode::NOT_FOUND, "Job not found").into_response(),
    }
}

async fn image(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path((job_id, kind)): Path<(String, String)>,
) -> Response {
    state.note_headers(&headers);
    state.image_calls.fetch_add(1, Ordering::SeqCst);
    state.image_job_ids.lock().unwrap().push(job_id);
    state.fetched_images.lock().unwrap().push(kind.clone());

    if state.failing_images.lock().unwrap().contains(&kind) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "render failed").into_response();
    }

    match state.images.lock().unwrap().get(&kind) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "Image not found").into_response(),
    }
}
