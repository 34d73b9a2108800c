use tracing_subscriber::EnvFilter;

/// Install the JSON tracing subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();
}

/// Register descriptions for the metrics this crate emits.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "analysis_jobs_submitted_total",
        "Total analysis jobs submitted to the backend"
    );
    metrics::describe_counter!("analysis_polls_total", "Total job status polls");
    metrics::describe_counter!(
        "analysis_jobs_completed",
        "Jobs observed reaching the completed state"
    );
    metrics::describe_counter!(
        "analysis_jobs_failed",
        "Jobs observed reaching the failed state"
    );
    metrics::describe_histogram!(
        "analysis_image_fetch_seconds",
        "Time to download one annotated image"
    );
}
