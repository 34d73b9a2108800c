//! TrackShift CLI
//!
//! Command-line front end for the analysis client: submit an image pair,
//! follow the job, and save the annotated images it produces.

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use trackshift_client::{
    app_state::ClientState,
    config::ClientConfig,
    models::{
        artifact::{ImageKind, ImageUpload, RetrievedImage},
        job::{JobResult, JobStatus},
    },
    services::preview,
    telemetry,
};

#[derive(Parser)]
#[command(name = "trackshift")]
#[command(about = "Submit image pairs for change analysis", version)]
struct Cli {
    /// Backend origin (overrides API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Delay between status polls in milliseconds (overrides POLL_INTERVAL_MS)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is reachable
    Health,

    /// Submit a baseline/current pair and print the job id
    Submit { baseline: PathBuf, current: PathBuf },

    /// Print the current status of a job
    Status { job_id: String },

    /// Poll a job until it finishes
    Wait { job_id: String },

    /// Download one image of a finished job
    Fetch {
        job_id: String,

        /// baseline, current or combined
        #[arg(default_value = "combined")]
        kind: ImageKind,

        /// Directory to write the image into
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Submit, wait, and download the before/after images
    Analyze {
        baseline: PathBuf,
        current: PathBuf,

        /// Directory to write the images into
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Print a data URL preview of a local image
    Preview { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    telemetry::init_tracing("warn");
    telemetry::describe_metrics();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll_interval_ms = interval_ms;
    }

    let state = ClientState::new(&config)?;

    // Ctrl-C stops any polling loop started below.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                shutdown.cancel();
            }
        });
    }

    match cli.command {
        Commands::Health => {
            let health = state.api.health().await?;
            println!("{}", health.status);
            if !health.is_healthy() {
                return Err(format!("backend reports status {}", health.status).into());
            }
        }
        Commands::Submit { baseline, current } => {
            let job = state
                .jobs
                .submit(
                    ImageUpload::from_path(&baseline).await?,
                    ImageUpload::from_path(&current).await?,
                )
                .await?;
            println!("{}", job.job_id);
        }
        Commands::Status { job_id } => {
            let result = state.jobs.poll_once(&job_id).await?;
            print_result(&result);
        }
        Commands::Wait { job_id } => {
            let result = state
                .jobs
                .watch_under(job_id, &shutdown)
                .run(print_progress)
                .await?;
            print_result(&result);
        }
        Commands::Fetch { job_id, kind, out } => {
            let image = state.images.fetch_image(&job_id, kind).await?;
            save(&image, &out).await?;
        }
        Commands::Analyze {
            baseline,
            current,
            out,
        } => {
            let result = state
                .jobs
                .submit_and_wait(
                    ImageUpload::from_path(&baseline).await?,
                    ImageUpload::from_path(&current).await?,
                    print_progress,
                    &shutdown,
                )
                .await?;
            print_result(&result);

            let images = state.images.fetch_all_images(&result.job_id).await?;
            save(&images.before_image_annotated, &out).await?;
            save(&images.after_image_annotated, &out).await?;
        }
        Commands::Preview { path } => {
            let bytes = tokio::fs::read(&path).await?;
            println!("{}", preview::preview_data_url(&bytes)?);
        }
    }

    Ok(())
}

fn print_progress(progress: &str, status: JobStatus) {
    eprintln!("[{}] {}", status, progress);
}

fn print_result(result: &JobResult) {
    println!("job:    {}", result.job_id);
    println!("status: {}", result.status);
    println!("as of:  {}", result.observed_at.to_rfc3339());
    if let Some(progress) = result.progress() {
        println!("progress: {}", progress);
    }
    if let Some(error) = result.error() {
        println!("error:  {}", error);
    }
    if let Some(results) = result.results() {
        println!("changes: {}", results.num_changes);
        for change in &results.changes {
            println!(
                "  #{} {} ({:.2}) bbox={:?}",
                change.id, change.part, change.confidence, change.bbox
            );
        }
    }
}

async fn save(image: &RetrievedImage, dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(image.file_name());
    tokio::fs::write(&path, image.bytes()).await?;
    println!("saved {}", path.display());
    Ok(())
}
