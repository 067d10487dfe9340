//! `slidecap`: capture web slide decks as PDF.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use slidecap_assemble::assemble;
use slidecap_config::Config;
use slidecap_jobs::{JobEvent, JobId, JobOptions, JobStatus, MemoryJobStore, Runner};
use slidecap_render::ChromeLauncher;
use slidecap_traverse::capture::CaptureMode;
use slidecap_traverse::page::Launcher;
use slidecap_traverse::{TraversalOptions, TraversalRequest, detect_framework, run_traversal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slidecap", version, about = "Capture web slide decks as PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// More logging (repeatable). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (toml, yaml or json), layered over the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a whole presentation.
    Convert {
        url: String,
        #[arg(short, long, default_value = "slides.pdf")]
        output: PathBuf,
        #[arg(long, default_value_t = CaptureMode::Vector)]
        mode: CaptureMode,
        /// Steps per engine instance. Overrides the configuration.
        #[arg(long)]
        batch_size: Option<u64>,
    },
    /// Capture a single range of steps and report where it ended.
    Batch {
        url: String,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long)]
        count: u64,
        #[arg(short, long, default_value = "slides.pdf")]
        output: PathBuf,
        #[arg(long, default_value_t = CaptureMode::Vector)]
        mode: CaptureMode,
    },
    /// Report which presentation framework drives a page.
    Detect { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(retryable = e.is_retryable(), "{e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let traversal = config.traversal_options().or_raise(|| ErrorKind::Config)?;
    let launcher =
        ChromeLauncher::locate(config.executable(), config.chrome_options()).or_raise(|| ErrorKind::Browser)?;

    match cli.command {
        Command::Convert { url, output, mode, batch_size } => {
            let mut jobs = config.job_options();
            if let Some(batch_size) = batch_size.filter(|size| *size > 0) {
                jobs.batch_size = batch_size;
            }
            convert(Arc::new(launcher), traversal, jobs, &url, mode, &output).await?;
        },
        Command::Batch { url, start, count, output, mode } => {
            let request = TraversalRequest::batch(url, start, count, mode);
            let result = run_traversal(&launcher, &request, &traversal).await.or_raise(|| ErrorKind::Traversal)?;
            for note in &result.diagnostics {
                tracing::warn!("{note}");
            }
            if !result.artifacts.is_empty() {
                let artifacts = result.artifacts;
                let document = tokio::task::spawn_blocking(move || assemble(&artifacts))
                    .await
                    .or_raise(|| ErrorKind::Assembly)?
                    .or_raise(|| ErrorKind::Assembly)?;
                write(&output, &document).await?;
            }
            println!("ended_at={} finished={}", result.ended_at, result.finished);
        },
        Command::Detect { url } => {
            let detection = detect_framework(&launcher, &url, &traversal).await.or_raise(|| ErrorKind::Traversal)?;
            println!("{detection}");
        },
    }
    Ok(())
}

/// Capture a whole presentation as a background job and write the document
/// to `output`.
async fn convert(
    launcher: Arc<dyn Launcher>,
    traversal: TraversalOptions,
    jobs: JobOptions,
    url: &str,
    mode: CaptureMode,
    output: &Path,
) -> Result<()> {
    let runner = Runner::new(launcher, Arc::new(MemoryJobStore::new()), traversal, jobs);
    let evictor = runner.spawn_evictor();
    let result = capture_job(&runner, url, mode, output).await;
    evictor.abort();
    result
}

async fn capture_job(runner: &Runner, url: &str, mode: CaptureMode, output: &Path) -> Result<()> {
    let events = runner.subscribe();
    let (id, handle) = runner.submit(url, mode).await.or_raise(|| ErrorKind::Traversal)?;
    follow(id, events).await;
    handle.await.or_raise(|| ErrorKind::Job(id.to_string()))?;

    let job = runner
        .store()
        .remove(id)
        .await
        .or_raise(|| ErrorKind::Job(id.to_string()))?
        .ok_or_raise(|| ErrorKind::Job(id.to_string()))?;
    match (job.status, job.document) {
        (JobStatus::Complete, Some(document)) => {
            write(output, &document).await?;
            tracing::info!(
                output = %output.display(),
                pages = job.captures,
                finished = job.finished,
                "Presentation captured"
            );
            Ok(())
        },
        (status, _) => exn::bail!(ErrorKind::Job(status.to_string())),
    }
}

/// Log a job's progress until its final event.
async fn follow(id: JobId, mut events: Receiver<JobEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) if event.id() == id => event,
            Ok(_) => continue,
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "Progress events dropped");
                continue;
            },
            Err(RecvError::Closed) => return,
        };
        match &event {
            JobEvent::Started { framework, .. } => tracing::info!(%framework, "Presentation loaded"),
            JobEvent::Captured { step, .. } => tracing::info!(step, "Captured"),
            JobEvent::Skipped { step, reason, .. } => tracing::warn!(step, %reason, "Step not captured"),
            JobEvent::Note { message, .. } => tracing::warn!("{message}"),
            JobEvent::BatchComplete { ended_at, stop, .. } => tracing::debug!(ended_at, %stop, "Batch complete"),
            JobEvent::Complete { pages, bytes, .. } => tracing::debug!(pages, bytes, "Document assembled"),
            JobEvent::Failed { reason, .. } => tracing::debug!(%reason, "Job failed"),
        }
        if event.is_final() {
            return;
        }
    }
}

async fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes).await.or_raise(|| ErrorKind::Write(path.display().to_string()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Written");
    Ok(())
}
