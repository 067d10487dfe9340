use crate::error::{ErrorKind, Result};
use crate::job::{Job, JobId, JobStatus};
use crate::store::{StoreHandle, spawn_evictor};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use slidecap_assemble::assemble;
use slidecap_traverse::capture::{Artifact, CaptureMode};
use slidecap_traverse::framework::Framework;
use slidecap_traverse::page::Launcher;
use slidecap_traverse::session::StopReason;
use slidecap_traverse::{TraversalEvent, TraversalOptions, TraversalRequest, traverse};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{Instrument, instrument};

/// Capacity of the progress channel. Slow subscribers miss events rather
/// than holding jobs back.
const EVENT_CAPACITY: usize = 256;

/// How jobs are split up and how long they are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobOptions {
    /// Steps per traversal batch. Each batch runs in a fresh engine.
    pub batch_size: u64,
    /// How long finished jobs are kept.
    pub ttl: Duration,
    /// How often expired jobs are looked for.
    pub evict_every: Duration,
}
impl Default for JobOptions {
    fn default() -> Self {
        Self { batch_size: 25, ttl: Duration::from_secs(3600), evict_every: Duration::from_secs(60) }
    }
}

/// Progress of a job, as broadcast to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    Started { id: JobId, framework: Framework },
    Captured { id: JobId, step: u64 },
    Skipped { id: JobId, step: u64, reason: String },
    Note { id: JobId, message: String },
    BatchComplete { id: JobId, ended_at: u64, stop: StopReason },
    Complete { id: JobId, pages: u64, bytes: u64 },
    Failed { id: JobId, reason: String },
}
impl JobEvent {
    pub fn id(&self) -> JobId {
        match self {
            Self::Started { id, .. }
            | Self::Captured { id, .. }
            | Self::Skipped { id, .. }
            | Self::Note { id, .. }
            | Self::BatchComplete { id, .. }
            | Self::Complete { id, .. }
            | Self::Failed { id, .. } => *id,
        }
    }

    /// `true` for the last event a job emits.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Failed { .. })
    }
}

/// Runs capture jobs in the background.
///
/// Each job traverses its deck in batches of [`JobOptions::batch_size`]
/// steps, each batch in a freshly launched engine, then assembles every
/// captured artifact into one document. Subscribers may come and go at any
/// time; a job always runs to completion.
#[derive(Clone)]
pub struct Runner {
    launcher: Arc<dyn Launcher>,
    store: StoreHandle,
    traversal: Arc<TraversalOptions>,
    options: JobOptions,
    events: broadcast::Sender<JobEvent>,
}

impl Runner {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        store: StoreHandle,
        traversal: TraversalOptions,
        options: JobOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { launcher, store, traversal: Arc::new(traversal), options, events }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Start evicting finished jobs once they are older than
    /// [`JobOptions::ttl`]. The task runs until aborted.
    pub fn spawn_evictor(&self) -> JoinHandle<()> {
        spawn_evictor(Arc::clone(&self.store), self.options.ttl, self.options.evict_every)
    }

    /// Receive progress events for every job submitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Queue a job and start it in the background.
    #[instrument(skip(self))]
    pub async fn submit(&self, target: &str, mode: CaptureMode) -> Result<(JobId, JoinHandle<()>)> {
        let job = Job::new(target, mode);
        let id = job.id;
        self.store.insert(job).await?;
        let runner = self.clone();
        let span = tracing::info_span!("job", %id);
        let handle = tokio::spawn(async move { runner.run(id).await }.instrument(span));
        Ok((id, handle))
    }

    /// Drive job `id` to completion, recording the outcome on the job.
    pub async fn run(&self, id: JobId) {
        let outcome = self.drive(id).await;
        let event = match self.finish(id, outcome).await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Could not record job outcome");
                JobEvent::Failed { id, reason: e.to_string() }
            },
        };
        self.emit(event);
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn job(&self, id: JobId) -> Result<Job> {
        self.store.get(id).await?.ok_or_raise(|| ErrorKind::NotFound(id.to_string()))
    }

    async fn drive(&self, id: JobId) -> Result<Vec<u8>> {
        let mut job = self.job(id).await?;
        job.status = JobStatus::Running;
        job.touch();
        self.store.update(job.clone()).await?;

        let mut artifacts: Vec<Artifact> = Vec::new();
        loop {
            let start = job.ended_at;
            job.stop = None;
            let request = TraversalRequest::batch(&job.target, start, self.options.batch_size, job.mode);
            let mut events = pin!(traverse(&*self.launcher, &request, &self.traversal));
            while let Some(event) = events.next().await {
                match event.or_raise(|| ErrorKind::Traversal)? {
                    TraversalEvent::Started { detection, .. } => {
                        if job.framework.is_none() {
                            self.emit(JobEvent::Started { id, framework: detection.framework });
                        }
                        job.framework = Some(detection.framework);
                    },
                    TraversalEvent::Captured(artifact) => {
                        self.emit(JobEvent::Captured { id, step: artifact.step });
                        artifacts.push(artifact);
                    },
                    TraversalEvent::CaptureSkipped { step, reason } => {
                        job.diagnostics.push(format!("step {step} not captured: {reason}"));
                        self.emit(JobEvent::Skipped { id, step, reason });
                    },
                    TraversalEvent::Note(message) => {
                        job.diagnostics.push(message.clone());
                        self.emit(JobEvent::Note { id, message });
                    },
                    TraversalEvent::Complete(summary) => {
                        job.ended_at = summary.ended_at;
                        job.captures += summary.captures;
                        job.finished = summary.stop.is_finished();
                        job.stop = Some(summary.stop);
                    },
                    TraversalEvent::Replayed(_) | TraversalEvent::Stepped { .. } => {},
                }
            }
            let stop = job.stop.ok_or_raise(|| ErrorKind::Traversal)?;
            job.touch();
            self.store.update(job.clone()).await?;
            self.emit(JobEvent::BatchComplete { id, ended_at: job.ended_at, stop });
            tracing::debug!(start, ended_at = job.ended_at, %stop, "Batch complete");

            if stop.is_terminal() || job.ended_at <= start {
                break;
            }
        }

        if artifacts.is_empty() {
            exn::bail!(ErrorKind::NothingCaptured);
        }
        tokio::task::spawn_blocking(move || assemble(&artifacts))
            .await
            .or_raise(|| ErrorKind::Assembly)?
            .or_raise(|| ErrorKind::Assembly)
    }

    async fn finish(&self, id: JobId, outcome: Result<Vec<u8>>) -> Result<JobEvent> {
        let mut job = self.job(id).await?;
        let event = match outcome {
            Ok(document) => {
                let event = JobEvent::Complete { id, pages: job.captures, bytes: document.len() as u64 };
                job.status = JobStatus::Complete;
                job.document = Some(Arc::new(document));
                tracing::info!(captures = job.captures, finished = job.finished, "Job complete");
                event
            },
            Err(e) => {
                tracing::warn!(error = ?e, "Job failed");
                job.status = JobStatus::Failed(e.to_string());
                JobEvent::Failed { id, reason: e.to_string() }
            },
        };
        job.touch();
        self.store.update(job).await?;
        Ok(event)
    }
}
