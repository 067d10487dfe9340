//! Job storage.
//!
//! The traversal core never touches job state; only the [`Runner`](crate::Runner)
//! and whoever serves job status to users do.

mod memory;

pub use self::memory::MemoryJobStore;
use crate::error::Result;
use crate::job::{Job, JobId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use time::UtcDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

pub type StoreHandle = Arc<dyn JobStore>;

/// Registry of capture jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> Result<()>;

    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// Replace a stored job. Fails with [`NotFound`](crate::error::ErrorKind::NotFound)
    /// if the job was removed in the meantime.
    async fn update(&self, job: Job) -> Result<()>;

    async fn remove(&self, id: JobId) -> Result<Option<Job>>;

    /// Remove finished jobs last updated before `cutoff`. Returns how many were
    /// removed. Jobs still in progress are never evicted.
    async fn evict(&self, cutoff: UtcDateTime) -> Result<usize>;
}

/// Periodically evict finished jobs older than `ttl`.
///
/// The task runs until aborted.
pub fn spawn_evictor(store: StoreHandle, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let cutoff = UtcDateTime::now() - ttl;
            match store.evict(cutoff).await {
                Ok(0) => {},
                Ok(evicted) => tracing::debug!(evicted, "Evicted expired jobs"),
                Err(e) => tracing::warn!(error = %e, "Job eviction failed"),
            }
        }
    })
}
