use super::JobStore;
use crate::error::{ErrorKind, Result};
use crate::job::{Job, JobId};
use async_trait::async_trait;
use std::collections::HashMap;
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-process job store.
///
/// Jobs live in a `HashMap` behind a [`RwLock`], so all trait methods can
/// operate on `&self` without external synchronisation. Nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<()> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let Some(slot) = jobs.get_mut(&job.id) else {
            exn::bail!(ErrorKind::NotFound(job.id.to_string()));
        };
        *slot = job;
        Ok(())
    }

    async fn remove(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.jobs.write().await.remove(&id))
    }

    async fn evict(&self, cutoff: UtcDateTime) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.status.is_done() || job.updated >= cutoff);
        Ok(before - jobs.len())
    }
}
