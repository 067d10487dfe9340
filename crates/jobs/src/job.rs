use derive_more::{Display, FromStr};
use slidecap_traverse::capture::CaptureMode;
use slidecap_traverse::framework::Framework;
use slidecap_traverse::session::StopReason;
use std::sync::Arc;
use time::UtcDateTime;
use uuid::Uuid;

/// Opaque job identifier.
#[derive(Clone, Copy, Debug, Display, FromStr, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);
impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of a job.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum JobStatus {
    #[display("queued")]
    Queued,
    #[display("running")]
    Running,
    #[display("complete")]
    Complete,
    #[display("failed: {_0}")]
    Failed(String),
}
impl JobStatus {
    /// `true` once the job will not change any more.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

/// A capture job and everything known about its progress.
#[derive(Clone, Debug)]
pub struct Job {
    pub id: JobId,
    pub target: String,
    pub mode: CaptureMode,
    pub status: JobStatus,
    pub framework: Option<Framework>,
    /// Absolute step the next batch starts from.
    pub ended_at: u64,
    pub captures: u64,
    /// The deck was traversed to its end (not cut off by the step ceiling).
    pub finished: bool,
    pub stop: Option<StopReason>,
    pub diagnostics: Vec<String>,
    /// The assembled PDF, once complete.
    pub document: Option<Arc<Vec<u8>>>,
    pub created: UtcDateTime,
    pub updated: UtcDateTime,
}
impl Job {
    pub fn new(target: impl Into<String>, mode: CaptureMode) -> Self {
        let now = UtcDateTime::now();
        Self {
            id: JobId::new(),
            target: target.into(),
            mode,
            status: JobStatus::Queued,
            framework: None,
            ended_at: 0,
            captures: 0,
            finished: false,
            stop: None,
            diagnostics: Vec::new(),
            document: None,
            created: now,
            updated: now,
        }
    }

    /// Mark the job as modified now.
    pub fn touch(&mut self) {
        self.updated = UtcDateTime::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ids_round_trip_through_text() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[rstest]
    #[case::queued(JobStatus::Queued, false)]
    #[case::running(JobStatus::Running, false)]
    #[case::complete(JobStatus::Complete, true)]
    #[case::failed(JobStatus::Failed("traversal failed".into()), true)]
    fn done_statuses(#[case] status: JobStatus, #[case] done: bool) {
        assert_eq!(status.is_done(), done);
    }

    #[test]
    fn new_jobs_are_queued() {
        let job = Job::new("https://example.com/", CaptureMode::Vector);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.status.is_done());
        assert_eq!(job.created, job.updated);
    }
}
