//! Job progress reporting and handles.
//!
//! A job and its observers share one `watch` channel: the worker publishes
//! [`JobSnapshot`]s through [`JobProgress`], and any number of [`JobHandle`]
//! clones read the latest one. Cancellation is a shared flag the job checks
//! between tickers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use super::price_fetch::PriceFetchOutcome;

pub const STAGE_QUEUED: &str = "queued";
pub const STAGE_STARTING: &str = "starting";
pub const STAGE_COMPLETED: &str = "completed";
pub const STAGE_CANCELLED: &str = "cancelled";
pub const STAGE_FAILED: &str = "failed";

/// Progress label for the `index`-th (1-based) of `total` tickers.
pub fn fetching_stage(index: usize, total: usize) -> String {
    format!("fetching {}/{}", index, total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub stage: String,
    pub status: JobStatus,
    pub result: Option<PriceFetchOutcome>,
    pub error: Option<String>,
}

impl JobSnapshot {
    fn queued() -> Self {
        Self {
            stage: STAGE_QUEUED.to_string(),
            status: JobStatus::Queued,
            result: None,
            error: None,
        }
    }
}

/// Creates the connected writer/reader pair for a new job.
pub(crate) fn job_channel() -> (JobProgress, JobHandle) {
    let (tx, rx) = watch::channel(JobSnapshot::queued());
    let cancelled = Arc::new(AtomicBool::new(false));
    let id = Uuid::new_v4();
    (
        JobProgress {
            id,
            tx,
            cancelled: cancelled.clone(),
        },
        JobHandle { id, rx, cancelled },
    )
}

// =============================================================================
// Writer side
// =============================================================================

/// Writer side of a job's progress channel, owned by the running job.
pub struct JobProgress {
    id: Uuid,
    tx: watch::Sender<JobSnapshot>,
    cancelled: Arc<AtomicBool>,
}

impl JobProgress {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_stage(&self, stage: impl Into<String>) {
        let stage = stage.into();
        self.tx.send_modify(|s| s.stage = stage);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_running(&self) {
        self.tx.send_modify(|s| {
            s.status = JobStatus::Running;
            s.stage = STAGE_STARTING.to_string();
        });
    }

    pub(crate) fn mark_completed(&self, outcome: PriceFetchOutcome) {
        self.finish(JobStatus::Completed, STAGE_COMPLETED, Some(outcome), None);
    }

    pub(crate) fn mark_cancelled(&self, outcome: Option<PriceFetchOutcome>) {
        self.finish(JobStatus::Cancelled, STAGE_CANCELLED, outcome, None);
    }

    pub(crate) fn mark_failed(&self, error: impl Into<String>) {
        self.finish(JobStatus::Failed, STAGE_FAILED, None, Some(error.into()));
    }

    fn finish(
        &self,
        status: JobStatus,
        stage: &str,
        result: Option<PriceFetchOutcome>,
        error: Option<String>,
    ) {
        self.tx.send_modify(|s| {
            s.status = status;
            s.stage = stage.to_string();
            s.result = result;
            s.error = error;
        });
    }
}

// =============================================================================
// Reader side
// =============================================================================

/// Handle returned to whoever enqueued a job.
#[derive(Clone)]
pub struct JobHandle {
    id: Uuid,
    rx: watch::Receiver<JobSnapshot>,
    cancelled: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.rx.borrow().clone()
    }

    pub fn stage(&self) -> String {
        self.rx.borrow().stage.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.rx.borrow().status
    }

    /// True once the job reached any terminal state.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        self.status() == JobStatus::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == JobStatus::Cancelled
    }

    pub fn result(&self) -> Option<PriceFetchOutcome> {
        self.rx.borrow().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.rx.borrow().error.clone()
    }

    /// Requests cooperative cancellation. The job stops before its next ticker.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Waits for a terminal state and returns the final snapshot.
    ///
    /// If the job is dropped without finishing, returns the last published one.
    pub async fn wait(&self) -> JobSnapshot {
        let mut rx = self.rx.clone();
        let finished = rx
            .wait_for(|s| s.status.is_terminal())
            .await
            .map(|snapshot| snapshot.clone());
        match finished {
            Ok(snapshot) => snapshot,
            Err(_) => rx.borrow().clone(),
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("stage", &self.stage())
            .finish()
    }
}
