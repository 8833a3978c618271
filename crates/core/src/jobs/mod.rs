//! Background price refresh jobs.

mod price_fetch;
mod progress;
mod queue;

pub use price_fetch::{PriceFetchJob, PriceFetchOutcome};
pub use progress::{
    JobHandle, JobProgress, JobSnapshot, JobStatus, STAGE_CANCELLED, STAGE_COMPLETED,
    STAGE_FAILED, STAGE_QUEUED, STAGE_STARTING,
};
pub use queue::JobQueue;
