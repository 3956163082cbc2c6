//! Background archive jobs
//!
//! - `JobRegistry`: submission, status lookup and listing
//! - `Job` and friends: the job record and its state machine

mod registry;
mod types;

pub use registry::JobRegistry;
pub use types::{Job, JobId, JobResult, JobStatus, JobSummary};
