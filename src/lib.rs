pub mod error;
pub mod hashing;
pub mod job;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod store;
pub mod utils;
pub mod worker;

pub use error::{
    AggregateJobError, DownloadError, FailedRange, PlanningError, ProbeError, RangeRequestError,
    WriteError,
};
pub use job::{Coordinator, DownloadJob, JobPhase, JobSummary};
pub use plan::{partition, ByteRange};
pub use progress::{ProgressCounter, ProgressSnapshot};
pub use worker::WorkerState;
