use reqwest::StatusCode;
use thiserror::Error;

use crate::plan::ByteRange;

/// Size probe failed or returned no usable size.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("probe returned status {0}")]
    Status(StatusCode),
    #[error("no usable size indicator in probe response")]
    MissingLength,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanningError {
    #[error("total size is zero or unknown")]
    EmptyResource,
    #[error("worker count must be at least 1")]
    InvalidWorkerCount,
}

/// Positional write failure at a known file offset.
#[derive(Debug, Error)]
#[error("write at offset {offset} failed: {source}")]
pub struct WriteError {
    pub offset: u64,
    #[source]
    pub source: std::io::Error,
}

/// Failure of a single range transfer. Captured in the worker's state,
/// never propagated to sibling workers.
#[derive(Debug, Error)]
pub enum RangeRequestError {
    #[error("range request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server ignored range request: got {0}, expected 206 Partial Content")]
    NotPartialContent(StatusCode),
    #[error("truncated stream: received {written} of {expected} bytes")]
    Truncated { written: u64, expected: u64 },
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("cancelled before range completed")]
    Cancelled,
    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One failed range inside an [`AggregateJobError`].
#[derive(Debug)]
pub struct FailedRange {
    pub index: usize,
    pub range: ByteRange,
    pub error: RangeRequestError,
}

/// Reported by the coordinator after all workers have terminated, one entry
/// per failed range so a caller could re-issue exactly those ranges.
#[derive(Debug)]
pub struct AggregateJobError {
    pub failed: Vec<FailedRange>,
}

impl std::error::Error for AggregateJobError {}

impl std::fmt::Display for AggregateJobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} range(s) failed:", self.failed.len())?;
        for fr in &self.failed {
            write!(
                f,
                " [#{} bytes {}-{}: {}]",
                fr.index, fr.range.start, fr.range.end, fr.error
            )?;
        }
        Ok(())
    }
}

/// Top-level job error surfaced to the library caller.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("size probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("range planning failed: {0}")]
    Planning(#[from] PlanningError),
    #[error("destination file error: {0}")]
    File(#[source] std::io::Error),
    #[error("download failed: {0}")]
    Job(#[from] AggregateJobError),
}
