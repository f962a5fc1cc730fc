use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{Quota, RateLimiter};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{AggregateJobError, DownloadError, FailedRange, RangeRequestError};
use crate::plan;
use crate::probe;
use crate::progress::{self, ProgressCounter};
use crate::store::FileStore;
use crate::worker::{RangeWorker, SharedRateLimiter, WorkerState};

const REPORT_INTERVAL: Duration = Duration::from_millis(200);
const USER_AGENT: &str = concat!("rget/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One download invocation. Immutable once the coordinator starts planning.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub dest: PathBuf,
    pub worker_count: usize,
    /// Bounds a single range transfer, including its body read.
    pub range_timeout: Option<Duration>,
    /// Bounds the whole job; on expiry the cancellation signal is raised
    /// for every worker at once.
    pub job_timeout: Option<Duration>,
    /// Global rate limit in bytes per second, shared across workers.
    pub rate_limit: Option<u32>,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Created,
    Probing,
    Planning,
    Downloading,
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct JobSummary {
    pub total_size: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub ranges: usize,
}

/// Drives a job through Created → Probing → Planning → Downloading →
/// Completed | Failed.
pub struct Coordinator {
    client: Client,
    job: DownloadJob,
    phase: JobPhase,
}

impl Coordinator {
    pub fn new(job: DownloadJob) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Coordinator {
            client,
            job,
            phase: JobPhase::Created,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    fn transition(&mut self, phase: JobPhase) {
        debug!(from = ?self.phase, to = ?phase, "job phase");
        self.phase = phase;
    }

    /// Runs the job to completion. `cancel` is the externally observable
    /// cancellation signal (Ctrl-C, global timeout); raising it aborts
    /// in-flight workers cooperatively between chunk reads.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<JobSummary, DownloadError> {
        let started = Instant::now();

        // Probe and plan fail fast, before the destination file exists and
        // before any worker is spawned.
        self.transition(JobPhase::Probing);
        let total_size = match probe::probe(&self.client, &self.job.url).await {
            Ok(size) => size,
            Err(e) => {
                self.transition(JobPhase::Failed);
                return Err(e.into());
            }
        };

        self.transition(JobPhase::Planning);
        let ranges = match plan::partition(total_size, self.job.worker_count) {
            Ok(ranges) => ranges,
            Err(e) => {
                self.transition(JobPhase::Failed);
                return Err(e.into());
            }
        };
        debug!(total_size, ranges = ranges.len(), "range plan ready");

        let store = FileStore::create(&self.job.dest, total_size)
            .await
            .map_err(DownloadError::File)?;
        debug!(path = %store.path().display(), total_size, "destination preallocated");
        let counter = ProgressCounter::new(total_size);

        let bar = progress::progress_bar(total_size, self.job.quiet);
        let reporter_cancel = CancellationToken::new();
        let reporter = progress::spawn_reporter(
            Arc::clone(&counter),
            bar.clone(),
            reporter_cancel.clone(),
            REPORT_INTERVAL,
        );

        let rate_limiter: Option<SharedRateLimiter> = self
            .job
            .rate_limit
            .and_then(NonZeroU32::new)
            .map(|limit| Arc::new(RateLimiter::direct(Quota::per_second(limit))));

        let watchdog = self.job.job_timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                debug!("global job timeout fired, cancelling all workers");
                cancel.cancel();
            })
        });

        self.transition(JobPhase::Downloading);
        let mut handles = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().copied().enumerate() {
            let worker = RangeWorker::new(
                self.client.clone(),
                self.job.url.clone(),
                index,
                range,
                store.clone(),
                Arc::clone(&counter),
                cancel.clone(),
                self.job.range_timeout,
                rate_limiter.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        // Join barrier: every worker runs to termination, failed or not.
        // One range's failure never cancels its siblings.
        let mut states = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(state) => states.push(state),
                Err(e) => states.push(WorkerState {
                    index,
                    range: ranges[index],
                    bytes_written: 0,
                    error: Some(RangeRequestError::Task(e)),
                }),
            }
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        reporter_cancel.cancel();
        let _ = reporter.await;

        let bytes_written = counter.written();
        let failed: Vec<FailedRange> = states
            .into_iter()
            .filter_map(|state| {
                state.error.map(|error| FailedRange {
                    index: state.index,
                    range: state.range,
                    error,
                })
            })
            .collect();

        if !failed.is_empty() {
            bar.abandon_with_message(format!("failed ({} range(s))", failed.len()));
            self.transition(JobPhase::Failed);
            return Err(AggregateJobError { failed }.into());
        }

        store.finish().await.map_err(DownloadError::File)?;
        debug_assert_eq!(bytes_written, total_size);

        bar.set_position(bytes_written);
        bar.finish_with_message("done");
        self.transition(JobPhase::Completed);
        let elapsed = started.elapsed();
        info!(total_size, ?elapsed, "download complete");

        Ok(JobSummary {
            total_size,
            bytes_written,
            elapsed,
            ranges: ranges.len(),
        })
    }
}
