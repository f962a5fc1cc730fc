use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::RateLimiter;
use reqwest::{header, Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RangeRequestError;
use crate::plan::ByteRange;
use crate::progress::ProgressCounter;
use crate::store::FileStore;

pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Outcome of one range transfer. Owned and mutated exclusively by its
/// worker; the coordinator reads it after the worker has terminated.
#[derive(Debug)]
pub struct WorkerState {
    pub index: usize,
    pub range: ByteRange,
    pub bytes_written: u64,
    pub error: Option<RangeRequestError>,
}

impl WorkerState {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches exactly one byte range and streams it into the shared store at
/// the range's offset. A failure is recorded locally and never aborts
/// sibling workers.
pub struct RangeWorker {
    client: Client,
    url: String,
    index: usize,
    range: ByteRange,
    store: FileStore,
    counter: Arc<ProgressCounter>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    rate_limiter: Option<SharedRateLimiter>,
}

impl RangeWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        url: String,
        index: usize,
        range: ByteRange,
        store: FileStore,
        counter: Arc<ProgressCounter>,
        cancel: CancellationToken,
        timeout: Option<Duration>,
        rate_limiter: Option<SharedRateLimiter>,
    ) -> Self {
        RangeWorker {
            client,
            url,
            index,
            range,
            store,
            counter,
            cancel,
            timeout,
            rate_limiter,
        }
    }

    pub async fn run(self) -> WorkerState {
        let mut written = 0;
        let error = match self.fetch(&mut written).await {
            Ok(()) => {
                debug!(index = self.index, written, "range complete");
                None
            }
            Err(e) => {
                debug!(index = self.index, written, error = %e, "range failed");
                Some(e)
            }
        };
        WorkerState {
            index: self.index,
            range: self.range,
            bytes_written: written,
            error,
        }
    }

    async fn fetch(&self, written: &mut u64) -> Result<(), RangeRequestError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(header::RANGE, self.range.header_value());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        // A 200 means the server ignored the Range header and is sending the
        // whole resource; writing that at our offset would corrupt the file.
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(RangeRequestError::NotPartialContent(response.status()));
        }

        let expected = self.range.len();
        let mut stream = response.bytes_stream();

        loop {
            let item = tokio::select! {
                _ = self.cancel.cancelled() => return Err(RangeRequestError::Cancelled),
                item = stream.next() => item,
            };
            let Some(item) = item else { break };
            let chunk = item?;
            if chunk.is_empty() {
                continue;
            }

            if let Some(limiter) = &self.rate_limiter {
                if let Some(n) = NonZeroU32::new(chunk.len() as u32) {
                    let _ = limiter.until_n_ready(n).await;
                }
            }

            // Never write past the end of our region, even if the server
            // over-delivers on a 206.
            let remaining = (expected - *written) as usize;
            if remaining == 0 {
                break;
            }
            let chunk = if chunk.len() > remaining {
                chunk.slice(..remaining)
            } else {
                chunk
            };

            let n = self.store.write_at(self.range.start + *written, chunk).await?;
            *written += n as u64;
            self.counter.add(n as u64);
        }

        if *written != expected {
            return Err(RangeRequestError::Truncated {
                written: *written,
                expected,
            });
        }
        Ok(())
    }
}
