use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared byte counter, incremented by every worker write. The only contended
/// mutable value in a job.
#[derive(Debug)]
pub struct ProgressCounter {
    written: AtomicU64,
    total: u64,
}

impl ProgressCounter {
    pub fn new(total: u64) -> Arc<Self> {
        Arc::new(ProgressCounter {
            written: AtomicU64::new(0),
            total,
        })
    }

    pub fn add(&self, bytes: u64) {
        self.written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Point-in-time view of a running job. Transient, recomputed per sample.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub written: u64,
    pub total: u64,
    pub elapsed: Duration,
    /// Bytes per second since the previous sample.
    pub throughput: f64,
}

impl ProgressSnapshot {
    /// `None` when the total is unknown (zero).
    pub fn percent(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.written as f64 / self.total as f64 * 100.0)
    }
}

/// Samples the shared counter and derives instantaneous throughput from the
/// delta to the previous sample.
pub struct ProgressSampler {
    counter: Arc<ProgressCounter>,
    started: Instant,
    last_at: Instant,
    last_written: u64,
}

impl ProgressSampler {
    pub fn new(counter: Arc<ProgressCounter>) -> Self {
        let now = Instant::now();
        ProgressSampler {
            counter,
            started: now,
            last_at: now,
            last_written: 0,
        }
    }

    pub fn sample(&mut self) -> ProgressSnapshot {
        let now = Instant::now();
        let written = self.counter.written();
        let dt = now.duration_since(self.last_at).as_secs_f64();
        // First sample may land before any measurable time has passed.
        let throughput = if dt > 0.0 {
            (written - self.last_written) as f64 / dt
        } else {
            0.0
        };
        self.last_at = now;
        self.last_written = written;
        ProgressSnapshot {
            written,
            total: self.counter.total(),
            elapsed: now.duration_since(self.started),
            throughput,
        }
    }
}

pub fn progress_bar(total: u64, quiet: bool) -> ProgressBar {
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr_with_hz(5))
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb
}

/// Periodic reporting task. Lifetime is tied to the job: the coordinator
/// cancels the token once all workers have terminated, so the loop never
/// outlives the job it reports on.
pub fn spawn_reporter(
    counter: Arc<ProgressCounter>,
    bar: ProgressBar,
    cancel: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    let mut sampler = ProgressSampler::new(counter);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let snap = sampler.sample();
                    bar.set_position(snap.written);
                    let pct = snap
                        .percent()
                        .map(|p| format!("{p:.1}%"))
                        .unwrap_or_else(|| "unknown".to_string());
                    bar.set_message(format!(
                        "{pct} {}/s",
                        HumanBytes(snap.throughput as u64)
                    ));
                }
            }
        }
        // Leave the final position accurate even if the last tick was missed.
        bar.set_position(sampler.sample().written);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_does_not_divide_by_zero() {
        let counter = ProgressCounter::new(100);
        let mut sampler = ProgressSampler::new(Arc::clone(&counter));
        counter.add(10);
        let snap = sampler.sample();
        assert_eq!(snap.written, 10);
        assert!(snap.throughput.is_finite());
    }

    #[test]
    fn percent_is_none_for_unknown_total() {
        let counter = ProgressCounter::new(0);
        let mut sampler = ProgressSampler::new(counter);
        assert_eq!(sampler.sample().percent(), None);
    }

    #[test]
    fn written_is_monotonically_non_decreasing() {
        let counter = ProgressCounter::new(1000);
        let mut sampler = ProgressSampler::new(Arc::clone(&counter));
        let mut last = 0;
        for add in [0, 100, 0, 250, 650] {
            counter.add(add);
            let snap = sampler.sample();
            assert!(snap.written >= last);
            last = snap.written;
        }
        assert_eq!(last, 1000);
        assert_eq!(sampler.sample().percent(), Some(100.0));
    }

    #[test]
    fn throughput_reflects_delta_between_samples() {
        let counter = ProgressCounter::new(1000);
        let mut sampler = ProgressSampler::new(Arc::clone(&counter));
        counter.add(500);
        sampler.sample();
        counter.add(100);
        std::thread::sleep(Duration::from_millis(20));
        let snap = sampler.sample();
        // 100 bytes over >=20ms can never read as 500 bytes over the window.
        assert!(snap.throughput > 0.0);
        assert!(snap.throughput < 100.0 / 0.02 + 1.0);
    }
}
