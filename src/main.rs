use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::HumanBytes;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rget::job::{Coordinator, DownloadJob};
use rget::{hashing, utils, DownloadError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource URL to download
    url: String,

    /// Destination file path (defaults to a name derived from the URL)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Number of parallel range workers (defaults to number of logical CPUs)
    #[arg(short = 'n', long = "workers")]
    workers: Option<usize>,

    /// Per-range request timeout in seconds
    #[arg(long = "range-timeout")]
    range_timeout: Option<u64>,

    /// Global job timeout in seconds; on expiry all workers are cancelled
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Global rate limit in bytes per second (e.g., 1048576 for 1MB/s)
    #[arg(short = 'r', long = "rate-limit")]
    rate_limit: Option<u32>,

    /// Expected SHA-256 of the downloaded file, hex-encoded
    #[arg(long = "sha256")]
    sha256: Option<String>,

    /// Suppress the progress bar
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let dest = match &args.output {
        Some(path) => path.clone(),
        None => {
            let filename = utils::filename_from_url(&args.url)?;
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            utils::unique_filepath(&cwd, &filename)
        }
    };

    let job = DownloadJob {
        url: args.url.clone(),
        dest: dest.clone(),
        worker_count: args.workers.unwrap_or_else(num_cpus::get),
        range_timeout: args.range_timeout.map(Duration::from_secs),
        job_timeout: args.timeout.map(Duration::from_secs),
        rate_limit: args.rate_limit,
        quiet: args.quiet,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();
        let ctrl_c_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, stopping workers...");
                ctrl_c_cancel.cancel();
            }
        });

        let mut coordinator = Coordinator::new(job);
        match coordinator.run(cancel).await {
            Ok(summary) => {
                if let Some(expected) = &args.sha256 {
                    let computed = hashing::file_sha256(&dest).await?;
                    if !expected.eq_ignore_ascii_case(&computed) {
                        bail!("hash mismatch: expected {}, got {}", expected, computed);
                    }
                    eprintln!("verified SHA256 {}", computed);
                }
                eprintln!(
                    "downloaded {} ({} range(s)) to {} in {:.1}s",
                    HumanBytes(summary.bytes_written),
                    summary.ranges,
                    dest.display(),
                    summary.elapsed.as_secs_f64()
                );
                Ok(())
            }
            Err(DownloadError::Job(e)) => {
                bail!("partial failure: {}", e)
            }
            Err(e) => Err(e.into()),
        }
    })
}
