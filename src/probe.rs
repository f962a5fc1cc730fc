use reqwest::{header, Client};
use tracing::debug;

use crate::error::ProbeError;

/// Determines the total size of the resource without transferring the body.
///
/// Issues a HEAD request first. Some origins omit `Content-Length` on HEAD;
/// for those, fall back to a one-byte ranged GET and read the total from
/// `Content-Range`. A genuinely empty resource probes as 0 and is rejected
/// later by the planner.
pub async fn probe(client: &Client, url: &str) -> Result<u64, ProbeError> {
    let response = client.head(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Status(status));
    }

    // Read the header itself: the HEAD body is empty, so the body-based
    // length accessor is not reliable here.
    let head_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(size) = head_length {
        if size > 0 {
            debug!(size, "probed size via HEAD");
            return Ok(size);
        }
    }

    if let Some(size) = probe_via_range(client, url).await? {
        debug!(size, "probed size via Content-Range");
        return Ok(size);
    }

    // HEAD said zero explicitly; trust it over a missing fallback.
    match head_length {
        Some(0) => Ok(0),
        _ => Err(ProbeError::MissingLength),
    }
}

async fn probe_via_range(client: &Client, url: &str) -> Result<Option<u64>, ProbeError> {
    let response = client
        .get(url)
        .header(header::RANGE, "bytes=0-0")
        .send()
        .await?;

    if response.status() != reqwest::StatusCode::PARTIAL_CONTENT {
        return Ok(None);
    }

    // Content-Range: bytes 0-0/12345
    let total = response
        .headers()
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|v| v.parse::<u64>().ok());

    Ok(total.filter(|&t| t > 0))
}
