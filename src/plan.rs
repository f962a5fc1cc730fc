use crate::error::PlanningError;

/// A contiguous, inclusive span of a resource's bytes, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Splits `[0, total_size - 1]` into at most `worker_count` disjoint,
/// contiguous ranges ordered by start. The final range absorbs the division
/// remainder. When the resource is smaller than the worker count the plan is
/// clamped to `total_size` one-byte ranges; a zero-length range is never
/// produced.
pub fn partition(total_size: u64, worker_count: usize) -> Result<Vec<ByteRange>, PlanningError> {
    if worker_count == 0 {
        return Err(PlanningError::InvalidWorkerCount);
    }
    if total_size == 0 {
        return Err(PlanningError::EmptyResource);
    }

    let count = (worker_count as u64).min(total_size);
    let base = total_size / count;

    let mut ranges = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = i * base;
        let end = if i == count - 1 {
            total_size - 1
        } else {
            (i + 1) * base - 1
        };
        ranges.push(ByteRange { start, end });
    }
    Ok(ranges)
}
