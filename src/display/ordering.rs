//! Deterministic row ordering
//!
//! Rows sort by job first, then by sub-stream. Jobs registered with the display
//! keep their registration order; unregistered jobs follow, alphabetically.
//! Sub-streams follow [`STREAM_PRIORITY`] by prefix, unknown names last and
//! alphabetical.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::row::RowKey;

/// Preferred order of sub-streams within one job
pub const STREAM_PRIORITY: [&str; 5] = ["waiting", "audio", "audio+video", "video", "converting"];

/// Sub-stream shown while the external tool has not started transferring
pub const WAITING_STREAM: &str = "waiting";

/// Sub-stream shown while the external tool converts or tags the file
pub const CONVERTING_STREAM: &str = "converting";

/// Sort rank of a sub-stream name
pub fn stream_rank(stream: &str) -> (u8, usize) {
    STREAM_PRIORITY
        .iter()
        .position(|name| stream.starts_with(name))
        .map(|index| (0, index))
        .unwrap_or((1, 0))
}

fn compare_jobs(a: &str, b: &str, registration: &HashMap<String, usize>) -> Ordering {
    match (registration.get(a), registration.get(b)) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn compare_streams(a: &str, b: &str) -> Ordering {
    stream_rank(a).cmp(&stream_rank(b)).then_with(|| a.cmp(b))
}

/// Sort row keys into display order
pub fn sort_keys(keys: &mut [RowKey], registration: &HashMap<String, usize>) {
    keys.sort_by(|a, b| {
        compare_jobs(a.job.as_str(), b.job.as_str(), registration)
            .then_with(|| compare_streams(&a.stream, &b.stream))
    });
}
