//! Parser for get_iplayer progress output
//!
//! Every line is classified on its own; nothing is buffered between calls.

use regex::Regex;
use std::sync::LazyLock;

/// ETA reported for rows that are finished
pub const COMPLETED_ETA: &str = "00:00:00";

static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(
        r"(?i)^\s*(?P<percent>\d+(?:\.\d+)?)%.*?@\s*(?P<speed>.*?)\s+ETA:\s*(?P<eta>\S+).*?\[(?P<stream>[^\]]+)\]\s*$",
    )
    .unwrap()
});

static COMPLETED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(
        r"(?i)INFO:\s+Downloaded:.*?(?:@\s*(?P<speed>.*?))?\s*\([^)]*\)\s*\[(?P<stream>[^\]]+)\]",
    )
    .unwrap()
});

/// Which grammar produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// A live percentage line
    Progress,
    /// An `INFO: Downloaded:` marker
    Completion,
}

/// Structured progress extracted from one line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Grammar that matched
    pub kind: UpdateKind,
    /// Percent complete as printed (not yet clamped)
    pub percent: f64,
    /// Lower-cased sub-stream name
    pub stream: String,
    /// Transfer speed as printed
    pub speed: String,
    /// ETA token as printed
    pub eta: String,
}

/// Everything one line contributes to the display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineTelemetry {
    /// Progress or completion update, if the line matched a grammar
    pub update: Option<ProgressUpdate>,
    /// The line mentions post-processing ("converting" or "tagging")
    pub post_processing: bool,
}

impl LineTelemetry {
    /// Whether the line carried nothing of interest
    pub fn is_ignored(&self) -> bool {
        self.update.is_none() && !self.post_processing
    }
}

/// Classify one line of output
///
/// # Examples
///
/// ```
/// use auntie::telemetry::{parse_line, UpdateKind};
///
/// let parsed = parse_line("  42.0%   @ 3.1Mb/s ETA: 00:01:10 [video]");
/// let update = parsed.update.unwrap();
/// assert_eq!(update.kind, UpdateKind::Progress);
/// assert_eq!(update.stream, "video");
/// assert_eq!(update.eta, "00:01:10");
/// ```
#[must_use]
pub fn parse_line(line: &str) -> LineTelemetry {
    let stripped = line.trim();
    if stripped.is_empty() {
        return LineTelemetry::default();
    }

    let lower = stripped.to_lowercase();
    let post_processing = lower.contains("converting") || lower.contains("tagging");

    LineTelemetry {
        update: parse_progress(stripped).or_else(|| parse_completion(stripped)),
        post_processing,
    }
}

fn parse_progress(line: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_LINE.captures(line)?;
    let percent = caps.name("percent")?.as_str().parse::<f64>().ok()?;
    Some(ProgressUpdate {
        kind: UpdateKind::Progress,
        percent,
        stream: caps.name("stream")?.as_str().trim().to_lowercase(),
        speed: caps.name("speed")?.as_str().trim().to_string(),
        eta: caps.name("eta")?.as_str().trim().to_string(),
    })
}

fn parse_completion(line: &str) -> Option<ProgressUpdate> {
    let caps = COMPLETED_LINE.captures(line)?;
    Some(ProgressUpdate {
        kind: UpdateKind::Completion,
        percent: 100.0,
        stream: caps.name("stream")?.as_str().trim().to_lowercase(),
        speed: caps
            .name("speed")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        eta: COMPLETED_ETA.to_string(),
    })
}
