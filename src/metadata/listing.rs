//! Episode listing through get_iplayer's recursive PID listing
//!
//! Used when the programmes API cannot expand a brand or series. The tool
//! prints a header line starting with `Episodes:` followed by one episode per
//! line; each of those lines carries the episode PID.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::invocation::CommandSpec;
use crate::job::process::spawn_error;

static LISTED_PID: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\b[a-z][a-z0-9]{7,10}\b").unwrap()
});

/// Header that opens the episode section
const EPISODES_HEADER: &str = "Episodes:";

/// PIDs listed after the `Episodes:` header, in order
///
/// Blank lines and `INFO:` lines inside the section are skipped, as is any
/// line without a PID.
pub fn parse_episode_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.starts_with(EPISODES_HEADER))
        .skip(1)
        .filter(|line| !line.is_empty() && !line.starts_with("INFO:"))
        .filter_map(|line| LISTED_PID.find(line).map(|m| m.as_str().to_string()))
        .collect()
}

/// Run `spec` and parse the episodes it lists
///
/// The process is killed if it is still running after `timeout`. A non-zero
/// exit is logged but its output is still parsed.
pub async fn list_episodes(
    spec: &CommandSpec,
    program: &str,
    timeout: Duration,
) -> Result<Vec<String>> {
    tracing::debug!(command = %spec.display(), "listing episodes with get_iplayer");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| Error::Other(format!("{program} listing timed out after {timeout:?}")))?
        .map_err(|e| Error::Spawn(spawn_error(program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    tracing::debug!(
        status = ?output.status.code(),
        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
        "episode listing finished"
    );
    Ok(parse_episode_listing(&stdout))
}
