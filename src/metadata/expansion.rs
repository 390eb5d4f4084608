//! Turning user-supplied identifiers into the episode list to download

use std::time::Duration;

use super::listing::list_episodes;
use super::{MetadataSource, normalise_pid};
use crate::invocation::Invocation;
use crate::types::JobId;
use crate::utils::dedupe_preserve_order;

/// Normalise, expand and de-duplicate `raw` identifiers, preserving order
///
/// Each identifier is expanded through `source`. When that fails, times out,
/// or yields nothing, the `fallback` tool's episode listing is tried under the
/// same timeout. If neither produces episodes the identifier itself is kept.
/// Blank input is dropped.
pub async fn expand_identifiers(
    source: &dyn MetadataSource,
    fallback: Option<&dyn Invocation>,
    raw: &[String],
    timeout: Duration,
) -> Vec<JobId> {
    let mut expanded = Vec::new();
    for value in raw {
        let pid = normalise_pid(value);
        if pid.is_empty() {
            tracing::warn!(input = %value, "ignoring empty identifier");
            continue;
        }

        let mut episodes = match tokio::time::timeout(timeout, source.expand(&pid)).await {
            Ok(Ok(episodes)) => clean(&episodes),
            Ok(Err(e)) => {
                tracing::debug!(pid = %pid, error = %e, "expansion failed");
                Vec::new()
            }
            Err(_) => {
                tracing::debug!(pid = %pid, "expansion timed out");
                Vec::new()
            }
        };
        if episodes.is_empty() {
            if let Some(invocation) = fallback {
                episodes = list_with_tool(invocation, &pid, timeout).await;
            }
        }
        tracing::debug!(pid = %pid, episodes = ?episodes, "expanded identifier");

        if episodes.is_empty() {
            expanded.push(pid);
        } else {
            expanded.extend(episodes);
        }
    }
    dedupe_preserve_order(expanded)
        .into_iter()
        .map(JobId::from)
        .collect()
}

fn clean(episodes: &[String]) -> Vec<String> {
    episodes
        .iter()
        .map(|e| normalise_pid(e))
        .filter(|e| !e.is_empty())
        .collect()
}

async fn list_with_tool(invocation: &dyn Invocation, pid: &str, timeout: Duration) -> Vec<String> {
    let Some(spec) = invocation.expansion_command(pid) else {
        return Vec::new();
    };
    tracing::debug!(pid, "falling back to get_iplayer episode listing");
    match list_episodes(&spec, invocation.program_name(), timeout).await {
        Ok(episodes) => clean(&episodes),
        Err(e) => {
            tracing::debug!(pid, error = %e, "episode listing failed");
            Vec::new()
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::invocation::CommandSpec;
    use crate::metadata::{EpisodeMetadata, NoMetadata};
    use async_trait::async_trait;

    struct Fixture;

    #[async_trait]
    impl MetadataSource for Fixture {
        async fn episode(&self, _pid: &str) -> Result<EpisodeMetadata> {
            Ok(EpisodeMetadata::default())
        }

        async fn expand(&self, pid: &str) -> Result<Vec<String>> {
            match pid {
                "s0000001" => Ok(vec!["E0000001".to_string(), "e0000002".to_string()]),
                "s0000002" => Ok(vec!["e0000002".to_string(), "e0000003".to_string()]),
                "x0000001" => Err(Error::Other("boom".to_string())),
                "z0000001" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(vec!["e0000009".to_string()])
                }
                _ => Ok(Vec::new()),
            }
        }
    }

    fn ids(ids: &[JobId]) -> Vec<&str> {
        ids.iter().map(JobId::as_str).collect()
    }

    #[tokio::test]
    async fn test_series_are_expanded_and_deduplicated() {
        let raw = vec!["s0000001".to_string(), "S0000002".to_string()];
        let expanded = expand_identifiers(&Fixture, None, &raw, Duration::from_secs(5)).await;
        assert_eq!(ids(&expanded), vec!["e0000001", "e0000002", "e0000003"]);
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_identifier() {
        let raw = vec!["x0000001".to_string(), "e0000007".to_string(), "  ".to_string()];
        let expanded = expand_identifiers(&Fixture, None, &raw, Duration::from_secs(5)).await;
        assert_eq!(ids(&expanded), vec!["x0000001", "e0000007"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_identifier() {
        let raw = vec!["z0000001".to_string()];
        let expanded = expand_identifiers(&Fixture, None, &raw, Duration::from_secs(1)).await;
        assert_eq!(ids(&expanded), vec!["z0000001"]);
    }

    #[tokio::test]
    async fn test_offline_keeps_input_order() {
        let raw = vec!["b0000002".to_string(), "b0000001".to_string(), "b0000002".to_string()];
        let expanded = expand_identifiers(&NoMetadata, None, &raw, Duration::from_secs(1)).await;
        assert_eq!(ids(&expanded), vec!["b0000002", "b0000001"]);
    }

    #[cfg(unix)]
    struct Lister;

    #[cfg(unix)]
    impl Invocation for Lister {
        fn program_name(&self) -> &str {
            "get_iplayer"
        }

        fn download_command(&self, _id: &JobId, _output_dir: &std::path::Path) -> CommandSpec {
            CommandSpec::new("false", Vec::new())
        }

        fn expansion_command(&self, pid: &str) -> Option<CommandSpec> {
            let body = format!("printf 'Episodes:\\nShow - 1, {pid}b1\\nINFO: x\\nShow - 2, {pid}c2\\n'");
            Some(CommandSpec::new("sh", vec!["-c".to_string(), body]))
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_expansion_falls_back_to_tool_listing() {
        let raw = vec!["b04vs4r9".to_string(), "s0000001".to_string()];
        let expanded = expand_identifiers(&Fixture, Some(&Lister), &raw, Duration::from_secs(5)).await;
        assert_eq!(
            ids(&expanded),
            vec!["b04vs4r9b1", "b04vs4r9c2", "e0000001", "e0000002"]
        );
    }

    #[tokio::test]
    async fn test_failed_listing_keeps_identifier() {
        struct Broken;
        impl Invocation for Broken {
            fn program_name(&self) -> &str {
                "get_iplayer"
            }
            fn download_command(&self, _id: &JobId, _output_dir: &std::path::Path) -> CommandSpec {
                CommandSpec::new("false", Vec::new())
            }
            fn expansion_command(&self, _pid: &str) -> Option<CommandSpec> {
                Some(CommandSpec::new("/nonexistent/auntie-get_iplayer", Vec::new()))
            }
        }

        let raw = vec!["x0000001".to_string()];
        let expanded = expand_identifiers(&Fixture, Some(&Broken), &raw, Duration::from_secs(5)).await;
        assert_eq!(ids(&expanded), vec!["x0000001"]);
    }
}
