//! Programme identifier normalisation

use regex::Regex;
use std::sync::LazyLock;

static PID_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)[a-z][b-df-hj-np-tv-z0-9]{7,10}").unwrap()
});

static PID_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)^[a-z][b-df-hj-np-tv-z0-9]{7,10}$").unwrap()
});

/// Prefix of single-episode iPlayer URLs
pub const EPISODE_URL_PREFIX: &str = "https://www.bbc.co.uk/iplayer/episode/";

/// Whether `candidate` is shaped like a programme identifier
pub fn is_pid(candidate: &str) -> bool {
    PID_EXACT.is_match(candidate)
}

/// Reduce user input (a PID or an iPlayer URL) to a lower-case PID
///
/// Single-episode URLs use the path segment after `/episode/`. Anything else is
/// scanned for PID-shaped tokens, preferring the last one containing a digit.
/// Input without any such token is returned trimmed and lower-cased.
///
/// # Examples
///
/// ```
/// use auntie::metadata::normalise_pid;
///
/// assert_eq!(
///     normalise_pid("https://www.bbc.co.uk/iplayer/episode/B0BCD123/show?x=1"),
///     "b0bcd123"
/// );
/// assert_eq!(normalise_pid("  M000XYZ9 "), "m000xyz9");
/// ```
pub fn normalise_pid(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if trimmed.to_lowercase().starts_with(EPISODE_URL_PREFIX) {
        let rest = trimmed.get(EPISODE_URL_PREFIX.len()..).unwrap_or_default();
        let candidate = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        if is_pid(candidate) {
            tracing::debug!(pid = %candidate.to_lowercase(), "pid taken from episode URL");
            return candidate.to_lowercase();
        }
        tracing::debug!(input = %trimmed, "no pid after episode URL prefix; scanning");
    }

    let matches: Vec<&str> = PID_TOKEN.find_iter(trimmed).map(|m| m.as_str()).collect();
    let chosen = matches
        .iter()
        .rev()
        .find(|m| m.chars().any(|c| c.is_ascii_digit()))
        .or(matches.last());

    match chosen {
        Some(pid) => pid.to_lowercase(),
        None => {
            tracing::debug!(input = %trimmed, "no pid match; using input as-is");
            trimmed.to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pid() {
        assert_eq!(normalise_pid("b0bcd123"), "b0bcd123");
        assert_eq!(normalise_pid("  M000XYZ9\n"), "m000xyz9");
    }

    #[test]
    fn test_episode_url() {
        assert_eq!(
            normalise_pid("https://www.bbc.co.uk/iplayer/episode/m001k2l3/some-show-series-1-1"),
            "m001k2l3"
        );
        assert_eq!(
            normalise_pid("https://www.bbc.co.uk/iplayer/episode/m001k2l3#play"),
            "m001k2l3"
        );
    }

    #[test]
    fn test_series_url_prefers_last_token_with_digit() {
        let url = "https://www.bbc.co.uk/iplayer/episodes/m0012345/brandname?seriesId=p0bcdf12";
        assert_eq!(normalise_pid(url), "p0bcdf12");
    }

    #[test]
    fn test_no_match_returns_lowercased_input() {
        assert_eq!(normalise_pid("ABC"), "abc");
        assert_eq!(normalise_pid("   "), "");
    }

    #[test]
    fn test_is_pid() {
        assert!(is_pid("b0bcd123"));
        assert!(!is_pid("b0a"));
        assert!(!is_pid("0abcdefg"));
    }
}
