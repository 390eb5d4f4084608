//! Display labels and Plex-style filenames built from episode metadata

use regex::Regex;
use std::sync::LazyLock;

use super::EpisodeMetadata;
use crate::display::render::fit;

static INVALID_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r#"[\\/:*?"<>|]"#).unwrap()
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\s+").unwrap()
});

/// Width of show and episode titles inside a label
const TITLE_WIDTH: usize = 10;

/// Longest filename most filesystems accept, in bytes
const MAX_FILENAME_BYTES: usize = 255;

const DEFAULT_EXTENSION: &str = ".mp4";

/// Trim `title` and fit it to `max_len` characters, marking cuts with an ellipsis
pub fn truncate_title(title: &str, max_len: usize) -> String {
    let clean = title.trim();
    if clean.chars().count() <= max_len {
        return fit(clean, max_len);
    }
    let mut out: String = clean.chars().take(max_len.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Two-digit rendering of a numeric string, `00` when not a number
pub fn two_digit(value: &str) -> String {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return "00".to_string();
    }
    let tail = &value[value.len().saturating_sub(2)..];
    format!("{:02}", tail.parse::<u8>().unwrap_or(0))
}

/// Strip characters that are invalid in filenames and collapse whitespace
pub fn sanitize_filename_component(value: &str) -> String {
    let cleaned = INVALID_FILENAME_CHARS.replace_all(value.trim(), "");
    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// Label shown in front of a job's rows: `"<pid>: <show> - sNNeNN - <episode>"`
pub fn program_label(pid: &str, metadata: &EpisodeMetadata, width: usize) -> String {
    let base = format!(
        "{pid}: {} - s{}e{} - {}",
        truncate_title(&metadata.show_title, TITLE_WIDTH),
        two_digit(&metadata.season_number),
        two_digit(&metadata.episode_number),
        truncate_title(&metadata.episode_title, TITLE_WIDTH),
    );
    fit(&base, width)
}

/// Filename of the form `"Show - sNNeNN - Episode.ext"`
///
/// Missing titles fall back to the upper-cased PID. The stem is shortened so
/// the whole name stays within 255 bytes.
pub fn plex_filename(metadata: &EpisodeMetadata, pid: &str, extension: &str) -> String {
    let fallback = pid.to_uppercase();
    let show = Some(sanitize_filename_component(&metadata.show_title))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.clone());
    let episode = Some(sanitize_filename_component(&metadata.episode_title))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.clone());

    let extension = match extension {
        "" => DEFAULT_EXTENSION.to_string(),
        ext if ext.starts_with('.') => ext.to_string(),
        ext => format!(".{ext}"),
    };

    let mut base = format!(
        "{show} - s{}e{} - {episode}",
        two_digit(&metadata.season_number),
        two_digit(&metadata.episode_number)
    );
    let max_stem = MAX_FILENAME_BYTES.saturating_sub(extension.len()).max(1);
    if base.len() > max_stem {
        let mut cut = max_stem;
        while !base.is_char_boundary(cut) {
            cut -= 1;
        }
        base.truncate(cut);
        base = base.trim_end().to_string();
    }
    format!("{base}{extension}")
}
