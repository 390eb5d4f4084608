//! Fixed-width text for live bar prefixes and final summary lines

use std::time::Duration;

use super::colour::ColourStyle;
use super::row::{Row, RowState};

/// Speed shown before the tool reports one
pub const DEFAULT_SPEED: &str = "--.- Mb/s";
/// ETA shown before the tool reports one
pub const DEFAULT_ETA: &str = "--:--:--";

const ETA_WIDTH: usize = 8;
const SPEED_WIDTH: usize = 10;
const META_WIDTH: usize = 5 + ETA_WIDTH + 2 + SPEED_WIDTH + 1;
const PERCENT_WIDTH: usize = 8;

const FULL_BLOCK: char = '█';
const PARTIAL_BLOCKS: [char; 7] = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];

/// Column widths for the description area
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub label_width: usize,
    pub stream_width: usize,
    pub bar_width: usize,
}

/// Pad or truncate `text` to exactly `width` characters
pub fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}

/// Fallback label for jobs registered without one
pub fn default_label(job: &str) -> String {
    format!("{job}: ")
}

fn meta(row: &Row) -> String {
    if row.completed {
        return fit("(completed)", META_WIDTH);
    }
    match &row.state {
        RowState::Synthetic { .. } => " ".repeat(META_WIDTH),
        RowState::Real { speed, eta } => {
            let eta = eta.as_deref().filter(|e| !e.is_empty()).unwrap_or(DEFAULT_ETA);
            let speed = speed
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SPEED);
            let speed: String = speed.trim().chars().take(SPEED_WIDTH).collect();
            fit(
                &format!("(ETA {}, {speed:>SPEED_WIDTH$})", fit(eta, ETA_WIDTH)),
                META_WIDTH,
            )
        }
    }
}

fn percent(row: &Row) -> String {
    if row.is_synthetic() && !row.completed {
        return " ".repeat(PERCENT_WIDTH);
    }
    format!("{:6.1}% ", row.percent)
}

/// Description text placed in front of a row's bar
pub(crate) fn describe(row: &Row, label: &str, layout: &Layout) -> String {
    format!(
        "{} {}{}{}",
        fit(label, layout.label_width),
        fit(&row.key.stream, layout.stream_width),
        percent(row),
        meta(row)
    )
}

/// Static bar drawn with eighth-block glyphs
pub fn bar_glyphs(percent: f64, width: usize) -> String {
    let eighths = ((percent.clamp(0.0, 100.0) / 100.0) * (width * 8) as f64).round() as usize;
    let full = (eighths / 8).min(width);
    let mut out = String::with_capacity(width * 3);
    out.extend(std::iter::repeat_n(FULL_BLOCK, full));
    let mut drawn = full;
    let rem = eighths % 8;
    if drawn < width && rem > 0 {
        out.push(PARTIAL_BLOCKS[rem - 1]);
        drawn += 1;
    }
    out.extend(std::iter::repeat_n(' ', width - drawn));
    out
}

/// `HH:MM:SS` for a duration
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Final one-line summary of a row
pub(crate) fn summary_line(row: &Row, label: &str, layout: &Layout, colour: Option<ColourStyle>) -> String {
    let mut desc = describe(row, label, layout);
    if row.completed {
        desc = format!("{} ", desc.trim_end());
    }
    let glyphs = bar_glyphs(row.percent, layout.bar_width);
    let bar = match colour {
        Some(style) => style.paint(&glyphs),
        None => glyphs,
    };
    format!("{desc}|{bar}| {}", format_elapsed(row.elapsed()))
}
