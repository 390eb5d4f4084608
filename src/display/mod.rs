//! Multiplexed progress display
//!
//! One [`ProgressDisplay`] is shared by every job. It owns all row state behind
//! a single mutex, draws the live bars through an indicatif
//! [`MultiProgress`], and turns everything into static summary lines when the
//! run finishes.
//!
//! - [`colour`] - per-job colour palette
//! - [`ordering`] - deterministic row order
//! - [`render`] - fixed-width row text
//! - [`row`] - per-row state

pub mod colour;
pub mod ordering;
pub mod render;
pub mod row;

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::config::Config;
use crate::telemetry::COMPLETED_ETA;
use crate::types::JobId;

pub use colour::{ColourStyle, PALETTE, cycle_colours};
pub use ordering::{CONVERTING_STREAM, STREAM_PRIORITY, WAITING_STREAM};
pub use render::Layout;
pub use row::{RowKey, RowSnapshot, RowState};

use row::Row;

/// Positions on an indicatif bar; one unit is a tenth of a percent
const BAR_LENGTH: u64 = 1000;

/// Percent a synthetic row starts at
const PSEUDO_START_PERCENT: f64 = 1.0;

/// Ceiling for synthetic rows that have not been completed
const PSEUDO_CAP_PERCENT: f64 = 99.0;

/// Percent shown by a synthetic row after `elapsed` on a ramp of length `ramp`
pub fn pseudo_percent(elapsed: Duration, ramp: Duration) -> f64 {
    if ramp.is_zero() {
        return PSEUDO_CAP_PERCENT;
    }
    let ratio = elapsed.as_secs_f64() / ramp.as_secs_f64();
    (ratio * 100.0).clamp(PSEUDO_START_PERCENT, PSEUDO_CAP_PERCENT)
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

struct JobStyle {
    label: String,
    colour: ColourStyle,
}

#[derive(Default)]
struct DisplayState {
    rows: HashMap<RowKey, Row>,
    order: Vec<RowKey>,
    registration: HashMap<String, usize>,
    styles: HashMap<String, JobStyle>,
    finalized: bool,
}

impl DisplayState {
    fn label(&self, job: &JobId) -> String {
        self.styles
            .get(job.as_str())
            .map(|style| style.label.clone())
            .unwrap_or_else(|| render::default_label(job.as_str()))
    }

    fn colour(&self, job: &JobId) -> Option<ColourStyle> {
        self.styles.get(job.as_str()).map(|style| style.colour)
    }
}

/// Shared live display for all jobs of a run
pub struct ProgressDisplay {
    multi: MultiProgress,
    state: Mutex<DisplayState>,
    console: Mutex<()>,
    layout: Layout,
    pseudo_ramp: Duration,
    colour_summary: bool,
}

impl ProgressDisplay {
    /// Create a display drawing to stderr, or nowhere if the config hides it
    pub fn new(config: &Config) -> Self {
        let target = if config.display.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            state: Mutex::new(DisplayState::default()),
            console: Mutex::new(()),
            layout: Layout {
                label_width: config.display.label_width,
                stream_width: config.display.stream_width,
                bar_width: config.display.summary_bar_width,
            },
            pseudo_ramp: config.pseudo_ramp,
            colour_summary: !config.display.hidden,
        }
    }

    /// Display that draws nothing, with default widths
    pub fn hidden() -> Self {
        let mut config = Config::default();
        config.display.hidden = true;
        Self::new(&config)
    }

    fn lock(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job's label and colour
    ///
    /// Registered jobs are ordered by registration, ahead of any job that only
    /// ever appears through telemetry.
    pub fn register_job(&self, job: &JobId, label: Option<String>, colour: ColourStyle) {
        let mut state = self.lock();
        if state.finalized {
            return;
        }
        let next = state.registration.len();
        state.registration.entry(job.0.clone()).or_insert(next);
        state.styles.insert(
            job.0.clone(),
            JobStyle {
                label: label.unwrap_or_else(|| render::default_label(job.as_str())),
                colour,
            },
        );

        let keys: Vec<RowKey> = state.rows.keys().filter(|k| &k.job == job).cloned().collect();
        for key in &keys {
            if let Some(row) = state.rows.get(key) {
                row.bar.set_style(self.bar_style(Some(colour)));
            }
            self.refresh(&state, key);
        }
        self.relayout(&mut state);
    }

    /// Apply one real telemetry update to the row for `(job, stream)`
    ///
    /// Percent is clamped to `[0, 100]`. Completed rows ignore the call. A lower
    /// percent than the stored one resets the row's counter. Reaching 100% or an
    /// ETA of `00:00:00` completes the row.
    pub fn upsert_progress(
        &self,
        job: &JobId,
        stream: &str,
        percent: f64,
        speed: Option<&str>,
        eta: Option<&str>,
    ) {
        let mut state = self.lock();
        if state.finalized {
            return;
        }
        let key = RowKey::new(job.clone(), stream);
        let created = self.ensure_row(
            &mut state,
            &key,
            RowState::Real {
                speed: None,
                eta: None,
            },
        );

        let percent = clamp_percent(percent);
        let Some(row) = state.rows.get_mut(&key) else {
            return;
        };
        if row.completed {
            return;
        }

        let (prev_speed, prev_eta) = match &row.state {
            RowState::Real { speed, eta } => (speed.clone(), eta.clone()),
            RowState::Synthetic { .. } => (None, None),
        };
        if percent < row.percent {
            row.bar.reset();
        }
        row.percent = percent;
        row.state = RowState::Real {
            speed: speed.map(str::to_string).or(prev_speed),
            eta: eta.map(str::to_string).or(prev_eta),
        };
        if percent >= 100.0 || eta == Some(COMPLETED_ETA) {
            row.complete();
        }

        self.refresh(&state, &key);
        if created {
            self.relayout(&mut state);
        }
    }

    /// Start a timer-driven row; does nothing if the row already exists
    pub fn start_pseudo_stream(&self, job: &JobId, stream: &str) {
        let mut state = self.lock();
        if state.finalized {
            return;
        }
        let key = RowKey::new(job.clone(), stream);
        let created = self.ensure_row(
            &mut state,
            &key,
            RowState::Synthetic {
                started: Instant::now(),
            },
        );
        if !created {
            return;
        }
        if let Some(row) = state.rows.get_mut(&key) {
            row.percent = PSEUDO_START_PERCENT;
        }
        self.refresh(&state, &key);
        self.relayout(&mut state);
    }

    /// Advance a timer-driven row from elapsed time
    ///
    /// No-op unless a synthetic row was started for the key and is still open.
    pub fn tick_pseudo_stream(&self, job: &JobId, stream: &str) {
        let mut state = self.lock();
        if state.finalized {
            return;
        }
        let key = RowKey::new(job.clone(), stream);
        let Some(row) = state.rows.get_mut(&key) else {
            return;
        };
        let RowState::Synthetic { started } = row.state else {
            return;
        };
        if row.completed {
            return;
        }
        let percent = pseudo_percent(started.elapsed(), self.pseudo_ramp);
        row.percent = row.percent.max(percent);
        self.refresh(&state, &key);
    }

    /// Force a timer-driven row to 100%
    pub fn complete_pseudo_stream(&self, job: &JobId, stream: &str) {
        let mut state = self.lock();
        if state.finalized {
            return;
        }
        let key = RowKey::new(job.clone(), stream);
        let Some(row) = state.rows.get_mut(&key) else {
            return;
        };
        if !row.is_synthetic() || row.completed {
            return;
        }
        row.complete();
        self.refresh(&state, &key);
    }

    /// Complete every row belonging to `job`
    pub fn mark_job_complete(&self, job: &JobId) {
        let mut state = self.lock();
        if state.finalized {
            return;
        }
        let keys: Vec<RowKey> = state
            .rows
            .iter_mut()
            .filter(|(key, row)| &key.job == job && !row.completed)
            .map(|(key, row)| {
                row.complete();
                key.clone()
            })
            .collect();
        for key in &keys {
            self.refresh(&state, key);
        }
    }

    /// Replace the live display with static summary lines
    ///
    /// Clears all rows and freezes the engine. Only the first call produces
    /// lines; later calls return an empty list.
    pub fn finalize(&self) -> Vec<String> {
        let mut state = self.lock();
        if state.finalized {
            return Vec::new();
        }
        self.relayout(&mut state);

        let mut lines = Vec::with_capacity(state.order.len());
        for key in &state.order {
            let Some(row) = state.rows.get(key) else {
                continue;
            };
            let colour = if self.colour_summary {
                state.colour(&key.job)
            } else {
                None
            };
            lines.push(render::summary_line(
                row,
                &state.label(&key.job),
                &self.layout,
                colour,
            ));
            row.bar.finish_and_clear();
            self.multi.remove(&row.bar);
        }
        if let Err(e) = self.multi.clear() {
            tracing::debug!(error = %e, "failed to clear progress display");
        }

        *state = DisplayState {
            finalized: true,
            ..Default::default()
        };
        lines
    }

    /// Rows in display order
    pub fn snapshot(&self) -> Vec<RowSnapshot> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|key| state.rows.get(key))
            .map(Row::snapshot)
            .collect()
    }

    /// Snapshot of a single row
    pub fn row(&self, job: &JobId, stream: &str) -> Option<RowSnapshot> {
        let key = RowKey::new(job.clone(), stream);
        self.lock().rows.get(&key).map(Row::snapshot)
    }

    /// Run `f` with the live bars hidden and the console lock held
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        let _guard = self.console.lock().unwrap_or_else(PoisonError::into_inner);
        self.multi.suspend(f)
    }

    /// Print a line to stdout without tearing the live bars
    pub fn println(&self, line: &str) {
        self.suspend(|| {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{line}");
            let _ = stdout.flush();
        });
    }

    fn bar_style(&self, colour: Option<ColourStyle>) -> ProgressStyle {
        let template = match colour {
            Some(style) => format!("{{prefix}}|{{wide_bar:.{}}}|", style.template_name()),
            None => "{prefix}|{wide_bar}|".to_string(),
        };
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏ ")
    }

    // Returns whether a new row was created
    fn ensure_row(&self, state: &mut DisplayState, key: &RowKey, initial: RowState) -> bool {
        if state.rows.contains_key(key) {
            return false;
        }
        let bar = ProgressBar::with_draw_target(Some(BAR_LENGTH), ProgressDrawTarget::hidden())
            .with_style(self.bar_style(state.colour(&key.job)));
        state.rows.insert(key.clone(), Row::new(key.clone(), initial, bar));
        true
    }

    fn refresh(&self, state: &DisplayState, key: &RowKey) {
        let Some(row) = state.rows.get(key) else {
            return;
        };
        let label = state.label(&key.job);
        row.bar.set_prefix(render::describe(row, &label, &self.layout));
        row.bar
            .set_position((row.percent * BAR_LENGTH as f64 / 100.0).round() as u64);
    }

    // Recompute order and reattach every bar when it changed
    fn relayout(&self, state: &mut DisplayState) {
        let mut keys: Vec<RowKey> = state.rows.keys().cloned().collect();
        ordering::sort_keys(&mut keys, &state.registration);
        if keys == state.order {
            return;
        }

        for key in &state.order {
            if let Some(row) = state.rows.get(key) {
                self.multi.remove(&row.bar);
            }
        }
        for (position, key) in keys.iter().enumerate() {
            if let Some(row) = state.rows.get_mut(key) {
                row.position = position;
                self.multi.add(row.bar.clone());
            }
        }
        state.order = keys;
    }
}

impl std::fmt::Debug for ProgressDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressDisplay")
            .field("layout", &self.layout)
            .field("pseudo_ramp", &self.pseudo_ramp)
            .finish_non_exhaustive()
    }
}
