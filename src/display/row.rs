//! Row state kept per (job, sub-stream)

use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::types::JobId;

/// Identity of a display row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    /// Owning job
    pub job: JobId,
    /// Lower-cased sub-stream name
    pub stream: String,
}

impl RowKey {
    /// Key for `stream` of `job`, normalising the stream name
    pub fn new(job: JobId, stream: &str) -> Self {
        Self {
            job,
            stream: stream.trim().to_lowercase(),
        }
    }
}

/// Where a row's values come from
#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    /// Fed by parsed tool output
    Real {
        /// Last reported speed
        speed: Option<String>,
        /// Last reported ETA
        eta: Option<String>,
    },
    /// Timer-driven placeholder such as "waiting" or "converting"
    Synthetic {
        /// When the ramp started
        started: Instant,
    },
}

/// One row of the live display
pub(crate) struct Row {
    pub key: RowKey,
    pub percent: f64,
    pub state: RowState,
    pub completed: bool,
    pub position: usize,
    pub created: Instant,
    pub finished: Option<Instant>,
    pub bar: ProgressBar,
}

impl Row {
    pub fn new(key: RowKey, state: RowState, bar: ProgressBar) -> Self {
        Self {
            key,
            percent: 0.0,
            state,
            completed: false,
            position: 0,
            created: Instant::now(),
            finished: None,
            bar,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.state, RowState::Synthetic { .. })
    }

    /// Time spent on this row, frozen once the row completes
    pub fn elapsed(&self) -> Duration {
        self.finished
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.created)
    }

    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.percent = 100.0;
        self.finished = Some(Instant::now());
    }

    pub fn snapshot(&self) -> RowSnapshot {
        let (speed, eta) = match &self.state {
            RowState::Real { speed, eta } => (speed.clone(), eta.clone()),
            RowState::Synthetic { .. } => (None, None),
        };
        RowSnapshot {
            job: self.key.job.clone(),
            stream: self.key.stream.clone(),
            percent: self.percent,
            speed,
            eta,
            completed: self.completed,
            synthetic: self.is_synthetic(),
            position: self.position,
        }
    }
}

/// Read-only view of a row
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    pub job: JobId,
    pub stream: String,
    /// Percent complete in `[0, 100]`
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub completed: bool,
    /// Timer-driven placeholder row
    pub synthetic: bool,
    /// Index in display order
    pub position: usize,
}
