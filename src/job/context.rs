//! Job context: everything one job needs from the run that owns it

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::scratch::TokenSource;
use crate::config::Config;
use crate::display::ProgressDisplay;
use crate::invocation::Invocation;
use crate::metadata::MetadataCache;
use crate::types::JobId;

/// Shared handles passed into [`run_job`](super::run_job)
///
/// Cloning is cheap; every field is a handle.
#[derive(Clone)]
pub struct JobContext {
    /// Identifier being downloaded
    pub id: JobId,
    pub config: Arc<Config>,
    /// Live display shared by every job of the run
    pub display: Arc<ProgressDisplay>,
    /// Builds the external command
    pub invocation: Arc<dyn Invocation>,
    /// Episode metadata for Plex renaming
    pub metadata: Arc<MetadataCache>,
    /// Run-wide cancellation
    pub cancel: CancellationToken,
    /// Scratch directory tokens
    pub tokens: TokenSource,
}

impl JobContext {
    /// Print a `"<id>: <message>"` line above the live display
    pub(crate) fn report(&self, message: impl std::fmt::Display) {
        self.display.println(&format!("{}: {message}", self.id));
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.id)
            .field("program", &self.invocation.program_name())
            .finish_non_exhaustive()
    }
}
