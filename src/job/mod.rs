//! Job execution -- one external download from scratch directory to placed file.
//!
//! Split into focused submodules:
//! - [`scratch`] - Per-job scratch directory allocation, lookup and cleanup
//! - [`process`] - Spawning the tool on a pseudo-terminal or pipes
//! - [`stream`] - Draining output into the live display
//! - [`artifact`] - Finding, moving and renaming the media file
//! - [`context`] - Shared handles a job runs with
//! - [`orchestration`] - Top-level job lifecycle
//! - [`finalization`] - Post-exit resolution and placement

pub mod artifact;
mod context;
mod finalization;
mod orchestration;
pub mod process;
pub mod scratch;
mod stream;


pub use artifact::{find_media_file, move_to_root, rename_for_plex};
pub use context::JobContext;
pub use orchestration::run_job;
pub use process::{AttachedProcess, OutputChunk, OutputSource, ToolProcess, spawn_attached};
pub use scratch::{ScratchDir, TokenSource, random_token, random_tokens};

use crate::types::JobStage;

fn enter(ctx: &JobContext, stage: JobStage) {
    tracing::debug!(job = %ctx.id, %stage, "job stage");
}
