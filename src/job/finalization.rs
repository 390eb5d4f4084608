//! Post-exit stages: locate the scratch directory, place the media file, rename

use std::path::PathBuf;

use super::artifact::{find_media_file, move_to_root, rename_for_plex};
use super::context::JobContext;
use super::scratch::ScratchDir;
use crate::error::{ArtifactError, Error};
use crate::types::{JobExit, JobStage};

/// Outcome of the post-exit stages
pub(super) struct Placement {
    pub(super) exit: JobExit,
    pub(super) artifact: Option<PathBuf>,
    /// Where the scratch directory was found, if it moved
    pub(super) located: Option<PathBuf>,
}

fn message(error: &Error) -> String {
    match error {
        Error::Artifact(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

/// Resolve what the tool produced and move it into place
///
/// Only a successful exit is inspected for media; a missing scratch directory
/// or media file turns success into failure. A failing exit passes through.
pub(super) async fn place_artifact(ctx: &JobContext, scratch: &ScratchDir, exit: JobExit) -> Placement {
    super::enter(ctx, JobStage::ResolvingArtifact);
    let located = scratch.locate().await;
    tracing::debug!(job = %ctx.id, ?located, "located download directory");

    let failed = |exit: JobExit, located: Option<PathBuf>| Placement {
        exit,
        artifact: None,
        located,
    };

    let Some(directory) = located else {
        if exit.is_success() {
            ctx.report(ArtifactError::ScratchMissing {
                expected: scratch.path().to_path_buf(),
            });
            return failed(JobExit::FAILURE, None);
        }
        return failed(exit, None);
    };
    if !exit.is_success() {
        return failed(exit, Some(directory));
    }

    let Some(media) = find_media_file(&directory, &ctx.config).await else {
        ctx.report(ArtifactError::NoMediaFile {
            directory: directory.clone(),
        });
        return failed(exit.or_failure(), Some(directory));
    };

    let placed = match move_to_root(&media, &ctx.config.work_dir).await {
        Ok(placed) => placed,
        Err(e) => {
            tracing::warn!(job = %ctx.id, error = %e, "failed to move media file");
            ctx.report(message(&e));
            return failed(JobExit::FAILURE, Some(directory));
        }
    };

    if !ctx.config.plex_rename {
        return Placement {
            exit,
            artifact: Some(placed),
            located: Some(directory),
        };
    }

    super::enter(ctx, JobStage::Renaming);
    let metadata = ctx.metadata.get(ctx.id.as_str()).await;
    match rename_for_plex(&placed, ctx.id.as_str(), &metadata).await {
        Ok(renamed) => {
            if renamed != placed
                && let Some(name) = renamed.file_name()
            {
                ctx.report(format!("renamed to {}", name.to_string_lossy()));
            }
            Placement {
                exit,
                artifact: Some(renamed),
                located: Some(directory),
            }
        }
        Err(e) => {
            ctx.report(message(&e));
            Placement {
                exit: JobExit::FAILURE,
                artifact: Some(placed),
                located: Some(directory),
            }
        }
    }
}
