//! Resolving and placing the media file a job produced

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::Config;
use crate::error::{ArtifactError, Error, Result};
use crate::metadata::{EpisodeMetadata, plex_filename};
use crate::utils::unique_path;

/// Most recently modified media file anywhere under `directory`
///
/// Ties on modification time go to the larger file. Entries that vanish or
/// cannot be inspected are skipped.
pub async fn find_media_file(directory: &Path, config: &Config) -> Option<PathBuf> {
    let mut best: Option<(SystemTime, u64, PathBuf)> = None;
    let mut pending = vec![directory.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(?dir, error = %e, "skipping unreadable directory");
                continue;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() || !config.is_media_file(&path) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let candidate = (modified, metadata.len(), path);
            let better = match &best {
                Some((time, size, _)) => (candidate.0, candidate.1) > (*time, *size),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
    }

    best.map(|(_, _, path)| path)
}

/// Move `file` into `root` under its own name, disambiguated on collision
pub async fn move_to_root(file: &Path, root: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ArtifactError::InvalidPath {
            path: file.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;
    let destination = unique_path(root, name)?;

    tokio::fs::rename(file, &destination)
        .await
        .map_err(|e| ArtifactError::MoveFailed {
            source_path: file.to_path_buf(),
            dest_path: destination.clone(),
            reason: e.to_string(),
        })?;
    tracing::debug!(?file, ?destination, "moved media file");
    Ok(destination)
}

/// Rename a placed file to `Show - sNNeNN - Episode.ext`
///
/// A file that already carries the target name is left alone.
pub async fn rename_for_plex(file: &Path, pid: &str, metadata: &EpisodeMetadata) -> Result<PathBuf> {
    let invalid = |reason: &str| {
        Error::Artifact(ArtifactError::InvalidPath {
            path: file.to_path_buf(),
            reason: reason.to_string(),
        })
    };
    let parent = file.parent().ok_or_else(|| invalid("no parent directory"))?;
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let target = plex_filename(metadata, pid, &extension);
    if file.file_name().and_then(|n| n.to_str()) == Some(target.as_str()) {
        return Ok(file.to_path_buf());
    }

    let destination = unique_path(parent, &target)?;
    tokio::fs::rename(file, &destination)
        .await
        .map_err(|e| ArtifactError::RenameFailed {
            source_path: file.to_path_buf(),
            dest_path: destination.clone(),
            reason: e.to_string(),
        })?;
    Ok(destination)
}
