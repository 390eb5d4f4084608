//! Utility functions for path collision handling and de-duplication

use crate::error::{ArtifactError, Error, Result};
use std::collections::HashSet;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Maximum number of " (n)" suffixes tried when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// First free path for `filename` inside `directory`
///
/// Returns `directory/filename` when nothing exists there, otherwise the first
/// `stem (n).ext` that does not exist. Existing files are never overwritten.
///
/// # Examples
///
/// ```
/// use auntie::utils::unique_path;
/// use std::path::Path;
///
/// let dir = std::env::temp_dir().join("auntie-doc-unique-path-missing");
/// let unique = unique_path(&dir, "Show - s01e02 - Pilot.mp4").unwrap();
/// // If the file existed, this would be "Show - s01e02 - Pilot (1).mp4"
/// assert_eq!(unique, dir.join("Show - s01e02 - Pilot.mp4"));
/// ```
pub fn unique_path(directory: &Path, filename: &str) -> Result<PathBuf> {
    let path = directory.join(filename);
    if !path.exists() {
        return Ok(path);
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        Error::Artifact(ArtifactError::InvalidPath {
            path: path.clone(),
            reason: "cannot extract file stem".to_string(),
        })
    })?;
    let extension = path.extension().and_then(|e| e.to_str());

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = match extension {
            Some(ext) => directory.join(format!("{stem} ({i}).{ext}")),
            None => directory.join(format!("{stem} ({i})")),
        };
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::Artifact(ArtifactError::FileCollision {
        path,
        reason: format!("no free name after {MAX_RENAME_ATTEMPTS} attempts"),
    }))
}

/// Remove duplicates, keeping the first occurrence of each item
pub fn dedupe_preserve_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
