//! Per-job scratch directories
//!
//! A scratch directory is named `<prefix>-<id>-<token>` under the working
//! directory. It is created atomically with `create_dir`, so a name that
//! already exists is never reused; a fresh token is drawn instead.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::JobId;

/// Attempts at drawing an unused token before giving up
const MAX_ALLOCATION_ATTEMPTS: u32 = 16;

/// Source of collision-avoidance tokens
pub type TokenSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Eight random lowercase hex digits
pub fn random_token() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// The default [`TokenSource`]
pub fn random_tokens() -> TokenSource {
    Arc::new(random_token)
}

/// A scratch directory owned by one job
#[derive(Debug, Clone)]
pub struct ScratchDir {
    parent: PathBuf,
    prefix: String,
    suffix: String,
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh scratch directory for `id` under `parent`
    pub async fn allocate(
        parent: &Path,
        prefix: &str,
        id: &JobId,
        tokens: &TokenSource,
    ) -> Result<Self> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let suffix = format!("-{}-{}", id, tokens());
            let path = parent.join(format!("{prefix}{suffix}"));
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    tracing::debug!(job = %id, ?path, "allocated scratch directory");
                    return Ok(Self {
                        parent: parent.to_path_buf(),
                        prefix: prefix.to_string(),
                        suffix,
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(job = %id, ?path, attempt, "scratch name taken; drawing new token");
                }
                Err(e) => {
                    return Err(Error::Scratch {
                        parent: parent.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(Error::Scratch {
            parent: parent.to_path_buf(),
            reason: format!("no free name after {MAX_ALLOCATION_ATTEMPTS} attempts"),
        })
    }

    /// Path the directory was created at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the directory after the external process ran
    ///
    /// Tries the exact path first, then any directory in the parent whose name
    /// keeps the prefix and the `-<id>-<token>` suffix.
    pub async fn locate(&self) -> Option<PathBuf> {
        if tokio::fs::metadata(&self.path)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            return Some(self.path.clone());
        }

        let mut entries = tokio::fs::read_dir(&self.parent).await.ok()?;
        let head = format!("{}-", self.prefix);
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !(name.starts_with(&head) && name.ends_with(&self.suffix)) {
                continue;
            }
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                return Some(entry.path());
            }
        }
        None
    }

    /// Remove the scratch directory and `also`, best effort
    ///
    /// Missing directories are not an error; anything else is logged and
    /// otherwise ignored. Safe to call more than once.
    pub async fn cleanup(&self, also: Option<&Path>) {
        let mut targets = vec![self.path.clone()];
        if let Some(extra) = also
            && extra != self.path
        {
            targets.push(extra.to_path_buf());
        }
        for target in targets {
            remove_dir_best_effort(&target).await;
        }
    }
}

async fn remove_dir_best_effort(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(?path, "removed scratch directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(?path, error = %e, "failed to remove download directory");
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn scripted(tokens: &[&str]) -> TokenSource {
        let queue = Mutex::new(tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>());
        Arc::new(move || {
            let mut queue = queue.lock().unwrap();
            if queue.is_empty() {
                "ffffffff".to_string()
            } else {
                queue.remove(0)
            }
        })
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_collision_draws_new_token() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().join(".x-abc123-deadbeef");
        std::fs::create_dir(&existing).unwrap();
        std::fs::write(existing.join("keep.txt"), "previous job").unwrap();

        let tokens = scripted(&["deadbeef", "cafef00d"]);
        let scratch = ScratchDir::allocate(temp.path(), ".x", &JobId::from("abc123"), &tokens)
            .await
            .unwrap();

        assert_eq!(scratch.path(), temp.path().join(".x-abc123-cafef00d"));
        assert!(scratch.path().is_dir());
        // the colliding directory is left untouched
        assert_eq!(
            std::fs::read_to_string(existing.join("keep.txt")).unwrap(),
            "previous job"
        );
    }

    #[tokio::test]
    async fn test_allocation_gives_up() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".x-abc123-00000000")).unwrap();
        let tokens: TokenSource = Arc::new(|| "00000000".to_string());
        let result = ScratchDir::allocate(temp.path(), ".x", &JobId::from("abc123"), &tokens).await;
        assert!(matches!(result, Err(Error::Scratch { .. })));
    }

    #[tokio::test]
    async fn test_missing_parent_is_an_error() {
        let temp = TempDir::new().unwrap();
        let parent = temp.path().join("missing");
        let result =
            ScratchDir::allocate(&parent, ".x", &JobId::from("abc123"), &random_tokens()).await;
        assert!(matches!(result, Err(Error::Scratch { .. })));
    }

    #[tokio::test]
    async fn test_locate_exact_and_by_suffix() {
        let temp = TempDir::new().unwrap();
        let tokens = scripted(&["0badf00d"]);
        let scratch = ScratchDir::allocate(temp.path(), ".x", &JobId::from("abc123"), &tokens)
            .await
            .unwrap();
        assert_eq!(scratch.locate().await.unwrap(), scratch.path());

        // the tool renamed the directory but kept the suffix
        let moved = temp.path().join(".x-renamed-abc123-0badf00d");
        std::fs::rename(scratch.path(), &moved).unwrap();
        assert_eq!(scratch.locate().await.unwrap(), moved);

        std::fs::remove_dir(&moved).unwrap();
        assert!(scratch.locate().await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let scratch =
            ScratchDir::allocate(temp.path(), ".x", &JobId::from("abc123"), &random_tokens())
                .await
                .unwrap();
        std::fs::write(scratch.path().join("partial.ts"), "data").unwrap();
        let other = temp.path().join(".x-moved-abc123");
        std::fs::create_dir(&other).unwrap();

        scratch.cleanup(Some(&other)).await;
        assert!(!scratch.path().exists());
        assert!(!other.exists());

        scratch.cleanup(Some(&other)).await;
        scratch.cleanup(None).await;
    }
}
