//! Programme metadata: identifiers, episode details, and series expansion
//!
//! - [`pid`] - normalising user input to programme identifiers
//! - [`naming`] - display labels and Plex filenames
//! - [`bbc`] - the BBC programmes JSON API
//! - [`expansion`] - turning brands and series into episode lists
//! - [`listing`] - get_iplayer's own episode listing, used as a fallback

pub mod bbc;
pub mod expansion;
pub mod listing;
pub mod naming;
pub mod pid;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;

pub use bbc::BbcProgrammes;
pub use expansion::expand_identifiers;
pub use listing::parse_episode_listing;
pub use naming::{plex_filename, program_label};
pub use pid::{is_pid, normalise_pid};

/// Naming details for one episode
///
/// Numbers are kept as the digit strings the API supplied; empty means unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub show_title: String,
    pub season_number: String,
    pub episode_number: String,
    pub episode_title: String,
}

/// Source of episode metadata and brand/series expansion
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Naming details for `pid`
    async fn episode(&self, pid: &str) -> Result<EpisodeMetadata>;

    /// Episode identifiers contained in `pid`
    ///
    /// An empty list means the identifier could not be expanded.
    async fn expand(&self, pid: &str) -> Result<Vec<String>>;
}

/// Offline source: no metadata, no expansion
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

#[async_trait]
impl MetadataSource for NoMetadata {
    async fn episode(&self, _pid: &str) -> Result<EpisodeMetadata> {
        Ok(EpisodeMetadata::default())
    }

    async fn expand(&self, _pid: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Per-run memo of episode metadata
///
/// Lookups that fail are remembered as empty metadata so each identifier hits
/// the source at most once.
pub struct MetadataCache {
    source: Arc<dyn MetadataSource>,
    entries: Mutex<HashMap<String, EpisodeMetadata>>,
}

impl MetadataCache {
    /// Cache in front of `source`
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Underlying source
    pub fn source(&self) -> &Arc<dyn MetadataSource> {
        &self.source
    }

    /// Metadata for `pid`, fetched on first use
    pub async fn get(&self, pid: &str) -> EpisodeMetadata {
        if let Some(found) = self.cached(pid) {
            return found;
        }
        let metadata = match self.source.episode(pid).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(pid, error = %e, "metadata lookup failed");
                EpisodeMetadata::default()
            }
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(pid.to_string())
            .or_insert(metadata)
            .clone()
    }

    /// Metadata already fetched for `pid`
    pub fn cached(&self, pid: &str) -> Option<EpisodeMetadata> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pid)
            .cloned()
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache").finish_non_exhaustive()
    }
}
