//! Configuration types for auntie

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// External tool discovery
///
/// Groups settings for locating the `get_iplayer` executable.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to get_iplayer (auto-detected if None)
    #[serde(default)]
    pub get_iplayer_path: Option<PathBuf>,

    /// Whether to search PATH for get_iplayer if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            get_iplayer_path: None,
            search_path: true,
        }
    }
}

/// Live display layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Width of the programme label column (default: 42)
    #[serde(default = "default_label_width")]
    pub label_width: usize,

    /// Width of the sub-stream column (default: 12)
    #[serde(default = "default_stream_width")]
    pub stream_width: usize,

    /// Width of the static bar in summary lines (default: 30)
    #[serde(default = "default_summary_bar_width")]
    pub summary_bar_width: usize,

    /// Draw nothing while running (summary lines are still produced)
    #[serde(default)]
    pub hidden: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            label_width: default_label_width(),
            stream_width: default_stream_width(),
            summary_bar_width: default_summary_bar_width(),
            hidden: false,
        }
    }
}

/// Programme metadata lookups
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Query the programmes API at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the programmes API
    #[serde(default = "default_programmes_url")]
    pub base_url: String,

    /// Timeout for a single metadata request in seconds (default: 10)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Timeout for requests made while expanding series and brands (default: 120)
    #[serde(default = "default_expansion_timeout", with = "duration_serde")]
    pub expansion_timeout: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_programmes_url(),
            timeout: default_metadata_timeout(),
            expansion_timeout: default_expansion_timeout(),
        }
    }
}

/// Main configuration for a run
///
/// Sub-configs are flattened for serialization, so a JSON config file is a single
/// flat object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Destination root for finished files and parent of scratch directories (default: ".")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum concurrent jobs (default: host parallelism)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Remove scratch directories when a job ends (default: true)
    #[serde(default = "default_true")]
    pub clean_scratch: bool,

    /// Rename placed files to "Show - sNNeNN - Episode.ext" (default: false)
    #[serde(default)]
    pub plex_rename: bool,

    /// Leading component of scratch directory names (default: ".auntie")
    #[serde(default = "default_scratch_prefix")]
    pub scratch_prefix: String,

    /// Output poll timeout in milliseconds (default: 100)
    #[serde(default = "default_poll_interval", with = "millis_serde")]
    pub poll_interval: Duration,

    /// Time for a pseudo-stream to ramp to its cap, in seconds (default: 300)
    #[serde(default = "default_pseudo_ramp", with = "duration_serde")]
    pub pseudo_ramp: Duration,

    /// Attach the external process to a pseudo-terminal where available (default: true)
    #[serde(default = "default_true")]
    pub use_pty: bool,

    /// Kill running processes when the run is interrupted (default: false)
    #[serde(default)]
    pub terminate_on_interrupt: bool,

    /// File extensions (lower-case, with dot) accepted as the produced media file
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// External tool discovery
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Live display layout
    #[serde(flatten)]
    pub display: DisplayConfig,

    /// Programme metadata lookups
    #[serde(flatten)]
    pub metadata: MetadataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            max_workers: default_max_workers(),
            clean_scratch: true,
            plex_rename: false,
            scratch_prefix: default_scratch_prefix(),
            poll_interval: default_poll_interval(),
            pseudo_ramp: default_pseudo_ramp(),
            use_pty: true,
            terminate_on_interrupt: false,
            media_extensions: default_media_extensions(),
            tools: ToolsConfig::default(),
            display: DisplayConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Config {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config {
                message: "max_workers must be at least 1".to_string(),
                key: Some("max_workers".to_string()),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll_interval must be greater than zero".to_string(),
                key: Some("poll_interval".to_string()),
            });
        }
        if self.scratch_prefix.is_empty() || self.scratch_prefix.contains(['/', '\\']) {
            return Err(Error::Config {
                message: format!("invalid scratch prefix {:?}", self.scratch_prefix),
                key: Some("scratch_prefix".to_string()),
            });
        }
        Ok(())
    }

    /// Whether `path` has one of the accepted media extensions
    pub fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let dotted = format!(".{}", ext.to_lowercase());
                self.media_extensions.iter().any(|m| *m == dotted)
            })
            .unwrap_or(false)
    }
}

fn default_true() -> bool {
    true
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_scratch_prefix() -> String {
    ".auntie".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_pseudo_ramp() -> Duration {
    Duration::from_secs(300)
}

fn default_media_extensions() -> Vec<String> {
    [
        ".mp4", ".m4v", ".mkv", ".mov", ".ts", ".avi", ".flv", ".wmv", ".webm", ".mpg", ".mpeg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_label_width() -> usize {
    42
}

fn default_stream_width() -> usize {
    12
}

fn default_summary_bar_width() -> usize {
    30
}

fn default_programmes_url() -> String {
    "https://www.bbc.co.uk/programmes".to_string()
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_expansion_timeout() -> Duration {
    Duration::from_secs(120)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
