//! Error types for auntie
//!
//! Errors are grouped by the phase of a job that produces them:
//! - spawn-time failures ([`SpawnError`]) end a single job before any output is read
//! - artifact failures ([`ArtifactError`]) downgrade a job whose process reported success
//! - everything else (configuration, I/O, metadata lookups) lives on [`Error`]
//!
//! Per-job errors never cross job boundaries. A job converts its error into an exit
//! code through [`ToExitCode`] and the orchestrator aggregates those codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::JobExit;

/// Result type alias for auntie operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for auntie
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_workers")
        key: Option<String>,
    },

    /// The external process could not be started
    #[error("spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// The process finished but its output could not be placed
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Scratch directory could not be allocated
    #[error("scratch directory error under {parent}: {reason}")]
    Scratch {
        /// Directory the scratch directory was to be created in
        parent: PathBuf,
        /// Why allocation failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while talking to the programmes API
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed metadata payload
    #[error("invalid metadata for {pid}: {reason}")]
    Metadata {
        /// Identifier whose metadata was requested
        pid: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failures while starting the external process
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Executable does not exist
    #[error("{program} command not found")]
    NotFound {
        /// Program that was looked up
        program: String,
    },

    /// The OS refused to start the process
    #[error("failed to start {program}: {reason}")]
    Failed {
        /// Program that failed to start
        program: String,
        /// OS-level reason
        reason: String,
    },

    /// No pseudo-terminal could be allocated
    #[error("unable to allocate pty: {0}")]
    Pty(String),

    /// The command vector was empty
    #[error("empty command")]
    EmptyCommand,
}

/// Failures after the process exits, while resolving and placing its output
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The scratch directory is gone
    #[error("download directory not found")]
    ScratchMissing {
        /// Where the scratch directory was expected
        expected: PathBuf,
    },

    /// No media file qualified
    #[error("no video file found in download directory")]
    NoMediaFile {
        /// Directory that was searched
        directory: PathBuf,
    },

    /// Moving the media file out of the scratch directory failed
    #[error("failed to move {} to {}: {reason}", source_path.display(), dest_path.display())]
    MoveFailed {
        /// Where the file was
        source_path: PathBuf,
        /// Where it was going
        dest_path: PathBuf,
        /// Why the move failed
        reason: String,
    },

    /// Renaming the placed file failed
    #[error("failed to rename {} -> {}: {reason}", source_path.display(), dest_path.display())]
    RenameFailed {
        /// Current file path
        source_path: PathBuf,
        /// Requested new path
        dest_path: PathBuf,
        /// Why the rename failed
        reason: String,
    },

    /// No free "name (n).ext" variant exists
    #[error("file collision at {}: {reason}", path.display())]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision
        reason: String,
    },

    /// Path has no usable file name or parent
    #[error("invalid path {}: {reason}", path.display())]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

/// Map errors to the exit code a job reports for them
pub trait ToExitCode {
    /// Exit code for this error
    fn exit_code(&self) -> JobExit;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> JobExit {
        match self {
            Error::Spawn(e) => e.exit_code(),
            _ => JobExit::FAILURE,
        }
    }
}

impl ToExitCode for SpawnError {
    fn exit_code(&self) -> JobExit {
        match self {
            SpawnError::NotFound { .. } => JobExit::NOT_FOUND,
            _ => JobExit::FAILURE,
        }
    }
}
