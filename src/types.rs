//! Core types for auntie

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of one job (a normalised programme PID)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exit code of a job, mirroring the external tool's OS status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobExit(pub i32);

impl JobExit {
    /// Job succeeded
    pub const SUCCESS: JobExit = JobExit(0);
    /// Generic failure
    pub const FAILURE: JobExit = JobExit(1);
    /// Executable not found
    pub const NOT_FOUND: JobExit = JobExit(127);
    /// Run was interrupted
    pub const INTERRUPTED: JobExit = JobExit(130);

    /// Raw exit code
    pub fn code(self) -> i32 {
        self.0
    }

    /// Returns `true` for a zero exit code
    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Keep a failure code, or raise success to a generic failure
    #[must_use]
    pub fn or_failure(self) -> Self {
        if self.is_success() { Self::FAILURE } else { self }
    }
}

impl From<std::process::ExitStatus> for JobExit {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self(128 + signal);
            }
        }
        Self::FAILURE
    }
}

impl std::fmt::Display for JobExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle stage of a single job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Creating the scratch directory
    AllocatingScratch,
    /// Starting the external process
    Spawning,
    /// Reading live output
    Streaming,
    /// Process exited, processing buffered output
    DrainingTail,
    /// Locating the produced media file
    ResolvingArtifact,
    /// Applying the Plex naming scheme
    Renaming,
    /// Finished
    Done,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStage::AllocatingScratch => "allocating-scratch",
            JobStage::Spawning => "spawning",
            JobStage::Streaming => "streaming",
            JobStage::DrainingTail => "draining-tail",
            JobStage::ResolvingArtifact => "resolving-artifact",
            JobStage::Renaming => "renaming",
            JobStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Final report of one job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    /// Job identifier
    pub id: JobId,
    /// Exit code, the sole source of truth for success
    pub exit: JobExit,
    /// Where the media file ended up, when one was placed
    pub artifact: Option<PathBuf>,
}

/// Aggregate status of a whole run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every job succeeded
    Success,
    /// At least one job failed; failing identifiers with their codes, in dispatch order
    Failed(Vec<(JobId, JobExit)>),
    /// The run was interrupted
    Interrupted,
}

impl RunStatus {
    /// Process exit code for the whole run
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed(_) => 1,
            RunStatus::Interrupted => 130,
        }
    }
}
