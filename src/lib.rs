//! # auntie
//!
//! Parallel get_iplayer downloads with a multiplexed live progress display.
//!
//! ## Design Philosophy
//!
//! auntie is designed to be:
//! - **One row per stream** - every job's video, audio and bootstrap phases get their own stable row
//! - **Failure-isolated** - a job that fails, panics or is missing its tool never disturbs its siblings
//! - **Clean on exit** - the live display is always replaced by a static summary before any error text
//! - **Tool-agnostic at the seams** - the external command and metadata lookups sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use auntie::{BbcProgrammes, Config, GetIplayer, MetadataCache, Orchestrator, ProgressDisplay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let display = Arc::new(ProgressDisplay::new(&config));
//!     let metadata = Arc::new(MetadataCache::new(Arc::new(BbcProgrammes::new(&config.metadata)?)));
//!     let invocation = Arc::new(GetIplayer::new(&config.tools));
//!
//!     let orchestrator = Orchestrator::new(config, display, invocation, metadata);
//!     let jobs = orchestrator.expand(&["b006q2x0".to_string()]).await;
//!     orchestrator.register(&jobs).await;
//!
//!     let report = orchestrator.run(jobs, auntie::wait_for_interrupt()).await;
//!     for line in report.summary.iter().chain(report.messages().iter()) {
//!         println!("{line}");
//!     }
//!     std::process::exit(report.exit_code());
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Multiplexed live progress display
pub mod display;
/// Error types
pub mod error;
/// Building the external command line
pub mod invocation;
/// Per-job execution
pub mod job;
/// Tracing subscriber for the binary
pub mod logging;
/// Programme metadata and identifier handling
pub mod metadata;
/// Bounded worker pool for a whole run
pub mod orchestrator;
/// Parsing get_iplayer output
pub mod telemetry;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DisplayConfig, MetadataConfig, ToolsConfig};
pub use display::{ColourStyle, ProgressDisplay, RowSnapshot};
pub use error::{ArtifactError, Error, Result, SpawnError, ToExitCode};
pub use invocation::{CommandSpec, GetIplayer, Invocation};
pub use job::{JobContext, run_job};
pub use metadata::{
    BbcProgrammes, EpisodeMetadata, MetadataCache, MetadataSource, NoMetadata, normalise_pid,
};
pub use orchestrator::{Orchestrator, RunReport};
pub use types::{JobExit, JobId, JobReport, JobStage, RunStatus};

/// Resolve when the process is asked to stop.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Pass it as the `shutdown` future of [`Orchestrator::run`].
#[cfg(unix)]
pub async fn wait_for_interrupt() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::debug!("received SIGTERM"),
                _ = sigint.recv() => tracing::debug!("received SIGINT"),
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler; waiting for SIGINT only");
            interrupt_fallback().await;
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler; falling back to ctrl_c");
            interrupt_fallback().await;
        }
    }
}

#[cfg(unix)]
async fn interrupt_fallback() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for Ctrl+C; interrupts are disabled");
        std::future::pending::<()>().await;
    }
}

/// Resolve when the process is asked to stop.
///
/// Listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(not(unix))]
pub async fn wait_for_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::debug!("received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "could not listen for Ctrl+C; interrupts are disabled");
            std::future::pending::<()>().await;
        }
    }
}
