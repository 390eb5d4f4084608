//! Orchestrator: runs every job of a download run on a bounded worker pool
//!
//! Jobs are registered with the display in dispatch order, spawned onto a
//! [`JoinSet`] and admitted through a [`Semaphore`] sized by
//! `Config::max_workers`. An interrupt cancels the shared token: jobs still
//! waiting for a permit never start and running jobs stop at their next poll
//! boundary. The display is finalized exactly once, after every task is back.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::display::{ProgressDisplay, cycle_colours};
use crate::invocation::Invocation;
use crate::job::{JobContext, TokenSource, random_tokens, run_job};
use crate::metadata::{MetadataCache, expand_identifiers, program_label};
use crate::types::{JobExit, JobId, JobReport, RunStatus};

/// Line printed when the run was interrupted
pub const INTERRUPTED_MESSAGE: &str = "Downloads interrupted by user";

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Aggregate status
    pub status: RunStatus,
    /// Per-job reports in dispatch order
    pub jobs: Vec<JobReport>,
    /// Static summary lines that replaced the live display
    pub summary: Vec<String>,
}

impl RunReport {
    /// Status lines printed after the summary
    pub fn messages(&self) -> Vec<String> {
        match &self.status {
            RunStatus::Success => Vec::new(),
            RunStatus::Interrupted => vec![INTERRUPTED_MESSAGE.to_string()],
            RunStatus::Failed(failures) => failures
                .iter()
                .map(|(id, exit)| format!("{id}: download failed with exit code {exit}"))
                .collect(),
        }
    }

    /// Process exit code for the run
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// Drives one run of downloads
pub struct Orchestrator {
    config: Arc<Config>,
    display: Arc<ProgressDisplay>,
    invocation: Arc<dyn Invocation>,
    metadata: Arc<MetadataCache>,
    tokens: TokenSource,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator for `config`
    pub fn new(
        config: Config,
        display: Arc<ProgressDisplay>,
        invocation: Arc<dyn Invocation>,
        metadata: Arc<MetadataCache>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            display,
            invocation,
            metadata,
            tokens: random_tokens(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the scratch token source
    pub fn with_tokens(mut self, tokens: TokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    /// Token that interrupts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Normalise and expand raw identifiers into the jobs to run
    ///
    /// Without metadata lookups identifiers are only normalised and
    /// de-duplicated.
    pub async fn expand(&self, raw: &[String]) -> Vec<JobId> {
        if self.config.metadata.enabled {
            expand_identifiers(
                self.metadata.source().as_ref(),
                Some(self.invocation.as_ref()),
                raw,
                self.config.metadata.expansion_timeout,
            )
            .await
        } else {
            expand_identifiers(
                &crate::metadata::NoMetadata,
                None,
                raw,
                self.config.metadata.timeout,
            )
            .await
        }
    }

    /// Register labels and colours for `ids`, in order
    pub async fn register(&self, ids: &[JobId]) {
        let labels: Vec<Option<String>> = if self.config.metadata.enabled {
            join_all(ids.iter().map(|id| async move {
                let metadata = self.metadata.get(id.as_str()).await;
                Some(program_label(
                    id.as_str(),
                    &metadata,
                    self.config.display.label_width,
                ))
            }))
            .await
        } else {
            vec![None; ids.len()]
        };

        for ((id, label), colour) in ids.iter().zip(labels).zip(cycle_colours()) {
            self.display.register_job(id, label, colour);
        }
    }

    /// Run every job in `ids` until all finish or `shutdown` resolves
    ///
    /// Jobs must already be registered for their rows to appear in dispatch
    /// order; see [`Orchestrator::register`].
    pub async fn run<F>(&self, ids: Vec<JobId>, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let workers = self.config.max_workers.max(1);
        let permits = Arc::new(Semaphore::new(workers));
        tracing::debug!(jobs = ids.len(), workers, "starting run");

        let mut tasks = JoinSet::new();
        for (index, id) in ids.iter().enumerate() {
            let ctx = JobContext {
                id: id.clone(),
                config: Arc::clone(&self.config),
                display: Arc::clone(&self.display),
                invocation: Arc::clone(&self.invocation),
                metadata: Arc::clone(&self.metadata),
                cancel: self.cancel.clone(),
                tokens: Arc::clone(&self.tokens),
            };
            let permits = Arc::clone(&permits);
            tasks.spawn(async move { (index, run_admitted(ctx, permits).await) });
        }

        let mut reports: Vec<Option<JobReport>> = vec![None; ids.len()];
        let mut interrupted = false;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown, if !interrupted => {
                    interrupted = true;
                    tracing::info!("interrupt received; stopping downloads");
                    self.cancel.cancel();
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, report))) => reports[index] = Some(report),
                    Some(Err(e)) => tracing::error!(error = %e, "job task failed"),
                    None => break,
                },
            }
        }
        let interrupted = interrupted || self.cancel.is_cancelled();

        let jobs: Vec<JobReport> = reports
            .into_iter()
            .zip(ids)
            .map(|(report, id)| {
                report.unwrap_or(JobReport {
                    id,
                    exit: JobExit::FAILURE,
                    artifact: None,
                })
            })
            .collect();

        let summary = self.display.finalize();
        let failures: Vec<(JobId, JobExit)> = jobs
            .iter()
            .filter(|job| !job.exit.is_success())
            .map(|job| (job.id.clone(), job.exit))
            .collect();
        let status = if interrupted {
            RunStatus::Interrupted
        } else if failures.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Failed(failures)
        };
        tracing::debug!(?status, "run finished");

        RunReport {
            status,
            jobs,
            summary,
        }
    }
}

/// Wait for a worker permit, then run the job with panics contained
async fn run_admitted(ctx: JobContext, permits: Arc<Semaphore>) -> JobReport {
    let id = ctx.id.clone();
    let permit = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        permit = permits.acquire_owned() => permit.ok(),
    };
    let Some(_permit) = permit else {
        tracing::debug!(job = %id, "not started; run interrupted");
        return JobReport {
            id,
            exit: JobExit::INTERRUPTED,
            artifact: None,
        };
    };

    match AssertUnwindSafe(run_job(ctx)).catch_unwind().await {
        Ok(report) => report,
        Err(_) => {
            tracing::error!(job = %id, "job panicked");
            JobReport {
                id,
                exit: JobExit::FAILURE,
                artifact: None,
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("max_workers", &self.config.max_workers)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::invocation::CommandSpec;
    use crate::metadata::NoMetadata;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    /// `$1` is the output directory, `$2` the identifier
    const SCRIPT: &str = r#"
case "$2" in
  b0000001) printf ' 50.0%% @ 1.0Mb/s ETA: 00:00:05 [video]\n'; printf 'v' > "$1/one.mp4" ;;
  b0000002) printf 'v' > "$1/two.mp4" ;;
  b0000003) exit 3 ;;
  b0000004|b0000006) sleep 5 ;;
esac
"#;

    struct FakeTool;

    impl Invocation for FakeTool {
        fn program_name(&self) -> &str {
            "get_iplayer"
        }

        fn download_command(&self, id: &JobId, output_dir: &Path) -> CommandSpec {
            if id == "b0000099" {
                panic!("invocation exploded");
            }
            CommandSpec::new(
                "sh",
                vec![
                    "-c".to_string(),
                    SCRIPT.to_string(),
                    "sh".to_string(),
                    output_dir.to_string_lossy().into_owned(),
                    id.to_string(),
                ],
            )
        }
    }

    fn orchestrator(dir: &Path, max_workers: usize) -> Orchestrator {
        let mut config = Config::default();
        config.work_dir = dir.to_path_buf();
        config.max_workers = max_workers;
        config.use_pty = false;
        config.poll_interval = Duration::from_millis(20);
        config.terminate_on_interrupt = true;
        config.display.hidden = true;
        config.metadata.enabled = false;
        Orchestrator::new(
            config,
            Arc::new(ProgressDisplay::hidden()),
            Arc::new(FakeTool),
            Arc::new(MetadataCache::new(Arc::new(NoMetadata))),
        )
    }

    fn ids(values: &[&str]) -> Vec<JobId> {
        values.iter().map(|v| JobId::from(*v)).collect()
    }

    #[tokio::test]
    async fn test_all_jobs_succeed() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), 2);
        let jobs = ids(&["b0000001", "b0000002"]);
        orchestrator.register(&jobs).await;

        let report = orchestrator.run(jobs, std::future::pending()).await;

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.exit_code(), 0);
        assert!(report.messages().is_empty());
        assert!(temp.path().join("one.mp4").exists());
        assert!(temp.path().join("two.mp4").exists());
        // rows for both jobs, registered order first
        assert!(report.summary[0].starts_with("b0000001: "));
        assert!(report.summary.iter().any(|l| l.starts_with("b0000002: ")));
    }

    #[tokio::test]
    async fn test_failures_are_listed_in_dispatch_order() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), 1);
        let jobs = ids(&["b0000003", "b0000001", "b0000005"]);

        let report = orchestrator.run(jobs, std::future::pending()).await;

        assert_eq!(
            report.status,
            RunStatus::Failed(vec![
                (JobId::from("b0000003"), JobExit(3)),
                (JobId::from("b0000005"), JobExit::FAILURE),
            ])
        );
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.messages(),
            vec![
                "b0000003: download failed with exit code 3".to_string(),
                "b0000005: download failed with exit code 1".to_string(),
            ]
        );
        assert_eq!(report.jobs[1].exit, JobExit::SUCCESS);
    }

    #[tokio::test]
    async fn test_panicking_job_fails_alone() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), 2);
        let jobs = ids(&["b0000099", "b0000002"]);

        let report = orchestrator.run(jobs, std::future::pending()).await;

        assert_eq!(
            report.status,
            RunStatus::Failed(vec![(JobId::from("b0000099"), JobExit::FAILURE)])
        );
        assert!(temp.path().join("two.mp4").exists());
    }

    #[tokio::test]
    async fn test_interrupt_stops_the_run() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), 1);
        let jobs = ids(&["b0000004", "b0000006"]);

        let report = tokio::time::timeout(
            Duration::from_secs(4),
            orchestrator.run(jobs, tokio::time::sleep(Duration::from_millis(200))),
        )
        .await
        .unwrap();

        assert_eq!(report.status, RunStatus::Interrupted);
        assert_eq!(report.exit_code(), 130);
        assert_eq!(report.messages(), vec![INTERRUPTED_MESSAGE.to_string()]);
        // one job was stopped mid-download, the other never got a permit
        assert!(report.jobs.iter().all(|j| j.exit == JobExit::INTERRUPTED));
    }

    #[tokio::test]
    async fn test_finalize_happens_once() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), 1);
        let report = orchestrator
            .run(ids(&["b0000002"]), std::future::pending())
            .await;
        assert!(!report.summary.is_empty());
        assert!(orchestrator.display.finalize().is_empty());
    }

    #[tokio::test]
    async fn test_expand_without_metadata_normalises() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(temp.path(), 1);
        let raw = vec![
            "https://www.bbc.co.uk/iplayer/episode/b0000001/some-show".to_string(),
            "B0000001".to_string(),
            "b0000002".to_string(),
        ];
        assert_eq!(
            orchestrator.expand(&raw).await,
            ids(&["b0000001", "b0000002"])
        );
    }
}
