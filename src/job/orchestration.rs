//! Job orchestration: the full lifecycle of one download

use std::path::PathBuf;

use super::context::JobContext;
use super::finalization::place_artifact;
use super::process::{AttachedProcess, spawn_attached};
use super::scratch::ScratchDir;
use super::stream::{DrainOutcome, OutputPump, drain, drain_tail};
use crate::display::WAITING_STREAM;
use crate::error::ToExitCode;
use crate::types::{JobExit, JobReport, JobStage};

/// Run one job to completion and report its exit code
///
/// Stages:
/// 1. Allocate a fresh scratch directory
/// 2. Spawn the external tool with its output attached
/// 3. Stream output into the display until the tool exits
/// 4. Drain the tail and wait for the exit status
/// 5. Resolve and place the media file, optionally renaming it
///
/// Errors never escape: each one becomes this job's exit code and a single
/// diagnostic line. The scratch directory is removed afterwards when
/// configured, whatever the outcome.
pub async fn run_job(ctx: JobContext) -> JobReport {
    super::enter(&ctx, JobStage::AllocatingScratch);
    let scratch = match ScratchDir::allocate(
        &ctx.config.work_dir,
        &ctx.config.scratch_prefix,
        &ctx.id,
        &ctx.tokens,
    )
    .await
    {
        Ok(scratch) => scratch,
        Err(e) => {
            tracing::error!(job = %ctx.id, error = %e, "failed to allocate scratch directory");
            ctx.report(format!("unable to create download directory ({e})"));
            return JobReport {
                id: ctx.id.clone(),
                exit: e.exit_code(),
                artifact: None,
            };
        }
    };

    let (exit, artifact, located) = execute(&ctx, &scratch).await;

    if ctx.config.clean_scratch {
        scratch.cleanup(located.as_deref()).await;
    }
    super::enter(&ctx, JobStage::Done);
    tracing::debug!(job = %ctx.id, exit = %exit, "job finished");

    JobReport {
        id: ctx.id.clone(),
        exit,
        artifact,
    }
}

async fn execute(
    ctx: &JobContext,
    scratch: &ScratchDir,
) -> (JobExit, Option<PathBuf>, Option<PathBuf>) {
    super::enter(ctx, JobStage::Spawning);
    let spec = ctx.invocation.download_command(&ctx.id, scratch.path());
    tracing::debug!(job = %ctx.id, command = %spec.display(), "launching download");

    let mut process = match spawn_attached(
        &spec,
        &ctx.config.work_dir,
        ctx.config.use_pty,
        ctx.invocation.program_name(),
    ) {
        Ok(process) => process,
        Err(e) => {
            tracing::debug!(job = %ctx.id, error = %e, "spawn failed");
            ctx.report(&e);
            return (e.exit_code(), None, None);
        }
    };

    super::enter(ctx, JobStage::Streaming);
    ctx.display.start_pseudo_stream(&ctx.id, WAITING_STREAM);
    let mut pump = OutputPump::new(&ctx.display, &ctx.id);
    let outcome = drain(
        &mut pump,
        &mut process,
        ctx.config.poll_interval,
        &ctx.cancel,
    )
    .await
    .unwrap_or_else(|e| {
        tracing::warn!(job = %ctx.id, error = %e, "lost track of process while streaming");
        DrainOutcome::Finished
    });
    if outcome == DrainOutcome::Interrupted {
        abandon(ctx, process);
        return (JobExit::INTERRUPTED, None, None);
    }

    super::enter(ctx, JobStage::DrainingTail);
    drain_tail(&mut pump, &mut process);
    let waited = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        status = process.child.wait() => Some(status),
    };
    let Some(status) = waited else {
        abandon(ctx, process);
        return (JobExit::INTERRUPTED, None, None);
    };
    let exit = status.unwrap_or_else(|e| {
        tracing::warn!(job = %ctx.id, error = %e, "failed to wait for process");
        JobExit::FAILURE
    });
    tracing::debug!(job = %ctx.id, exit = %exit, "process exited");
    ctx.display.mark_job_complete(&ctx.id);

    let placement = place_artifact(ctx, scratch, exit).await;
    (placement.exit, placement.artifact, placement.located)
}

/// Leave an interrupted process behind, killing it only when configured to
///
/// A process left running keeps its output drained until it exits so it
/// never stalls on a full terminal.
fn abandon(ctx: &JobContext, mut process: AttachedProcess) {
    if !ctx.config.terminate_on_interrupt {
        tracing::debug!(job = %ctx.id, "interrupted; leaving process running");
        tokio::spawn(process.discard_until_exit());
        return;
    }
    match process.child.start_kill() {
        Ok(()) => tracing::debug!(job = %ctx.id, "interrupted; killed process"),
        Err(e) => tracing::debug!(job = %ctx.id, error = %e, "failed to kill process"),
    }
}
