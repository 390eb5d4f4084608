//! Draining tool output into the display

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::process::{AttachedProcess, OutputChunk, OutputSource};
use crate::display::{CONVERTING_STREAM, ProgressDisplay, WAITING_STREAM};
use crate::telemetry::{LineAssembler, UpdateKind, parse_line};
use crate::types::JobId;

/// How the streaming phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainOutcome {
    /// Output ended or the process exited
    Finished,
    /// The run was cancelled first
    Interrupted,
}

fn is_pseudo_stream(stream: &str) -> bool {
    stream == WAITING_STREAM || stream == CONVERTING_STREAM
}

/// Route one output line to the display
pub(crate) fn apply_line(display: &ProgressDisplay, id: &JobId, line: &str) {
    let telemetry = parse_line(line);
    if telemetry.is_ignored() {
        return;
    }
    if telemetry.post_processing {
        display.start_pseudo_stream(id, CONVERTING_STREAM);
    }
    if let Some(update) = telemetry.update {
        if update.kind == UpdateKind::Progress && !is_pseudo_stream(&update.stream) {
            display.complete_pseudo_stream(id, WAITING_STREAM);
        }
        display.upsert_progress(
            id,
            &update.stream,
            update.percent,
            Some(update.speed.as_str()).filter(|s| !s.is_empty()),
            Some(update.eta.as_str()),
        );
    }
}

/// Decodes chunks per source and feeds complete lines to the display
pub(crate) struct OutputPump<'a> {
    display: &'a ProgressDisplay,
    id: &'a JobId,
    primary: LineAssembler,
    stderr: LineAssembler,
}

impl<'a> OutputPump<'a> {
    pub(crate) fn new(display: &'a ProgressDisplay, id: &'a JobId) -> Self {
        Self {
            display,
            id,
            primary: LineAssembler::new(),
            stderr: LineAssembler::new(),
        }
    }

    pub(crate) fn feed(&mut self, chunk: OutputChunk) {
        let assembler = match chunk.source {
            OutputSource::Terminal | OutputSource::Stdout => &mut self.primary,
            OutputSource::Stderr => &mut self.stderr,
        };
        let lines = assembler.push(&chunk.bytes);
        self.tick();
        for line in lines {
            apply_line(self.display, self.id, &line);
        }
    }

    /// Advance both pseudo-streams; no-op for ones never started
    pub(crate) fn tick(&self) {
        self.display.tick_pseudo_stream(self.id, WAITING_STREAM);
        self.display.tick_pseudo_stream(self.id, CONVERTING_STREAM);
    }

    /// Flush decoders and emit any undelimited remainder
    pub(crate) fn finish(&mut self) {
        let mut lines = self.primary.finish();
        lines.extend(self.stderr.finish());
        for line in lines {
            apply_line(self.display, self.id, &line);
        }
    }
}

/// Pump output until it ends, the process exits, or `cancel` fires
///
/// Each poll interval without data counts as a tick and an exit check.
pub(crate) async fn drain(
    pump: &mut OutputPump<'_>,
    process: &mut AttachedProcess,
    poll: Duration,
    cancel: &CancellationToken,
) -> std::io::Result<DrainOutcome> {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(DrainOutcome::Interrupted),
            received = tokio::time::timeout(poll, process.output.recv()) => match received {
                Ok(Some(chunk)) => pump.feed(chunk),
                Ok(None) => return Ok(DrainOutcome::Finished),
                Err(_) => {
                    pump.tick();
                    if process.child.try_wait()?.is_some() {
                        settle(pump, process, poll).await;
                        return Ok(DrainOutcome::Finished);
                    }
                }
            },
        }
    }
}

// Output written just before exit may still be in flight
async fn settle(pump: &mut OutputPump<'_>, process: &mut AttachedProcess, poll: Duration) {
    while let Ok(Some(chunk)) = tokio::time::timeout(poll, process.output.recv()).await {
        pump.feed(chunk);
    }
}

/// Feed whatever is already queued, then flush the decoders
pub(crate) fn drain_tail(pump: &mut OutputPump<'_>, process: &mut AttachedProcess) {
    while let Ok(chunk) = process.output.try_recv() {
        pump.feed(chunk);
    }
    pump.finish();
}
