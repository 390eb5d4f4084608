//! Spawning the external tool with its output attached to a byte channel
//!
//! The tool normally writes to a pseudo-terminal so it keeps emitting live
//! progress redraws. The terminal is read on a dedicated thread and a second
//! thread waits for the exit status. With plain pipes, stdout and stderr are
//! read by two tokio tasks. Either way the bytes arrive on one [`mpsc`]
//! channel that closes when every reader is done.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::Stdio;

use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use crate::error::SpawnError;
use crate::invocation::CommandSpec;
use crate::types::JobExit;

/// Bytes requested per read
const READ_CHUNK: usize = 1024;

/// Chunks buffered between readers and the drain loop
const CHANNEL_CAPACITY: usize = 64;

/// Terminal size reported to the tool
const TERMINAL_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 200,
    pixel_width: 0,
    pixel_height: 0,
};

/// Where a chunk of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Combined output through a pseudo-terminal
    Terminal,
    Stdout,
    Stderr,
}

/// Raw bytes read from the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub source: OutputSource,
    pub bytes: Vec<u8>,
}

/// A running tool and the channel its output arrives on
#[derive(Debug)]
pub struct AttachedProcess {
    pub child: ToolProcess,
    pub output: mpsc::Receiver<OutputChunk>,
}

impl AttachedProcess {
    /// Throw away remaining output, then reap the process
    pub async fn discard_until_exit(mut self) {
        while self.output.recv().await.is_some() {}
        let _ = self.child.wait().await;
    }
}

/// Handle to the running tool, however its output is attached
#[derive(Debug)]
pub enum ToolProcess {
    /// Spawned by tokio with piped stdout and stderr
    Piped(Child),
    /// Spawned on a pseudo-terminal
    Terminal(TerminalChild),
}

impl ToolProcess {
    /// Exit code if the process has already exited
    pub fn try_wait(&mut self) -> std::io::Result<Option<JobExit>> {
        match self {
            ToolProcess::Piped(child) => Ok(child.try_wait()?.map(JobExit::from)),
            ToolProcess::Terminal(child) => child.try_wait(),
        }
    }

    /// Wait for the process to exit; cancel safe
    pub async fn wait(&mut self) -> std::io::Result<JobExit> {
        match self {
            ToolProcess::Piped(child) => child.wait().await.map(JobExit::from),
            ToolProcess::Terminal(child) => child.wait().await,
        }
    }

    /// Ask the OS to kill the process without waiting for it
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        match self {
            ToolProcess::Piped(child) => child.start_kill(),
            ToolProcess::Terminal(child) => child.killer.kill(),
        }
    }
}

/// A process on a pseudo-terminal whose exit is reported by a watcher thread
pub struct TerminalChild {
    killer: Box<dyn ChildKiller + Send + Sync>,
    exited: oneshot::Receiver<std::io::Result<JobExit>>,
    status: Option<JobExit>,
    // closing the master hangs up the terminal
    _master: Box<dyn MasterPty + Send>,
}

impl TerminalChild {
    fn try_wait(&mut self) -> std::io::Result<Option<JobExit>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        match self.exited.try_recv() {
            Ok(result) => self.record(result).map(Some),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(watcher_gone()),
        }
    }

    async fn wait(&mut self) -> std::io::Result<JobExit> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let result = (&mut self.exited).await.map_err(|_| watcher_gone())?;
        self.record(result)
    }

    fn record(&mut self, result: std::io::Result<JobExit>) -> std::io::Result<JobExit> {
        let status = result?;
        self.status = Some(status);
        Ok(status)
    }
}

impl std::fmt::Debug for TerminalChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalChild")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

fn watcher_gone() -> std::io::Error {
    std::io::Error::other("exit watcher stopped without a status")
}

fn terminal_exit(status: portable_pty::ExitStatus) -> JobExit {
    JobExit(i32::try_from(status.exit_code()).unwrap_or(JobExit::FAILURE.0))
}

/// Start `spec` in `cwd` with output attached
///
/// A missing executable maps to [`SpawnError::NotFound`]; any other OS error
/// to [`SpawnError::Failed`]. Pseudo-terminal problems are [`SpawnError::Pty`].
pub fn spawn_attached(
    spec: &CommandSpec,
    cwd: &Path,
    use_pty: bool,
    program: &str,
) -> Result<AttachedProcess, SpawnError> {
    if spec.program.is_empty() {
        return Err(SpawnError::EmptyCommand);
    }
    if use_pty {
        spawn_terminal(spec, cwd, program)
    } else {
        spawn_piped(spec, cwd, program)
    }
}

pub(crate) fn spawn_error(program: &str, error: std::io::Error) -> SpawnError {
    if error.kind() == ErrorKind::NotFound {
        SpawnError::NotFound {
            program: program.to_string(),
        }
    } else {
        SpawnError::Failed {
            program: program.to_string(),
            reason: error.to_string(),
        }
    }
}

fn spawn_piped(spec: &CommandSpec, cwd: &Path, program: &str) -> Result<AttachedProcess, SpawnError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    if let Some(stdout) = child.stdout.take() {
        forward(stdout, OutputSource::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward(stderr, OutputSource::Stderr, tx);
    }
    Ok(AttachedProcess {
        child: ToolProcess::Piped(child),
        output: rx,
    })
}

fn forward<R>(mut reader: R, source: OutputSource, tx: mpsc::Sender<OutputChunk>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = OutputChunk {
                        source,
                        bytes: buf[..n].to_vec(),
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(?source, error = %e, "output pipe closed with error");
                    break;
                }
            }
        }
    });
}

fn spawn_terminal(
    spec: &CommandSpec,
    cwd: &Path,
    program: &str,
) -> Result<AttachedProcess, SpawnError> {
    // The pty spawner reports a missing program as an opaque error
    if which::which_in(&spec.program, std::env::var_os("PATH"), cwd).is_err() {
        return Err(SpawnError::NotFound {
            program: program.to_string(),
        });
    }

    let pair = native_pty_system()
        .openpty(TERMINAL_SIZE)
        .map_err(|e| SpawnError::Pty(e.to_string()))?;

    let mut command = CommandBuilder::new(&spec.program);
    command.args(&spec.args);
    command.cwd(cwd);
    let mut child = pair
        .slave
        .spawn_command(command)
        .map_err(|e| SpawnError::Failed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
    // only the child keeps the slave side open, so the reader sees the end
    drop(pair.slave);

    let killer = child.clone_killer();
    let pid = child.process_id().unwrap_or_default();
    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SpawnError::Pty(e.to_string()))?;

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    // Detached threads: an abandoned tool must not hold up runtime shutdown
    std::thread::Builder::new()
        .name(format!("pty-reader-{pid}"))
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = OutputChunk {
                            source: OutputSource::Terminal,
                            bytes: buf[..n].to_vec(),
                        };
                        if tx.blocking_send(chunk).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    // EIO once the slave side is fully closed
                    Err(_) => break,
                }
            }
        })
        .map_err(|e| SpawnError::Pty(e.to_string()))?;

    let (exit_tx, exit_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name(format!("pty-wait-{pid}"))
        .spawn(move || {
            let _ = exit_tx.send(child.wait().map(terminal_exit));
        })
        .map_err(|e| SpawnError::Pty(e.to_string()))?;

    Ok(AttachedProcess {
        child: ToolProcess::Terminal(TerminalChild {
            killer,
            exited: exit_rx,
            status: None,
            _master: pair.master,
        }),
        output: rx,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn collect(mut attached: AttachedProcess) -> (Vec<u8>, JobExit) {
        let mut bytes = Vec::new();
        while let Some(chunk) = attached.output.recv().await {
            bytes.extend(chunk.bytes);
        }
        let status = attached.child.wait().await.unwrap();
        (bytes, status)
    }

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let spec = CommandSpec::new("/nonexistent/auntie-test-tool", Vec::new());
        for use_pty in [false, true] {
            let err = spawn_attached(&spec, Path::new("."), use_pty, "get_iplayer").unwrap_err();
            if matches!(err, SpawnError::Pty(_)) {
                // no pseudo-terminals in this environment
                continue;
            }
            assert!(matches!(err, SpawnError::NotFound { .. }), "{err:?}");
            assert_eq!(err.to_string(), "get_iplayer command not found");
        }
    }

    #[tokio::test]
    async fn test_empty_command() {
        let spec = CommandSpec::new("", Vec::new());
        let err = spawn_attached(&spec, Path::new("."), false, "tool").unwrap_err();
        assert!(matches!(err, SpawnError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_pipes_carry_both_streams() {
        let attached = spawn_attached(
            &sh("printf out; printf err >&2; exit 3"),
            Path::new("."),
            false,
            "sh",
        )
        .unwrap();
        let (bytes, status) = collect(attached).await;
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
        assert_eq!(status, JobExit(3));
    }

    #[tokio::test]
    async fn test_pty_channel_closes_after_exit() {
        let attached = match spawn_attached(&sh("printf 'hello\\n'"), Path::new("."), true, "sh") {
            Err(SpawnError::Pty(_)) => return,
            other => other.unwrap(),
        };
        let (bytes, status) = collect(attached).await;
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("hello"));
        assert_eq!(status, JobExit::SUCCESS);
    }

    #[tokio::test]
    async fn test_pty_reports_exit_code_and_kill() {
        let mut attached = match spawn_attached(&sh("exit 4"), Path::new("."), true, "sh") {
            Err(SpawnError::Pty(_)) => return,
            other => other.unwrap(),
        };
        assert_eq!(attached.child.wait().await.unwrap(), JobExit(4));
        // the status stays available after it was consumed
        assert_eq!(attached.child.try_wait().unwrap(), Some(JobExit(4)));

        let mut sleeper = spawn_attached(&sh("sleep 5"), Path::new("."), true, "sh").unwrap();
        assert_eq!(sleeper.child.try_wait().unwrap(), None);
        sleeper.child.start_kill().unwrap();
        let exit = tokio::time::timeout(std::time::Duration::from_secs(3), sleeper.child.wait())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(exit, JobExit::SUCCESS);
    }
}
