// src/exec/runner.rs

//! Merge process runner.
//!
//! One [`ProcessRunner`] drives exactly one child process. Its output is
//! pulled through [`ProcessRun::next_event`]: every line the child writes,
//! then a single [`ProcessEvent::Exited`] carrying the [`RunResult`], then
//! `None`.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::MergerunError;
use crate::request::RunRequest;
use crate::types::Level;

/// Exit code reported when the process never started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// How long to keep reading after the child exited while something (usually a
/// grandchild) still holds its output pipes open.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const LINE_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process ran and exited (successfully or not).
    Exited,
    /// The process could not be started.
    SpawnFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            outcome: RunOutcome::Exited,
        }
    }

    pub fn spawn_failed() -> Self {
        Self {
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            outcome: RunOutcome::SpawnFailed,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Exited && self.exit_code == 0
    }
}

/// Where a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
    /// Synthesized by the runner itself (spawn failures).
    Runner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub level: Level,
    pub text: String,
}

impl OutputLine {
    pub fn info(stream: OutputStream, text: impl Into<String>) -> Self {
        Self {
            stream,
            level: Level::Info,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output(OutputLine),
    Exited(RunResult),
}

/// Launches the merge tool described by a [`RunRequest`].
#[derive(Debug)]
pub struct ProcessRunner {
    request: RunRequest,
}

impl ProcessRunner {
    pub fn new(request: RunRequest) -> Self {
        Self { request }
    }

    /// Spawn the child and start draining its output.
    ///
    /// Consumes the runner. A spawn failure is not returned as an error; it
    /// shows up as one `Error` line followed by
    /// [`RunResult::spawn_failed`].
    pub fn start(self) -> ProcessRun {
        let request = self.request;
        info!(
            command = %request.command_line(),
            cwd = %request.cwd.display(),
            "starting merge process"
        );

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.cwd)
            .env_clear()
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = MergerunError::Spawn {
                    command: request.program.clone(),
                    source,
                };
                error!(error = %err, "merge process failed to start");
                return ProcessRun {
                    phase: Phase::SpawnFailed(err.to_string()),
                };
            }
        };

        let (tx, rx) = mpsc::channel::<OutputLine>(LINE_QUEUE_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, tx.clone());
        }
        // The channel closes once both readers hit EOF.
        drop(tx);

        ProcessRun {
            phase: Phase::Live(LiveChild {
                child,
                lines: rx,
                exited: None,
            }),
        }
    }
}

/// A started (or failed-to-start) merge process.
///
/// Dropping a live run kills the child.
#[derive(Debug)]
pub struct ProcessRun {
    phase: Phase,
}

#[derive(Debug)]
enum Phase {
    Live(LiveChild),
    SpawnFailed(String),
    Finished(RunResult),
    Closed,
}

impl ProcessRun {
    /// Next line of output, then the exit result, then `None`.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        loop {
            match &mut self.phase {
                Phase::Closed => return None,
                Phase::Live(live) => {
                    if let Some(line) = live.next_line().await {
                        return Some(ProcessEvent::Output(line));
                    }
                    let result = live.reap().await;
                    self.phase = Phase::Finished(result);
                }
                Phase::SpawnFailed(diagnostic) => {
                    let line = OutputLine {
                        stream: OutputStream::Runner,
                        level: Level::Error,
                        text: std::mem::take(diagnostic),
                    };
                    self.phase = Phase::Finished(RunResult::spawn_failed());
                    return Some(ProcessEvent::Output(line));
                }
                Phase::Finished(result) => {
                    let result = *result;
                    self.phase = Phase::Closed;
                    return Some(ProcessEvent::Exited(result));
                }
            }
        }
    }
}

#[derive(Debug)]
struct LiveChild {
    child: Child,
    lines: mpsc::Receiver<OutputLine>,
    /// Exit code and drain deadline, once the child has exited.
    exited: Option<(i32, Instant)>,
}

impl LiveChild {
    async fn next_line(&mut self) -> Option<OutputLine> {
        loop {
            if let Some((_, deadline)) = self.exited {
                return match tokio::time::timeout_at(deadline, self.lines.recv()).await {
                    Ok(line) => line,
                    Err(_) => {
                        warn!("output pipes still open after merge process exited; closing stream");
                        None
                    }
                };
            }

            tokio::select! {
                line = self.lines.recv() => return line,
                status = self.child.wait() => {
                    let code = exit_code(status);
                    debug!(exit_code = code, "merge process exited; draining output");
                    self.exited = Some((code, Instant::now() + DRAIN_GRACE));
                }
            }
        }
    }

    async fn reap(&mut self) -> RunResult {
        let code = match self.exited {
            Some((code, _)) => code,
            None => exit_code(self.child.wait().await),
        };

        info!(exit_code = code, success = code == 0, "merge process exited");
        RunResult::exited(code)
    }
}

fn exit_code(status: io::Result<ExitStatus>) -> i32 {
    match status {
        // Killed by a signal: no code.
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            warn!(error = %e, "waiting for merge process failed");
            -1
        }
    }
}

/// Forward every line of `reader` into `tx` until EOF.
fn spawn_reader<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = OutputLine::info(stream, normalize_line(&buf));
                    if tx.send(line).await.is_err() {
                        debug!(?stream, "line receiver dropped; stopping reader");
                        break;
                    }
                }
                Err(e) => {
                    warn!(?stream, error = %e, "reading merge process output failed");
                    break;
                }
            }
        }

        debug!(?stream, "output reader finished");
    });
}

/// Decode one raw line.
///
/// Invalid UTF-8 is replaced rather than rejected. Progress bars redraw with
/// `\r`; only the final redraw is kept.
fn normalize_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches(['\n', '\r']);
    text.rsplit('\r')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_terminators() {
        assert_eq!(normalize_line(b"hello\n"), "hello");
        assert_eq!(normalize_line(b"hello\r\n"), "hello");
        assert_eq!(normalize_line(b"no newline"), "no newline");
        assert_eq!(normalize_line(b"\n"), "");
    }

    #[test]
    fn normalize_keeps_last_progress_redraw() {
        assert_eq!(normalize_line(b" 10%|#   \r 55%|###  \r100%|#####\n"), "100%|#####");
        assert_eq!(normalize_line(b"done\r\r\n"), "done");
    }

    #[test]
    fn normalize_replaces_invalid_utf8() {
        assert_eq!(normalize_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[test]
    fn run_result_success_requires_clean_exit() {
        assert!(RunResult::exited(0).success());
        assert!(!RunResult::exited(2).success());
        assert!(!RunResult::spawn_failed().success());
        assert_eq!(RunResult::spawn_failed().exit_code, SPAWN_FAILURE_EXIT_CODE);
    }
}
