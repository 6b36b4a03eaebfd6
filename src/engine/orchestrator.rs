// src/engine/orchestrator.rs

//! Async shell around the invocation state machine.
//!
//! [`Orchestrator::invoke`] spawns one Tokio task per invocation. That task
//! validates, prepares the workspace, drives the process backend and copies
//! the artifacts, reporting everything through an [`EventSink`]. The caller
//! pulls the events from the returned [`Invocation`].
//!
//! Errors never escape the task: each one becomes a final `Error` event and a
//! terminal [`InvocationState`].

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::errors::{MergerunError, Result};
use crate::events::{EventSink, LogEvent, StreamClosed};
use crate::exec::{
    ProcessBackend, ProcessEvent, RealProcessBackend, RunOutcome, RunResult,
    SPAWN_FAILURE_EXIT_CODE,
};
use crate::materialize::{self, Materialization};
use crate::request::{PreparedRun, RunRequest, RunRequestBuilder, Workspace};
use crate::settings::Settings;
use crate::types::Accelerator;

use super::state::{IllegalTransition, InvocationState, Signal};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Entry point for running merges.
///
/// Invocations share on-disk caches and the working directory namespace, so
/// at most one runs at a time per orchestrator; later ones wait their turn.
#[derive(Clone)]
pub struct Orchestrator {
    builder: RunRequestBuilder,
    backend: Arc<dyn ProcessBackend>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Production orchestrator spawning real processes.
    pub fn new(settings: &Settings, accelerator: Accelerator) -> Self {
        Self::with_backend(
            RunRequestBuilder::new(settings, accelerator),
            Arc::new(RealProcessBackend),
        )
    }

    pub fn with_backend(builder: RunRequestBuilder, backend: Arc<dyn ProcessBackend>) -> Self {
        Self {
            builder,
            backend,
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Start an invocation. Must be called from within a Tokio runtime.
    ///
    /// Dropping the returned [`Invocation`] abandons the run: the task stops
    /// at its next event, the merge process (if any) is killed and the
    /// workspace removed.
    pub fn invoke(&self, raw_text: impl Into<String>, destination: Option<String>) -> Invocation {
        let raw_text = raw_text.into();
        let (tx, rx) = mpsc::channel::<LogEvent>(EVENT_CHANNEL_CAPACITY);

        let builder = self.builder.clone();
        let backend = Arc::clone(&self.backend);
        let permits = Arc::clone(&self.permits);

        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "invocation gate closed");
                    return InvocationState::Idle;
                }
            };

            let driver = Driver {
                sink: EventSink::new(tx),
                state: InvocationState::Idle,
                builder,
                backend,
            };
            driver.drive(&raw_text, destination.as_deref()).await
        });

        Invocation { events: rx, handle }
    }
}

/// Caller side of one invocation.
#[derive(Debug)]
pub struct Invocation {
    events: mpsc::Receiver<LogEvent>,
    handle: JoinHandle<InvocationState>,
}

impl Invocation {
    /// Next event, or `None` once the invocation reached a terminal state.
    pub async fn next_event(&mut self) -> Option<LogEvent> {
        self.events.recv().await
    }

    /// Discard any remaining events and return the final state.
    pub async fn finish(mut self) -> Result<InvocationState> {
        while self.events.recv().await.is_some() {}
        self.handle
            .await
            .map_err(|e| MergerunError::Other(anyhow::Error::from(e)))
    }

    /// Gather every remaining event together with the final state.
    pub async fn collect(mut self) -> Result<(Vec<LogEvent>, InvocationState)> {
        let mut events = Vec::new();
        while let Some(ev) = self.events.recv().await {
            events.push(ev);
        }
        let state = self
            .handle
            .await
            .map_err(|e| MergerunError::Other(anyhow::Error::from(e)))?;
        Ok((events, state))
    }
}

/// Why the driver stopped before reaching a terminal state.
#[derive(Debug)]
enum Stop {
    Abandoned,
    Illegal(IllegalTransition),
}

impl From<StreamClosed> for Stop {
    fn from(_: StreamClosed) -> Self {
        Stop::Abandoned
    }
}

impl From<IllegalTransition> for Stop {
    fn from(e: IllegalTransition) -> Self {
        Stop::Illegal(e)
    }
}

type Step = std::result::Result<(), Stop>;

struct Driver {
    sink: EventSink,
    state: InvocationState,
    builder: RunRequestBuilder,
    backend: Arc<dyn ProcessBackend>,
}

impl Driver {
    async fn drive(mut self, raw_text: &str, destination: Option<&str>) -> InvocationState {
        match self.run(raw_text, destination).await {
            Ok(()) => info!(state = ?self.state, "invocation finished"),
            Err(Stop::Abandoned) => warn!(
                state = ?self.state,
                "event stream dropped by consumer; invocation abandoned"
            ),
            Err(Stop::Illegal(e)) => error!(error = %e, "invocation state machine violated"),
        }
        self.state
    }

    fn advance(&mut self, signal: Signal) -> Step {
        let next = self.state.advance(signal)?;
        debug!(from = ?self.state, to = ?next, ?signal, "invocation transition");
        self.state = next;
        Ok(())
    }

    async fn run(&mut self, raw_text: &str, destination: Option<&str>) -> Step {
        self.sink.info("Validating merge configuration.").await?;
        self.advance(Signal::Start)?;

        let config = match config::validate(raw_text) {
            Ok(config) => config,
            Err(err) => {
                self.sink.error(format!("Invalid yaml: {err}")).await?;
                return self.advance(Signal::ConfigRejected);
            }
        };

        let prepared = match self.builder.build(&config, destination) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.sink
                    .error(format!("Failed to prepare workspace: {err}"))
                    .await?;
                return self.advance(Signal::WorkspaceFailed);
            }
        };

        let PreparedRun {
            workspace,
            request,
            config_path,
            destination,
            destination_generated,
        } = prepared;

        let step = self
            .run_prepared(&workspace, request, &config_path, &destination, destination_generated)
            .await;
        workspace.close();
        step
    }

    async fn run_prepared(
        &mut self,
        workspace: &Workspace,
        request: RunRequest,
        config_path: &Path,
        destination: &Path,
        destination_generated: bool,
    ) -> Step {
        self.sink
            .info(format!("Merge configuration saved in {}", config_path.display()))
            .await?;
        if destination_generated {
            self.sink
                .info("No local path provided. Generating a random folder name.")
                .await?;
        }
        self.advance(Signal::WorkspaceReady)?;

        self.sink
            .info(format!("Running: {}", request.command_line()))
            .await?;
        self.advance(Signal::Launch)?;

        let result = self.stream_process(request).await?;

        if result.outcome == RunOutcome::SpawnFailed {
            // The backend already reported the cause as an Error line.
            return self.advance(Signal::SpawnFailed);
        }

        let code = result.exit_code;
        self.sink
            .info(format!("Merge process exited with code {code}."))
            .await?;
        self.advance(Signal::ChildExited)?;

        if code != 0 {
            self.sink
                .error(MergerunError::NonZeroExit(code).to_string())
                .await?;
            return self.advance(Signal::ExitChecked { exit_code: code });
        }

        self.sink
            .info("Model merged successfully. Saving to local path.")
            .await?;
        self.advance(Signal::ExitChecked { exit_code: 0 })?;

        self.copy_artifacts(workspace.merged_dir(), destination).await
    }

    /// Forward process output until the backend reports the exit.
    async fn stream_process(&mut self, request: RunRequest) -> std::result::Result<RunResult, Stop> {
        let mut process = self.backend.start(request);

        loop {
            let event = tokio::select! {
                event = process.next_event() => event,
                _ = self.sink.closed() => return Err(Stop::Abandoned),
            };

            match event {
                Some(ProcessEvent::Output(line)) => self.sink.emit(line.level, line.text).await?,
                Some(ProcessEvent::Exited(result)) => return Ok(result),
                None => {
                    warn!("process backend closed without reporting an exit");
                    return Ok(RunResult::exited(SPAWN_FAILURE_EXIT_CODE));
                }
            }
        }
    }

    async fn copy_artifacts(&mut self, source: &Path, destination: &Path) -> Step {
        let (src, dst) = (source.to_path_buf(), destination.to_path_buf());
        let mut copy = match blocking(move || materialize::materialize(src, dst)).await {
            Ok(Ok(copy)) => copy,
            Ok(Err(err)) | Err(err) => return self.copy_failed(err).await,
        };

        loop {
            let (returned, step) = match blocking(move || next_copy(copy)).await {
                Ok(pair) => pair,
                Err(err) => return self.copy_failed(err).await,
            };
            copy = returned;

            match step {
                Some(Ok(file)) => self.sink.info(file.message()).await?,
                Some(Err(err)) => return self.copy_failed(err).await,
                None => break,
            }
        }

        self.sink
            .info(materialize::success_message(destination))
            .await?;
        self.advance(Signal::CopyFinished)
    }

    async fn copy_failed(&mut self, err: MergerunError) -> Step {
        self.sink
            .error(format!("Failed to save merged model: {err}"))
            .await?;
        self.advance(Signal::CopyFailed)
    }
}

fn next_copy(
    mut copy: Materialization,
) -> (Materialization, Option<Result<materialize::CopiedFile>>) {
    let step = copy.next();
    (copy, step)
}

/// Run filesystem work off the async worker threads.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MergerunError::Other(anyhow::Error::from(e)))
}
