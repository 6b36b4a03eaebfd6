use std::collections::VecDeque;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mergerun::exec::{
    OutputLine, OutputStream, ProcessBackend, ProcessEvent, ProcessHandle, RunResult,
};
use mergerun::request::RunRequest;
use mergerun::types::Level;

/// A fake process backend that:
/// - records every `RunRequest` it was asked to start
/// - writes scripted artifacts into the request's working directory, the way
///   the merge tool would
/// - replays scripted output lines and an exit code
#[derive(Clone, Default)]
pub struct FakeBackend {
    lines: Vec<String>,
    exit_code: i32,
    artifacts: Vec<(PathBuf, Vec<u8>)>,
    spawn_error: Option<String>,
    delay: Option<Duration>,
    started: Arc<Mutex<Vec<RunRequest>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// File the fake tool "produces", relative to its working directory.
    pub fn with_artifact(mut self, relative: &str, contents: &[u8]) -> Self {
        self.artifacts.push((PathBuf::from(relative), contents.to_vec()));
        self
    }

    pub fn exiting_with(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Behave like an executable that cannot be started.
    pub fn failing_to_spawn(mut self, diagnostic: &str) -> Self {
        self.spawn_error = Some(diagnostic.to_string());
        self
    }

    /// Sleep before the first event, to keep the "process" alive for a while.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn started(&self) -> Vec<RunRequest> {
        self.started.lock().unwrap().clone()
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    /// Largest number of fake processes that were alive at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl ProcessBackend for FakeBackend {
    fn start(&self, request: RunRequest) -> Box<dyn ProcessHandle> {
        self.started.lock().unwrap().push(request.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let mut events = VecDeque::new();
        match &self.spawn_error {
            Some(diagnostic) => {
                events.push_back(ProcessEvent::Output(OutputLine {
                    stream: OutputStream::Runner,
                    level: Level::Error,
                    text: diagnostic.clone(),
                }));
                events.push_back(ProcessEvent::Exited(RunResult::spawn_failed()));
            }
            None => {
                for (relative, contents) in &self.artifacts {
                    let path = request.cwd.join(relative);
                    fs::create_dir_all(path.parent().unwrap()).unwrap();
                    fs::write(&path, contents).unwrap();
                }
                for line in &self.lines {
                    events.push_back(ProcessEvent::Output(OutputLine::info(
                        OutputStream::Stdout,
                        line.clone(),
                    )));
                }
                events.push_back(ProcessEvent::Exited(RunResult::exited(self.exit_code)));
            }
        }

        Box::new(ScriptedProcess {
            events,
            delay: self.delay,
            active: Arc::clone(&self.active),
        })
    }
}

struct ScriptedProcess {
    events: VecDeque<ProcessEvent>,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
}

impl ProcessHandle for ScriptedProcess {
    fn next_event(&mut self) -> Pin<Box<dyn Future<Output = Option<ProcessEvent>> + Send + '_>> {
        Box::pin(async move {
            if let Some(delay) = self.delay.take() {
                tokio::time::sleep(delay).await;
            }
            let event = self.events.pop_front();
            if matches!(event, Some(ProcessEvent::Exited(_))) {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
            event
        })
    }
}
