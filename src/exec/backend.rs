// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The orchestrator talks to a `ProcessBackend` instead of spawning processes
//! itself. Production code uses [`RealProcessBackend`], which goes through
//! [`ProcessRunner`]; tests can provide a backend that replays scripted output
//! and writes fake artifacts without a real merge tool installed.

use std::future::Future;
use std::pin::Pin;

use crate::request::RunRequest;

use super::runner::{ProcessEvent, ProcessRun, ProcessRunner};

/// A running (or finished) process whose events can be pulled one at a time.
pub trait ProcessHandle: Send {
    /// Output lines, then exactly one [`ProcessEvent::Exited`], then `None`.
    fn next_event(&mut self) -> Pin<Box<dyn Future<Output = Option<ProcessEvent>> + Send + '_>>;
}

/// Trait abstracting how a [`RunRequest`] is turned into a process.
pub trait ProcessBackend: Send + Sync {
    fn start(&self, request: RunRequest) -> Box<dyn ProcessHandle>;
}

/// Real backend used in production: one OS process per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealProcessBackend;

impl ProcessBackend for RealProcessBackend {
    fn start(&self, request: RunRequest) -> Box<dyn ProcessHandle> {
        Box::new(ProcessRunner::new(request).start())
    }
}

impl ProcessHandle for ProcessRun {
    fn next_event(&mut self) -> Pin<Box<dyn Future<Output = Option<ProcessEvent>> + Send + '_>> {
        Box::pin(ProcessRun::next_event(self))
    }
}
