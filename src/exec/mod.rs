// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the merge tool, using
//! `tokio::process::Command`, and turning its output into events the
//! orchestrator can forward.
//!
//! - [`runner`] spawns one child, drains stdout and stderr on dedicated
//!   reader tasks into a shared queue, and reports the exit code.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend` used in production, which tests can replace with a
//!   fake implementation.

pub mod backend;
pub mod runner;

pub use backend::{ProcessBackend, ProcessHandle, RealProcessBackend};
pub use runner::{
    OutputLine, OutputStream, ProcessEvent, ProcessRun, ProcessRunner, RunOutcome, RunResult,
    SPAWN_FAILURE_EXIT_CODE,
};
