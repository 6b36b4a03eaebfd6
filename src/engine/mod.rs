// src/engine/mod.rs

//! Orchestration engine for mergerun.
//!
//! The pure state machine lives in [`state`]; the async/IO shell that walks
//! an invocation through it is implemented in [`orchestrator`].

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Invocation, Orchestrator};
pub use state::{IllegalTransition, InvocationState, Signal};
