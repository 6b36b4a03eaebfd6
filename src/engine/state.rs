// src/engine/state.rs

//! Pure invocation state machine.
//!
//! This module contains a synchronous, deterministic state machine that
//! consumes [`Signal`]s and produces the next [`InvocationState`]. It has no
//! channels, no Tokio types and performs no IO; the async shell in
//! [`super::orchestrator`] feeds it as the invocation progresses.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationState {
    Idle,
    Validating,
    ValidationFailed,
    WorkspacePrepared,
    /// The workspace could not be created or the configuration not written.
    PreparationFailed,
    Running,
    SpawnFailed,
    ProcessFinished,
    MergeFailed,
    Materializing,
    MaterializeFailed,
    Completed,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::ValidationFailed
                | InvocationState::PreparationFailed
                | InvocationState::SpawnFailed
                | InvocationState::MergeFailed
                | InvocationState::MaterializeFailed
                | InvocationState::Completed
        )
    }

    pub fn is_success(self) -> bool {
        self == InvocationState::Completed
    }

    /// Apply `signal`, or report that it makes no sense in this state.
    ///
    /// Terminal states accept nothing.
    pub fn advance(self, signal: Signal) -> Result<InvocationState, IllegalTransition> {
        use InvocationState as S;

        let next = match (self, signal) {
            (S::Idle, Signal::Start) => S::Validating,

            (S::Validating, Signal::ConfigRejected) => S::ValidationFailed,
            (S::Validating, Signal::WorkspaceReady) => S::WorkspacePrepared,
            (S::Validating, Signal::WorkspaceFailed) => S::PreparationFailed,

            (S::WorkspacePrepared, Signal::Launch) => S::Running,

            (S::Running, Signal::SpawnFailed) => S::SpawnFailed,
            (S::Running, Signal::ChildExited) => S::ProcessFinished,

            (S::ProcessFinished, Signal::ExitChecked { exit_code: 0 }) => S::Materializing,
            (S::ProcessFinished, Signal::ExitChecked { .. }) => S::MergeFailed,

            (S::Materializing, Signal::CopyFailed) => S::MaterializeFailed,
            (S::Materializing, Signal::CopyFinished) => S::Completed,

            (from, signal) => return Err(IllegalTransition { from, signal }),
        };

        Ok(next)
    }
}

/// Something that happened during an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Start,
    ConfigRejected,
    WorkspaceReady,
    WorkspaceFailed,
    Launch,
    SpawnFailed,
    ChildExited,
    ExitChecked { exit_code: i32 },
    CopyFailed,
    CopyFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition from {from:?} on {signal:?}")]
pub struct IllegalTransition {
    pub from: InvocationState,
    pub signal: Signal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvocationState as S;

    fn run(signals: &[Signal]) -> Result<InvocationState, IllegalTransition> {
        signals
            .iter()
            .try_fold(S::Idle, |state, &signal| state.advance(signal))
    }

    #[test]
    fn happy_path_reaches_completed() {
        let end = run(&[
            Signal::Start,
            Signal::WorkspaceReady,
            Signal::Launch,
            Signal::ChildExited,
            Signal::ExitChecked { exit_code: 0 },
            Signal::CopyFinished,
        ])
        .unwrap();

        assert_eq!(end, S::Completed);
        assert!(end.is_terminal());
        assert!(end.is_success());
    }

    #[test]
    fn nonzero_exit_is_merge_failed() {
        let end = run(&[
            Signal::Start,
            Signal::WorkspaceReady,
            Signal::Launch,
            Signal::ChildExited,
            Signal::ExitChecked { exit_code: 137 },
        ])
        .unwrap();
        assert_eq!(end, S::MergeFailed);
        assert!(!end.is_success());
    }

    #[test]
    fn failure_paths_are_terminal() {
        assert_eq!(run(&[Signal::Start, Signal::ConfigRejected]), Ok(S::ValidationFailed));
        assert_eq!(run(&[Signal::Start, Signal::WorkspaceFailed]), Ok(S::PreparationFailed));
        assert_eq!(
            run(&[Signal::Start, Signal::WorkspaceReady, Signal::Launch, Signal::SpawnFailed]),
            Ok(S::SpawnFailed)
        );

        for terminal in [
            S::ValidationFailed,
            S::PreparationFailed,
            S::SpawnFailed,
            S::MergeFailed,
            S::MaterializeFailed,
            S::Completed,
        ] {
            assert!(terminal.is_terminal());
            assert!(terminal.advance(Signal::Start).is_err());
        }
    }

    #[test]
    fn cannot_materialize_without_exit_check() {
        let err = run(&[
            Signal::Start,
            Signal::WorkspaceReady,
            Signal::Launch,
            Signal::CopyFinished,
        ])
        .unwrap_err();

        assert_eq!(err.from, S::Running);
        assert_eq!(err.signal, Signal::CopyFinished);
    }

    #[test]
    fn states_are_never_reentered_on_happy_path() {
        let mut seen = vec![S::Idle];
        let mut state = S::Idle;
        for signal in [
            Signal::Start,
            Signal::WorkspaceReady,
            Signal::Launch,
            Signal::ChildExited,
            Signal::ExitChecked { exit_code: 0 },
            Signal::CopyFinished,
        ] {
            state = state.advance(signal).unwrap();
            assert!(!seen.contains(&state));
            seen.push(state);
        }
    }
}
