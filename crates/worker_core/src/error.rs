use thiserror::Error;

use crate::EngineState;

/// Violations of the coordinator protocol. All of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unexpected data synch during {state}; pause/stop must never arrive mid-{state}")]
    StructuralViolation { state: EngineState },
    #[error("unexpected analysis message, current state is not idle or analysis ({state})")]
    UnexpectedAnalysisMessage { state: EngineState },
    #[error("engine state {state} should never be the current state")]
    InvalidState { state: EngineState },
}
