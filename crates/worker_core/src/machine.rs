//! Engine-level state machine.
//!
//! Every change of [`EngineState`] goes through [`transition`], a single
//! table keyed by the current state and the trigger. [`EngineMachine`]
//! pairs that table with the [`AnalysisSlot`] so the invariant
//! "state is `analysis` iff the slot is occupied" is kept in one place.
use crate::analysis::{AnalysisSlot, Checkpoint, RunOutcome, RunStep};
use crate::{AnalysisRequest, AnalysisStatus, CoreError, EngineState};

/// Synchronous one-shot operations that hand the engine back when done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Filter,
    RCode,
    ComputeColumn,
    ModuleRequest,
    Settings,
    LogCfg,
}

impl Handler {
    pub const fn state(self) -> EngineState {
        match self {
            Handler::Filter => EngineState::Filter,
            Handler::RCode => EngineState::RCode,
            Handler::ComputeColumn => EngineState::ComputeColumn,
            Handler::ModuleRequest => EngineState::ModuleRequest,
            Handler::Settings => EngineState::Settings,
            Handler::LogCfg => EngineState::LogCfg,
        }
    }

    /// Defined only from `idle`; other origins are logged but tolerated.
    pub const fn idle_only(self) -> bool {
        matches!(
            self,
            Handler::Filter | Handler::RCode | Handler::ComputeColumn | Handler::ModuleRequest
        )
    }

    /// Needs the compute runtime, which is busy while an analysis is on the stack.
    pub const fn needs_runtime(self) -> bool {
        self.idle_only()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Construct,
    Initialized,
    Enter(Handler),
    HandlerDone { analysis_pending: bool },
    AnalysisCaptured,
    AnalysisReleased,
    Pause,
    Stop,
    Resume { analysis_pending: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Expected(EngineState),
    /// Allowed, but the origin state was not the one the protocol defines.
    Unexpected { from: EngineState, to: EngineState },
}

impl Transition {
    pub const fn target(self) -> EngineState {
        match self {
            Transition::Expected(to) | Transition::Unexpected { to, .. } => to,
        }
    }
}

/// The transition table.
pub fn transition(from: EngineState, trigger: Trigger) -> Result<Transition, CoreError> {
    use EngineState as S;

    let settle = |analysis_pending: bool| {
        if analysis_pending {
            S::Analysis
        } else {
            S::Idle
        }
    };

    let to = match (from, trigger) {
        (S::Uninitialized, Trigger::Construct) => S::Initializing,
        (S::Initializing, Trigger::Initialized) => S::Idle,
        (_, Trigger::Construct | Trigger::Initialized) => {
            return Err(CoreError::InvalidState { state: from })
        }

        (S::Idle, Trigger::Enter(handler)) => handler.state(),
        (_, Trigger::Enter(handler)) if handler.idle_only() => {
            return Ok(Transition::Unexpected {
                from,
                to: handler.state(),
            })
        }
        (_, Trigger::Enter(handler)) => handler.state(),
        (_, Trigger::HandlerDone { analysis_pending }) => settle(analysis_pending),

        (S::Idle | S::Analysis, Trigger::AnalysisCaptured) => S::Analysis,
        (_, Trigger::AnalysisCaptured) => {
            return Err(CoreError::UnexpectedAnalysisMessage { state: from })
        }
        (S::Analysis, Trigger::AnalysisReleased) => S::Idle,
        (other, Trigger::AnalysisReleased) => other,

        (S::Filter | S::ComputeColumn, Trigger::Pause | Trigger::Stop) => {
            return Err(CoreError::StructuralViolation { state: from })
        }
        (_, Trigger::Pause) => S::Paused,
        (_, Trigger::Stop) => S::Stopped,
        (_, Trigger::Resume { analysis_pending }) => settle(analysis_pending),
    };

    Ok(Transition::Expected(to))
}

/// What the process loop does after polling the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Wait,
    RunAnalysis,
    Exit,
    /// A handler state leaked past its handler.
    Stuck(EngineState),
}

#[derive(Debug, Clone)]
pub struct EngineMachine {
    state: EngineState,
    slot: AnalysisSlot,
}

impl Default for EngineMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMachine {
    pub fn new() -> Self {
        Self {
            state: EngineState::Initializing,
            slot: AnalysisSlot::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn slot(&self) -> &AnalysisSlot {
        &self.slot
    }

    pub fn analysis_status(&self) -> AnalysisStatus {
        self.slot.status()
    }

    fn apply(&mut self, trigger: Trigger) -> Result<Transition, CoreError> {
        let step = transition(self.state, trigger)?;
        self.state = step.target();
        Ok(step)
    }

    pub fn finish_initialization(&mut self) -> Result<(), CoreError> {
        self.apply(Trigger::Initialized).map(|_| ())
    }

    pub fn enter(&mut self, handler: Handler) -> Result<Transition, CoreError> {
        self.apply(Trigger::Enter(handler))
    }

    pub fn leave(&mut self) -> Result<(), CoreError> {
        let analysis_pending = self.slot.is_occupied();
        self.apply(Trigger::HandlerDone { analysis_pending }).map(|_| ())
    }

    /// Folds an analysis message into the slot.
    pub fn receive_analysis(
        &mut self,
        request: AnalysisRequest,
        developer_mode: bool,
    ) -> Result<AnalysisStatus, CoreError> {
        transition(self.state, Trigger::AnalysisCaptured)?;
        let status = self.slot.receive(request, developer_mode);
        if status.captures_request() {
            self.apply(Trigger::AnalysisCaptured)?;
        }
        Ok(status)
    }

    pub fn pause(&mut self) -> Result<(), CoreError> {
        self.suspend(Trigger::Pause)
    }

    pub fn stop(&mut self) -> Result<(), CoreError> {
        self.suspend(Trigger::Stop)
    }

    fn suspend(&mut self, trigger: Trigger) -> Result<(), CoreError> {
        let step = transition(self.state, trigger)?;
        if self.state == EngineState::Analysis || self.slot.is_occupied() {
            self.slot.abort();
        }
        self.state = step.target();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), CoreError> {
        let analysis_pending = self.slot.is_occupied();
        self.apply(Trigger::Resume { analysis_pending }).map(|_| ())
    }

    pub fn loop_action(&self) -> Result<LoopAction, CoreError> {
        match self.state {
            EngineState::Idle | EngineState::Paused => Ok(LoopAction::Wait),
            EngineState::Analysis => Ok(LoopAction::RunAnalysis),
            EngineState::Stopped => Ok(LoopAction::Exit),
            EngineState::Uninitialized
            | EngineState::Resuming
            | EngineState::PauseRequested
            | EngineState::StopRequested => Err(CoreError::InvalidState { state: self.state }),
            other => Ok(LoopAction::Stuck(other)),
        }
    }

    pub fn begin_run(&mut self) -> Result<RunStep, CoreError> {
        let step = self.slot.begin_run();
        if step == RunStep::Idle {
            self.apply(Trigger::AnalysisReleased)?;
        }
        Ok(step)
    }

    pub fn checkpoint(&mut self, has_payload: bool, progress: i32) -> Checkpoint {
        self.slot.checkpoint(has_payload, progress)
    }

    pub fn finish_run(&mut self, payload_is_null: bool) -> Result<RunOutcome, CoreError> {
        let outcome = self.slot.finish_run(payload_is_null);
        if outcome == RunOutcome::Dropped {
            self.apply(Trigger::AnalysisReleased)?;
        }
        Ok(outcome)
    }

    /// Image requests are done; results are about to be sent.
    pub fn complete_image(&mut self) {
        self.slot.complete_image();
    }

    /// Results are sent (or were streamed); free the slot.
    pub fn complete_run(&mut self) -> Result<(), CoreError> {
        self.slot.reset();
        self.apply(Trigger::AnalysisReleased).map(|_| ())
    }

    /// The payload was unusable; free the slot without a response.
    pub fn fail_run(&mut self) -> Result<(), CoreError> {
        self.slot.fail();
        self.apply(Trigger::AnalysisReleased).map(|_| ())
    }
}
