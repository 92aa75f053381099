//! Worker core: pure engine and analysis state machines.
mod analysis;
mod error;
mod machine;
mod request;
mod state;
mod status;

pub use analysis::{AnalysisSlot, Checkpoint, Directive, Emission, RunOutcome, RunStep};
pub use error::CoreError;
pub use machine::{transition, EngineMachine, Handler, LoopAction, Transition, Trigger};
pub use request::{AnalysisId, AnalysisRequest, PendingAnalysis};
pub use state::{EngineState, Settings, SettingsUpdate};
pub use status::{AnalysisStatus, ColumnType, Perform, ResultStatus};
