//! Worker engine: message codec, runtime seam and the dispatch loop.
mod channel;
mod columns;
mod config;
mod dataset;
mod engine;
mod envelope;
mod error;
mod loopback;
mod runtime;
mod script;
mod tempfiles;

pub use channel::{
    memory_channel, Channel, ChannelError, CoordinatorEnd, LineChannel, MemoryChannel,
    StdioChannel,
};
pub use columns::ColumnEncoder;
pub use config::{default_session_root, WorkerConfig};
pub use dataset::{DataSetSource, FileDataSet, InMemoryDataSet, DATA_SET_FILE};
pub use engine::Engine;
pub use envelope::{
    acknowledgement, analysis_response, decode, AnalysisHeader, CodeRequest,
    ComputeColumnRequest, EnvelopeError, FilterRequest, LogCfgRequest, ModuleRequest, Request,
};
pub use error::WorkerError;
pub use loopback::LoopbackRuntime;
pub use runtime::{
    AnalysisCall, AnalysisHost, ComputeRuntime, EvalMode, Evaluation, FilterOutcome,
    ImageRequest, RuntimeError, MODULE_SUCCESS,
};
pub use script::{is_blank_code, strip_comments, wrap_computed_column};
pub use tempfiles::{TempFile, TempFileError, TempFileStore};
