use thiserror::Error;
use worker_core::CoreError;

use crate::channel::ChannelError;
use crate::envelope::EnvelopeError;
use crate::runtime::RuntimeError;
use crate::tempfiles::TempFileError;

/// Errors that end the worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    State(#[from] CoreError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    TempFiles(#[from] TempFileError),
    #[error("runtime failed to start: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("could not encode message: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    /// The coordinator went away; the loop ends without failure.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, WorkerError::Channel(ChannelError::Closed))
    }
}
