//! The seam between the engine and the statistics runtime.
//!
//! The runtime executes analyses synchronously. While it runs it calls back
//! into the engine through [`AnalysisHost`], which is where coordinator
//! messages get observed mid-run.
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use worker_core::{Directive, PendingAnalysis, Perform, Settings};

use crate::dataset::DataSetSource;
use crate::envelope::{integral, null_as_default};
use crate::tempfiles::{TempFile, TempFileError};

/// Value module code evaluates to when a module request succeeded.
pub const MODULE_SUCCESS: &str = "succes!";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("filter failed: {0}")]
    Filter(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    #[error("image operation failed: {0}")]
    Image(String),
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
}

/// Engine services available to the runtime while it executes an analysis.
pub trait AnalysisHost {
    /// Reports intermediate results or progress and learns whether to go on.
    ///
    /// `payload` is a JSON document; `progress < 0` means "no progress".
    fn checkpoint(&mut self, payload: Option<&str>, progress: i32) -> Directive;

    fn temp_file(&mut self, extension: &str) -> Result<TempFile, TempFileError>;

    fn specific_file(&mut self, name: &str) -> Result<TempFile, TempFileError>;

    fn state_file(&mut self) -> Result<TempFile, TempFileError> {
        self.specific_file("state")
    }

    fn results_file(&mut self) -> Result<TempFile, TempFileError> {
        self.specific_file("jaspResults.json")
    }

    fn data_set_row_count(&mut self) -> usize;
}

/// Everything the runtime needs to execute one analysis.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisCall<'a> {
    pub analysis: &'a PendingAnalysis,
    pub perform: Perform,
    pub settings: &'a Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterOutcome {
    pub rows: Vec<bool>,
    /// Non-fatal diagnostic to pass along with the rows.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Only functions on the allow-list may be called.
    WhiteListed,
    Full,
    /// Console-style evaluation that returns the printed log.
    Commander,
}

/// Result of evaluating a piece of code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// `None` when the code produced no string.
    pub value: Option<String>,
    /// Last error reported by the runtime, if any.
    pub error: Option<String>,
}

impl Evaluation {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            value: None,
            error: Some(error.into()),
        }
    }
}

/// Options of a `saveImg` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct ImageRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub data: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(deserialize_with = "dimension")]
    pub width: u32,
    #[serde(deserialize_with = "dimension")]
    pub height: u32,
}

fn dimension<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(integral(deserializer)?.unwrap_or(0))
}

/// Adapter over a statistics runtime.
///
/// Payload strings returned from analyses are JSON documents; `None` stands
/// for the runtime's "null" result.
pub trait ComputeRuntime {
    fn initialize(&mut self, _settings: &Settings) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn apply_settings(&mut self, settings: &Settings);

    /// Classic entry point, selected when no dynamic module call is given.
    fn run_analysis(&mut self, call: AnalysisCall<'_>, host: &mut dyn AnalysisHost)
        -> Option<String>;

    /// Entry point for analyses provided by dynamically loaded modules.
    fn run_module_call(
        &mut self,
        module_call: &str,
        call: AnalysisCall<'_>,
        host: &mut dyn AnalysisHost,
    ) -> Option<String>;

    fn apply_filter(
        &mut self,
        filter: &str,
        generated_filter: &str,
        data_set: &mut dyn DataSetSource,
    ) -> Result<FilterOutcome, RuntimeError>;

    fn eval_code(&mut self, code: &str, mode: EvalMode) -> Evaluation;

    /// Installs or removes a dynamic module; success is signalled by the
    /// value `succes!`.
    fn run_module_code(&mut self, code: &str) -> Evaluation {
        self.eval_code(code, EvalMode::Full)
    }

    /// Exposes the dataset (optionally only filtered rows) as `variable`.
    fn materialize_data_set(&mut self, variable: &str, filtered: bool);

    fn detach(&mut self, variable: &str);

    fn save_image(
        &mut self,
        image: &ImageRequest,
        settings: &Settings,
    ) -> Result<String, RuntimeError>;

    fn edit_image(&mut self, options: &Value, settings: &Settings) -> Result<String, RuntimeError>;

    fn rewrite_images(&mut self, settings: &Settings) -> Result<(), RuntimeError>;
}
