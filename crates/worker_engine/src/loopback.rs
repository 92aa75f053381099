//! Deterministic runtime that echoes requests back.
//!
//! Used when no statistics runtime is linked in, and as a well-behaved
//! runtime in tests: it checks in with the host between steps and honours
//! every directive.
use std::fs;

use engine_logging::{engine_debug, engine_warn};
use serde_json::{json, Value};
use worker_core::{Directive, Settings};

use crate::dataset::DataSetSource;
use crate::runtime::{
    AnalysisCall, AnalysisHost, ComputeRuntime, EvalMode, Evaluation, FilterOutcome,
    ImageRequest, RuntimeError, MODULE_SUCCESS,
};

#[derive(Debug, Clone)]
pub struct LoopbackRuntime {
    steps: u32,
    settings: Settings,
    attached: Vec<String>,
}

impl Default for LoopbackRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRuntime {
    pub fn new() -> Self {
        Self::with_steps(3)
    }

    /// `steps` progress checkpoints per analysis.
    pub fn with_steps(steps: u32) -> Self {
        Self {
            steps,
            settings: Settings::default(),
            attached: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Dataset variables currently exposed to evaluated code.
    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    fn echo(
        &self,
        module_call: Option<&str>,
        call: AnalysisCall<'_>,
        host: &mut dyn AnalysisHost,
    ) -> Option<String> {
        let analysis = call.analysis;
        let mut options = analysis.options.clone();

        'compute: loop {
            for step in 1..=self.steps {
                let progress = i32::try_from(step * 100 / (self.steps + 1)).unwrap_or(99);
                match host.checkpoint(None, progress) {
                    Directive::Ok => {}
                    Directive::Changed { options: latest } => {
                        options = latest;
                        continue 'compute;
                    }
                    Directive::Aborted => return None,
                }
            }

            let keep = self.write_state(&options, host);
            let results = json!({
                "title": analysis.title,
                "perform": call.perform.as_str(),
                "module": module_call,
                "options": options,
                "rows": host.data_set_row_count(),
            });

            if !analysis.rich_results() {
                return Some(json!({ "results": results, "keep": keep }).to_string());
            }

            let payload = json!({ "status": "complete", "results": results }).to_string();
            match host.checkpoint(Some(&payload), -1) {
                Directive::Ok => {
                    return Some(json!({ "status": "complete", "keep": keep }).to_string())
                }
                Directive::Changed { options: latest } => options = latest,
                Directive::Aborted => return None,
            }
        }
    }

    /// Persists the options as analysis state; returns the files to keep.
    fn write_state(&self, options: &Value, host: &mut dyn AnalysisHost) -> Vec<String> {
        let file = match host.state_file() {
            Ok(file) => file,
            Err(err) => {
                engine_warn!("no state file available: {err}");
                return Vec::new();
            }
        };
        match fs::write(file.path(), options.to_string()) {
            Ok(()) => vec![file.relative],
            Err(err) => {
                engine_warn!("could not write state to {}: {err}", file.relative);
                Vec::new()
            }
        }
    }

    fn evaluate_literal(text: &str, rows: usize) -> Result<Vec<bool>, RuntimeError> {
        match text.trim() {
            "" | "TRUE" | "T" => Ok(vec![true; rows]),
            "FALSE" | "F" => Ok(vec![false; rows]),
            other => Err(RuntimeError::Filter(format!(
                "could not evaluate filter expression '{other}'"
            ))),
        }
    }
}

impl ComputeRuntime for LoopbackRuntime {
    fn initialize(&mut self, settings: &Settings) -> Result<(), RuntimeError> {
        self.settings = settings.clone();
        Ok(())
    }

    fn apply_settings(&mut self, settings: &Settings) {
        engine_debug!("loopback runtime language set to {}", settings.language_code);
        self.settings = settings.clone();
    }

    fn run_analysis(
        &mut self,
        call: AnalysisCall<'_>,
        host: &mut dyn AnalysisHost,
    ) -> Option<String> {
        self.echo(None, call, host)
    }

    fn run_module_call(
        &mut self,
        module_call: &str,
        call: AnalysisCall<'_>,
        host: &mut dyn AnalysisHost,
    ) -> Option<String> {
        self.echo(Some(module_call), call, host)
    }

    fn apply_filter(
        &mut self,
        filter: &str,
        generated_filter: &str,
        data_set: &mut dyn DataSetSource,
    ) -> Result<FilterOutcome, RuntimeError> {
        let rows = data_set.row_count();
        let user = Self::evaluate_literal(filter, rows)?;
        let generated = Self::evaluate_literal(generated_filter, rows)?;
        Ok(FilterOutcome {
            rows: user.iter().zip(&generated).map(|(a, b)| *a && *b).collect(),
            warning: None,
        })
    }

    fn eval_code(&mut self, code: &str, mode: EvalMode) -> Evaluation {
        if code.trim().is_empty() {
            return Evaluation::failed("no code to evaluate");
        }
        match mode {
            EvalMode::WhiteListed | EvalMode::Full => Evaluation::value(code),
            EvalMode::Commander => Evaluation::value(format!("> {code}")),
        }
    }

    fn run_module_code(&mut self, code: &str) -> Evaluation {
        if code.trim().is_empty() {
            Evaluation::failed("empty module code")
        } else {
            Evaluation::value(MODULE_SUCCESS)
        }
    }

    fn materialize_data_set(&mut self, variable: &str, _filtered: bool) {
        self.attached.push(variable.to_string());
    }

    fn detach(&mut self, variable: &str) {
        self.attached.retain(|attached| attached != variable);
    }

    fn save_image(
        &mut self,
        image: &ImageRequest,
        settings: &Settings,
    ) -> Result<String, RuntimeError> {
        if image.data.is_empty() {
            return Err(RuntimeError::Image("no image to save".into()));
        }
        Ok(json!({
            "status": "complete",
            "results": {
                "name": format!("{}.{}", image.data, image.format),
                "ppi": settings.ppi,
                "background": settings.image_background,
            }
        })
        .to_string())
    }

    fn edit_image(&mut self, options: &Value, settings: &Settings) -> Result<String, RuntimeError> {
        Ok(json!({
            "results": { "edited": options, "ppi": settings.ppi }
        })
        .to_string())
    }

    fn rewrite_images(&mut self, _settings: &Settings) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemoryDataSet;

    #[test]
    fn filter_literals_combine_with_generated_filter() {
        let mut runtime = LoopbackRuntime::new();
        let mut data = InMemoryDataSet::new(["a"], 3);
        let outcome = runtime.apply_filter("TRUE", "FALSE", &mut data).unwrap();
        assert_eq!(outcome.rows, vec![false; 3]);

        let err = runtime.apply_filter("a > 2", "", &mut data).unwrap_err();
        assert!(matches!(err, RuntimeError::Filter(_)));
    }

    #[test]
    fn module_code_reports_success_marker() {
        let mut runtime = LoopbackRuntime::new();
        assert_eq!(
            runtime.run_module_code("install()").value.as_deref(),
            Some(MODULE_SUCCESS)
        );
        assert!(runtime.run_module_code(" ").value.is_none());
    }
}
