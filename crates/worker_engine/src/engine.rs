//! Message dispatch and the process loop.
//!
//! [`Engine`] owns the runtime adapter and a [`Session`] holding everything
//! else. While an analysis runs, the runtime is borrowed by that call and
//! the session is handed to it as an [`AnalysisHost`]; messages observed
//! from there that need the runtime are queued until the call returns.
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use serde_json::{json, Value};
use worker_core::{
    AnalysisId, AnalysisRequest, AnalysisSlot, AnalysisStatus, Directive, Emission, EngineMachine,
    EngineState, Handler, LoopAction, Perform, ResultStatus, RunOutcome, RunStep, Settings,
    SettingsUpdate, Transition,
};

use crate::channel::Channel;
use crate::columns::ColumnEncoder;
use crate::config::WorkerConfig;
use crate::dataset::DataSetSource;
use crate::envelope::{
    acknowledgement, analysis_response, code_error, code_result, compute_column_result, decode,
    filter_error, filter_result, module_result, AnalysisHeader, CodeRequest, ComputeColumnRequest,
    FilterRequest, LogCfgRequest, ModuleRequest, Request,
};
use crate::error::WorkerError;
use crate::runtime::{
    AnalysisCall, AnalysisHost, ComputeRuntime, EvalMode, ImageRequest, RuntimeError,
    MODULE_SUCCESS,
};
use crate::script::{is_blank_code, strip_comments, wrap_computed_column};
use crate::tempfiles::{TempFile, TempFileError, TempFileStore};

const COMMANDER_DATA: &str = "data";
const COMMANDER_FILTERED: &str = "filteredData";
const UNCLEAR_FILTER_ERROR: &str = "Something went wrong with the filter but it is unclear what.";
const UNCLEAR_CODE_ERROR: &str =
    "Code failed for unknown reason. Check that the function returns a string.";

pub struct Engine {
    runtime: Box<dyn ComputeRuntime>,
    session: Session,
}

/// Engine state apart from the runtime.
struct Session {
    config: WorkerConfig,
    channel: Box<dyn Channel>,
    data_set: Box<dyn DataSetSource>,
    temp_files: TempFileStore,
    machine: EngineMachine,
    settings: Settings,
    encoder: ColumnEncoder,
    /// Settings changed while the runtime was busy.
    runtime_settings_stale: bool,
    /// Runtime-bound requests seen during an analysis callback.
    deferred: VecDeque<Request>,
    /// Fatal error raised inside an analysis callback, surfaced once the runtime returns.
    fatal: Option<WorkerError>,
    reported_state: EngineState,
}

impl Engine {
    pub fn new(
        config: WorkerConfig,
        channel: impl Channel + 'static,
        runtime: impl ComputeRuntime + 'static,
        data_set: impl DataSetSource + 'static,
    ) -> Result<Self, WorkerError> {
        let temp_files = TempFileStore::attach(&config.session_root)?;
        let machine = EngineMachine::new();
        let reported_state = machine.state();
        Ok(Self {
            runtime: Box::new(runtime),
            session: Session {
                config,
                channel: Box::new(channel),
                data_set: Box::new(data_set),
                temp_files,
                machine,
                settings: Settings::default(),
                encoder: ColumnEncoder::new(),
                runtime_settings_stale: false,
                deferred: VecDeque::new(),
                fatal: None,
                reported_state,
            },
        })
    }

    pub fn state(&self) -> EngineState {
        self.session.machine.state()
    }

    pub fn analysis_status(&self) -> AnalysisStatus {
        self.session.machine.analysis_status()
    }

    pub fn slot(&self) -> &AnalysisSlot {
        self.session.machine.slot()
    }

    pub fn settings(&self) -> &Settings {
        &self.session.settings
    }

    pub fn column_encoder(&self) -> &ColumnEncoder {
        &self.session.encoder
    }

    pub fn temp_files(&self) -> &TempFileStore {
        &self.session.temp_files
    }

    pub fn session_root(&self) -> PathBuf {
        self.session.config.session_root.clone()
    }

    /// Runs until stopped or the coordinator goes away, then removes the
    /// session's temp files.
    pub fn run(&mut self) -> Result<(), WorkerError> {
        let outcome = self.session.clear_buffer().and_then(|()| self.main_loop());
        let outcome = match outcome {
            Err(err) if err.is_disconnect() => {
                engine_info!("coordinator closed the channel, leaving main loop");
                Ok(())
            }
            Err(err) => {
                engine_error!("fatal worker error: {err}");
                Err(err)
            }
            Ok(()) => {
                engine_info!("leaving main loop after having been asked to stop");
                Ok(())
            }
        };

        if let Err(err) = self.session.temp_files.delete_all() {
            engine_warn!("could not remove session temp files: {err}");
        }
        outcome
    }

    fn main_loop(&mut self) -> Result<(), WorkerError> {
        while self.step()? {}
        Ok(())
    }

    /// One loop iteration: poll once, then act on the resulting state.
    /// Returns `false` once the engine has stopped.
    pub fn step(&mut self) -> Result<bool, WorkerError> {
        if self.session.machine.state() == EngineState::Initializing {
            self.initialize()?;
        }

        let timeout = self.session.config.poll_timeout;
        let runtime: &mut dyn ComputeRuntime = &mut *self.runtime;
        self.session.poll(timeout, Some(runtime))?;

        let keep_going = match self.session.machine.loop_action()? {
            LoopAction::Wait => true,
            LoopAction::RunAnalysis => {
                self.run_analysis()?;
                true
            }
            LoopAction::Exit => false,
            LoopAction::Stuck(state) => {
                engine_error!("engine got stuck in state {state}, which is not supposed to happen");
                true
            }
        };
        self.session.report_state();
        Ok(keep_going && self.session.machine.state() != EngineState::Stopped)
    }

    fn initialize(&mut self) -> Result<(), WorkerError> {
        engine_info!("initializing");
        self.runtime.initialize(&self.session.settings)?;
        self.session.refresh_column_names();
        self.session.machine.finish_initialization()?;
        // Tells the coordinator initialisation is done.
        self.session.send_json(&acknowledgement(EngineState::Resuming))?;
        engine_info!("initialization done");
        Ok(())
    }

    fn run_analysis(&mut self) -> Result<(), WorkerError> {
        match self.session.machine.begin_run()? {
            RunStep::Idle => {
                engine_debug!("nothing to run, analysis slot released");
                Ok(())
            }
            RunStep::SaveImage => self.save_image(),
            RunStep::EditImage => self.edit_image(),
            RunStep::RewriteImages => self.rewrite_images(),
            RunStep::Invoke {
                perform,
                rich_results,
            } => self.invoke(perform, rich_results),
        }
    }

    fn invoke(&mut self, perform: Perform, rich_results: bool) -> Result<(), WorkerError> {
        let Some(mut analysis) = self.session.machine.slot().pending().cloned() else {
            engine_warn!("analysis slot has no request to run");
            self.session.machine.fail_run()?;
            return Ok(());
        };
        engine_info!(
            "running analysis {} ({}) revision {} as {}",
            analysis.title,
            analysis.id,
            analysis.revision,
            perform.as_str()
        );
        self.session.encode_options(&mut analysis.options);

        let settings = self.session.settings.clone();
        let call = AnalysisCall {
            analysis: &analysis,
            perform,
            settings: &settings,
        };
        let mut host = CallbackHost {
            session: &mut self.session,
        };
        let payload = match analysis.dynamic_module_call.as_deref() {
            Some(module_call) => self.runtime.run_module_call(module_call, call, &mut host),
            None => self.runtime.run_analysis(call, &mut host),
        };
        if let Some(err) = self.session.fatal.take() {
            return Err(err);
        }
        let payload = payload.filter(|raw| !is_null_payload(raw));

        self.sync_runtime_settings();
        self.drain_deferred()?;

        let status = self.session.machine.analysis_status();
        if !rich_results && matches!(status, AnalysisStatus::Initing | AnalysisStatus::Running) {
            // A late change or abort must be seen before the results go out.
            let runtime: &mut dyn ComputeRuntime = &mut *self.runtime;
            self.session.poll(Duration::ZERO, Some(runtime))?;
        }

        match self.session.machine.finish_run(payload.is_none())? {
            RunOutcome::Superseded => {
                engine_debug!("analysis {} superseded while running", analysis.id);
            }
            RunOutcome::Dropped => {
                engine_debug!("analysis {} dropped without results", analysis.id);
            }
            RunOutcome::Restart { discard_temp_files } => {
                engine_debug!("analysis {} restarts with its latest options", analysis.id);
                if discard_temp_files {
                    self.session.temp_files.delete_for(analysis.id);
                }
            }
            RunOutcome::Deliver { send } => {
                self.session.deliver(analysis.id, payload.as_deref(), send)?;
            }
        }
        self.drain_deferred()
    }

    fn save_image(&mut self) -> Result<(), WorkerError> {
        let options = self.session.pending_image();
        let image = serde_json::from_value::<ImageRequest>(options.clone()).unwrap_or_else(|err| {
            engine_warn!("image options are incomplete: {err}");
            ImageRequest::default()
        });
        let outcome = self.runtime.save_image(&image, &self.session.settings);
        let mut payload = image_payload(outcome);

        if !payload.is_object() {
            payload = json!({});
        }
        let results = &mut payload["results"];
        if !results.is_object() {
            *results = json!({});
        }
        results["inputOptions"] = options;
        self.session.finish_image(&payload)
    }

    fn edit_image(&mut self) -> Result<(), WorkerError> {
        let options = self.session.pending_image();
        let outcome = self.runtime.edit_image(&options, &self.session.settings);
        self.session.finish_image(&image_payload(outcome))
    }

    fn rewrite_images(&mut self) -> Result<(), WorkerError> {
        let payload = match self.runtime.rewrite_images(&self.session.settings) {
            Ok(()) => json!({ "status": ResultStatus::ImagesRewritten.as_str() }),
            Err(err) => fatal_payload(&err),
        };
        self.session.finish_image(&payload)
    }

    fn sync_runtime_settings(&mut self) {
        if self.session.runtime_settings_stale {
            self.runtime.apply_settings(&self.session.settings);
            self.session.runtime_settings_stale = false;
        }
    }

    /// Handles requests queued while the runtime was busy, in arrival order.
    fn drain_deferred(&mut self) -> Result<(), WorkerError> {
        while let Some(request) = self.session.deferred.pop_front() {
            if self.session.machine.state() == EngineState::Stopped {
                engine_info!(
                    "dropping {} deferred requests after stop",
                    self.session.deferred.len() + 1
                );
                self.session.deferred.clear();
                break;
            }
            engine_debug!("handling deferred {} request", request.kind());
            let runtime: &mut dyn ComputeRuntime = &mut *self.runtime;
            self.session.dispatch(request, Some(runtime))?;
        }
        Ok(())
    }
}

impl Session {
    fn clear_buffer(&mut self) -> Result<(), WorkerError> {
        self.channel.send("")?;
        Ok(())
    }

    /// Receives at most one message and dispatches it.
    ///
    /// `runtime` is `None` while an analysis call is on the stack.
    fn poll(
        &mut self,
        timeout: Duration,
        runtime: Option<&mut dyn ComputeRuntime>,
    ) -> Result<(), WorkerError> {
        let Some(raw) = self.channel.receive(timeout)? else {
            return Ok(());
        };
        let request = match decode(&raw) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(err) if !err.is_fatal() => {
                engine_warn!("ignoring message: {err}");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        engine_debug!("received {} message", request.kind());
        self.dispatch(request, runtime)
    }

    fn dispatch(
        &mut self,
        request: Request,
        runtime: Option<&mut dyn ComputeRuntime>,
    ) -> Result<(), WorkerError> {
        match (request, runtime) {
            (Request::Analysis(request), _) => self.receive_analysis(request),
            (Request::Pause, _) => self.pause(),
            (Request::Stop, _) => self.stop(),
            (Request::Resume(update), runtime) => self.resume(update, runtime),
            (Request::Settings(update), runtime) => self.update_settings(update, runtime),
            (Request::LogCfg(request), _) => self.configure_logging(&request),
            (Request::Filter(request), Some(runtime)) => self.run_filter(&request, runtime),
            (Request::RCode(request), Some(runtime)) => self.run_code(&request, runtime),
            (Request::ComputeColumn(request), Some(runtime)) => {
                self.compute_column(&request, runtime)
            }
            (Request::ModuleRequest(request), Some(runtime)) => {
                self.module_request(&request, runtime)
            }
            (request, None) => {
                engine_debug!("deferring {} request until the analysis returns", request.kind());
                self.deferred.push_back(request);
                Ok(())
            }
        }
    }

    fn enter(&mut self, handler: Handler) -> Result<(), WorkerError> {
        if let Transition::Unexpected { from, to } = self.machine.enter(handler)? {
            engine_warn!("unexpected {to} message, current state is not idle ({from})");
        }
        Ok(())
    }

    fn receive_analysis(&mut self, request: AnalysisRequest) -> Result<(), WorkerError> {
        let id = request.id;
        let status = self
            .machine
            .receive_analysis(request, self.settings.developer_mode)?;
        engine_debug!("analysis {id} message folded into status {status}");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), WorkerError> {
        self.machine.pause()?;
        self.data_set.unload();
        self.send_json(&acknowledgement(EngineState::Paused))
    }

    fn stop(&mut self) -> Result<(), WorkerError> {
        self.machine.stop()?;
        self.data_set.unload();
        self.send_json(&acknowledgement(EngineState::Stopped))
    }

    fn resume(
        &mut self,
        update: SettingsUpdate,
        runtime: Option<&mut dyn ComputeRuntime>,
    ) -> Result<(), WorkerError> {
        engine_info!("resuming, absorbing settings and rescanning column names");
        self.refresh_column_names();
        self.absorb_settings(update, runtime);
        self.machine.resume()?;
        self.send_json(&acknowledgement(EngineState::Resuming))
    }

    fn update_settings(
        &mut self,
        update: SettingsUpdate,
        runtime: Option<&mut dyn ComputeRuntime>,
    ) -> Result<(), WorkerError> {
        self.enter(Handler::Settings)?;
        self.absorb_settings(update, runtime);
        self.send_json(&acknowledgement(EngineState::Settings))?;
        self.machine.leave()?;
        Ok(())
    }

    fn absorb_settings(&mut self, update: SettingsUpdate, runtime: Option<&mut dyn ComputeRuntime>) {
        self.settings.absorb(update);
        match runtime {
            Some(runtime) => runtime.apply_settings(&self.settings),
            None => self.runtime_settings_stale = true,
        }
    }

    fn configure_logging(&mut self, request: &LogCfgRequest) -> Result<(), WorkerError> {
        self.enter(Handler::LogCfg)?;
        engine_info!("log configuration received");
        match log_destination(request) {
            Ok(destination) => {
                let level = request.log_level.as_deref().and_then(engine_logging::parse_level);
                if let Err(err) = engine_logging::reconfigure(destination, level) {
                    engine_warn!("could not apply log configuration: {err}");
                }
            }
            Err(reason) => engine_warn!("ignoring log configuration: {reason}"),
        }
        self.send_json(&acknowledgement(EngineState::LogCfg))?;
        self.machine.leave()?;
        Ok(())
    }

    fn run_filter(
        &mut self,
        request: &FilterRequest,
        runtime: &mut dyn ComputeRuntime,
    ) -> Result<(), WorkerError> {
        self.enter(Handler::Filter)?;
        let filter = strip_comments(&request.filter);
        let response = if filter.trim().is_empty() && is_blank_code(&request.generated_filter) {
            let rows = vec![true; self.data_set.row_count()];
            filter_result(request.request_id, &rows, None)
        } else {
            match runtime.apply_filter(&filter, &request.generated_filter, self.data_set.as_mut()) {
                Ok(outcome) => {
                    filter_result(request.request_id, &outcome.rows, outcome.warning.as_deref())
                }
                Err(err) => {
                    let message = match &err {
                        RuntimeError::Filter(message) if message.is_empty() => UNCLEAR_FILTER_ERROR,
                        RuntimeError::Filter(message) => message.as_str(),
                        _ => UNCLEAR_FILTER_ERROR,
                    };
                    engine_debug!("filter {} failed: {err}", request.request_id);
                    filter_error(request.request_id, message)
                }
            }
        };
        self.send_json(&response)?;
        self.machine.leave()?;
        Ok(())
    }

    fn run_code(
        &mut self,
        request: &CodeRequest,
        runtime: &mut dyn ComputeRuntime,
    ) -> Result<(), WorkerError> {
        self.enter(Handler::RCode)?;
        let response = if request.return_log {
            self.run_commander(&request.code, runtime)
        } else {
            let mode = if request.white_listed {
                EvalMode::WhiteListed
            } else {
                EvalMode::Full
            };
            let evaluation = runtime.eval_code(&request.code, mode);
            match evaluation.value {
                Some(value) => code_result(request.request_id, &value, evaluation.error.as_deref()),
                None => {
                    engine_debug!("code request {} yielded an error", request.request_id);
                    let error = evaluation
                        .error
                        .as_deref()
                        .filter(|error| !error.is_empty())
                        .unwrap_or(UNCLEAR_CODE_ERROR);
                    code_error(request.request_id, error)
                }
            }
        };
        self.send_json(&response)?;
        self.machine.leave()?;
        Ok(())
    }

    /// Console evaluation with the dataset exposed to the code.
    fn run_commander(&mut self, code: &str, runtime: &mut dyn ComputeRuntime) -> Value {
        let has_data = self.data_set.column_names().is_some();
        let code = if has_data {
            self.encode_text(code)
        } else {
            code.to_string()
        };
        if has_data {
            runtime.materialize_data_set(COMMANDER_DATA, false);
            runtime.materialize_data_set(COMMANDER_FILTERED, true);
        }

        let evaluation = runtime.eval_code(&code, EvalMode::Commander);

        if has_data {
            runtime.detach(COMMANDER_FILTERED);
            runtime.detach(COMMANDER_DATA);
        }
        let value = evaluation.value.unwrap_or_default();
        let value = if has_data && self.config.encode_column_names {
            self.encoder.decode_all(&value)
        } else {
            value
        };
        code_result(-1, &value, evaluation.error.as_deref())
    }

    fn compute_column(
        &mut self,
        request: &ComputeColumnRequest,
        runtime: &mut dyn ComputeRuntime,
    ) -> Result<(), WorkerError> {
        self.enter(Handler::ComputeColumn)?;
        let column_name = match self.encoder.encode(&request.column_name) {
            Some(encoded) if self.config.encode_column_names => encoded.to_string(),
            _ => request.column_name.clone(),
        };

        let response = match &request.column_type {
            Ok(column_type) => {
                let code = wrap_computed_column(&column_name, &request.compute_code, *column_type);
                let evaluation = runtime.eval_code(&code, EvalMode::WhiteListed);
                compute_column_result(
                    &column_name,
                    evaluation.value.as_deref().unwrap_or_default(),
                    evaluation.error.as_deref().unwrap_or_default(),
                )
            }
            Err(unknown) => {
                engine_warn!("compute column {column_name} has unknown type '{unknown}'");
                compute_column_result(&column_name, "", &format!("unknown column type '{unknown}'"))
            }
        };
        self.send_json(&response)?;
        self.machine.leave()?;
        Ok(())
    }

    fn module_request(
        &mut self,
        request: &ModuleRequest,
        runtime: &mut dyn ComputeRuntime,
    ) -> Result<(), WorkerError> {
        self.enter(Handler::ModuleRequest)?;
        let evaluation = runtime.run_module_code(&request.code);
        let success = evaluation.value.as_deref() == Some(MODULE_SUCCESS);
        let response = module_result(
            request,
            success,
            evaluation.error.as_deref().unwrap_or_default(),
        );
        self.send_json(&response)?;
        self.machine.leave()?;
        Ok(())
    }

    /// The reentrant half of an analysis run.
    fn checkpoint(&mut self, payload: Option<&str>, progress: i32) -> Directive {
        if self.fatal.is_none() {
            if let Err(err) = self.poll(Duration::ZERO, None) {
                engine_error!("fatal error while an analysis was running: {err}");
                self.fatal = Some(err);
            }
        }
        if self.fatal.is_some() {
            return Directive::Aborted;
        }

        let payload = payload.filter(|raw| !is_null_payload(raw));
        let checkpoint = self.machine.checkpoint(payload.is_some(), progress);
        let emitted = match (checkpoint.emission, payload) {
            (Emission::Results, Some(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(results) => self.send_analysis_response(&results),
                Err(err) => {
                    engine_warn!("intermediate results are not valid JSON: {err}");
                    Ok(())
                }
            },
            (Emission::ProgressOnly, _) => self.send_analysis_response(&Value::Null),
            _ => Ok(()),
        };
        if let Err(err) = emitted {
            self.fatal = Some(err);
            return Directive::Aborted;
        }

        match checkpoint.directive {
            Directive::Changed { mut options } => {
                self.encode_options(&mut options);
                Directive::Changed { options }
            }
            other => other,
        }
    }

    /// Sends (if needed) the results of a finished run and frees the slot.
    fn deliver(
        &mut self,
        id: AnalysisId,
        payload: Option<&str>,
        send: bool,
    ) -> Result<(), WorkerError> {
        let results = match payload.map(|raw| serde_json::from_str::<Value>(raw)) {
            None => Value::Null,
            Some(Ok(results)) => results,
            Some(Err(err)) => {
                engine_warn!("analysis {id} returned unparseable results: {err}");
                self.machine.fail_run()?;
                return Ok(());
            }
        };
        if send {
            self.send_analysis_response(&results)?;
        }
        self.temp_files.prune(id, &keep_list(&results));
        self.machine.complete_run()?;
        Ok(())
    }

    fn pending_image(&self) -> Value {
        self.machine
            .slot()
            .pending()
            .map(|pending| pending.image.clone())
            .unwrap_or(Value::Null)
    }

    fn finish_image(&mut self, payload: &Value) -> Result<(), WorkerError> {
        self.machine.complete_image();
        self.send_analysis_response(payload)?;
        self.machine.complete_run()?;
        Ok(())
    }

    fn send_analysis_response(&mut self, payload: &Value) -> Result<(), WorkerError> {
        let slot = self.machine.slot();
        let (name, revision) = slot
            .pending()
            .map(|pending| (pending.name.clone(), pending.revision))
            .unwrap_or_else(|| (String::new(), -1));
        let header = AnalysisHeader {
            id: slot.id().unwrap_or(-1),
            name: &name,
            revision,
            progress: slot.progress(),
            status: slot.status(),
        };
        let response = analysis_response(header, payload);
        self.send_json(&response)
    }

    /// Sends a response, mapping encoded column names back to user names.
    fn send_json(&mut self, message: &Value) -> Result<(), WorkerError> {
        let text = if self.config.encode_column_names && !self.encoder.is_empty() {
            let mut decoded = message.clone();
            self.encoder.decode_json(&mut decoded);
            serde_json::to_string(&decoded)?
        } else {
            serde_json::to_string(message)?
        };
        self.channel.send(&text)?;
        Ok(())
    }

    fn refresh_column_names(&mut self) {
        let names = self.data_set.column_names().unwrap_or_default();
        engine_debug!("column name table rebuilt from {} columns", names.len());
        self.encoder.set_column_names(names);
    }

    fn encode_text(&self, text: &str) -> String {
        if self.config.encode_column_names {
            self.encoder.encode_all(text)
        } else {
            text.to_string()
        }
    }

    fn encode_options(&self, options: &mut Value) {
        if self.config.encode_column_names {
            self.encoder.encode_options(options);
        }
    }

    fn current_id(&self) -> AnalysisId {
        self.machine.slot().id().unwrap_or(-1)
    }

    fn report_state(&mut self) {
        let state = self.machine.state();
        if state != self.reported_state {
            engine_info!("engine state is now {state}");
            self.reported_state = state;
        }
    }
}

/// The session as seen by a runtime executing an analysis.
struct CallbackHost<'s> {
    session: &'s mut Session,
}

impl AnalysisHost for CallbackHost<'_> {
    fn checkpoint(&mut self, payload: Option<&str>, progress: i32) -> Directive {
        self.session.checkpoint(payload, progress)
    }

    fn temp_file(&mut self, extension: &str) -> Result<TempFile, TempFileError> {
        let id = self.session.current_id();
        self.session.temp_files.create(extension, id)
    }

    fn specific_file(&mut self, name: &str) -> Result<TempFile, TempFileError> {
        let id = self.session.current_id();
        self.session.temp_files.create_specific(name, id)
    }

    fn data_set_row_count(&mut self) -> usize {
        self.session.data_set.row_count()
    }
}

fn is_null_payload(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == "null"
}

/// Names listed in a result's `keep` member: a string or an array of strings.
fn keep_list(results: &Value) -> Vec<String> {
    match results.get("keep") {
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

fn fatal_payload(err: &RuntimeError) -> Value {
    json!({
        "status": ResultStatus::FatalError.as_str(),
        "results": { "error": err.to_string() },
    })
}

fn image_payload(outcome: Result<String, RuntimeError>) -> Value {
    match outcome {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            engine_warn!("image results are not valid JSON: {err}");
            Value::Null
        }),
        Err(err) => fatal_payload(&err),
    }
}

fn log_destination(
    request: &LogCfgRequest,
) -> Result<engine_logging::LogDestination, String> {
    use engine_logging::LogDestination;

    match request.target.as_deref() {
        Some("file") => match request.log_path.as_deref() {
            Some(path) if !path.is_empty() => Ok(LogDestination::File(PathBuf::from(path))),
            _ => Err("file logging requested without a logPath".to_string()),
        },
        Some("null") => Ok(LogDestination::Null),
        Some("terminal") | None => Ok(LogDestination::Terminal),
        Some(other) => Err(format!("unknown log target '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_accepts_a_single_name_or_a_list() {
        assert_eq!(keep_list(&json!({ "keep": "a.png" })), vec!["a.png"]);
        assert_eq!(
            keep_list(&json!({ "keep": ["a.png", 3, "b.png"] })),
            vec!["a.png", "b.png"]
        );
        assert!(keep_list(&json!(["a.png"])).is_empty());
    }

    #[test]
    fn null_payloads_are_recognised() {
        assert!(is_null_payload(" null "));
        assert!(is_null_payload(""));
        assert!(!is_null_payload("{}"));
    }

    #[test]
    fn log_target_mapping() {
        let request = LogCfgRequest {
            target: Some("file".into()),
            log_path: None,
            log_level: None,
        };
        assert!(log_destination(&request).is_err());

        let request = LogCfgRequest {
            target: Some("null".into()),
            ..LogCfgRequest::default()
        };
        assert_eq!(
            log_destination(&request),
            Ok(engine_logging::LogDestination::Null)
        );
    }
}
