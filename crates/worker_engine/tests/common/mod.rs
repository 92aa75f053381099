#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::sync::Once;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use worker_core::{Perform, Settings};
use worker_engine::{
    memory_channel, AnalysisCall, AnalysisHost, ComputeRuntime, CoordinatorEnd, DataSetSource,
    Engine, EvalMode, Evaluation, FilterOutcome, ImageRequest, InMemoryDataSet, RuntimeError,
    WorkerConfig,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Behaviour of one analysis invocation.
pub type Script = Box<dyn FnMut(AnalysisCall<'_>, &mut dyn AnalysisHost) -> Option<String>>;

pub fn script(
    f: impl FnMut(AnalysisCall<'_>, &mut dyn AnalysisHost) -> Option<String> + 'static,
) -> Script {
    Box::new(f)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub id: i64,
    pub perform: Perform,
    pub module_call: Option<String>,
    pub options: Value,
}

/// What the scripted runtime was asked to do, in order.
#[derive(Debug, Default)]
pub struct Record {
    pub invocations: Vec<Invocation>,
    pub filters: Vec<(String, String)>,
    pub evaluations: Vec<(String, EvalMode)>,
    pub applied_settings: Vec<Settings>,
}

/// Runtime whose analyses are driven by per-invocation closures.
pub struct ScriptedRuntime {
    scripts: VecDeque<Script>,
    record: Rc<RefCell<Record>>,
}

impl ScriptedRuntime {
    pub fn new(scripts: Vec<Script>) -> (Self, Rc<RefCell<Record>>) {
        let record = Rc::new(RefCell::new(Record::default()));
        (
            Self {
                scripts: scripts.into(),
                record: record.clone(),
            },
            record,
        )
    }

    fn invoke(
        &mut self,
        module_call: Option<&str>,
        call: AnalysisCall<'_>,
        host: &mut dyn AnalysisHost,
    ) -> Option<String> {
        self.record.borrow_mut().invocations.push(Invocation {
            id: call.analysis.id,
            perform: call.perform,
            module_call: module_call.map(str::to_owned),
            options: call.analysis.options.clone(),
        });
        match self.scripts.pop_front() {
            Some(mut script) => script(call, host),
            None => Some(json!({ "results": { "options": call.analysis.options } }).to_string()),
        }
    }
}

impl ComputeRuntime for ScriptedRuntime {
    fn apply_settings(&mut self, settings: &Settings) {
        self.record.borrow_mut().applied_settings.push(settings.clone());
    }

    fn run_analysis(&mut self, call: AnalysisCall<'_>, host: &mut dyn AnalysisHost) -> Option<String> {
        self.invoke(None, call, host)
    }

    fn run_module_call(
        &mut self,
        module_call: &str,
        call: AnalysisCall<'_>,
        host: &mut dyn AnalysisHost,
    ) -> Option<String> {
        self.invoke(Some(module_call), call, host)
    }

    fn apply_filter(
        &mut self,
        filter: &str,
        generated_filter: &str,
        data_set: &mut dyn DataSetSource,
    ) -> Result<FilterOutcome, RuntimeError> {
        self.record
            .borrow_mut()
            .filters
            .push((filter.to_string(), generated_filter.to_string()));
        Ok(FilterOutcome {
            rows: vec![true; data_set.row_count()],
            warning: None,
        })
    }

    fn eval_code(&mut self, code: &str, mode: EvalMode) -> Evaluation {
        self.record.borrow_mut().evaluations.push((code.to_string(), mode));
        Evaluation::value(code)
    }

    fn materialize_data_set(&mut self, _variable: &str, _filtered: bool) {}

    fn detach(&mut self, _variable: &str) {}

    fn save_image(&mut self, _image: &ImageRequest, _settings: &Settings) -> Result<String, RuntimeError> {
        Ok("{}".to_string())
    }

    fn edit_image(&mut self, _options: &Value, _settings: &Settings) -> Result<String, RuntimeError> {
        Ok("{}".to_string())
    }

    fn rewrite_images(&mut self, _settings: &Settings) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// An engine wired to an in-process coordinator.
pub struct Harness {
    pub engine: Engine,
    pub coordinator: CoordinatorEnd,
    pub session: TempDir,
}

impl Harness {
    pub fn new(runtime: impl ComputeRuntime + 'static, data_set: InMemoryDataSet) -> Self {
        init_logging();
        let session = TempDir::new().unwrap();
        let config = WorkerConfig {
            poll_timeout: Duration::from_millis(5),
            session_root: session.path().join("session"),
            encode_column_names: true,
            ..WorkerConfig::default()
        };
        let (channel, coordinator) = memory_channel();
        let engine = Engine::new(config, channel, runtime, data_set).unwrap();
        Self {
            engine,
            coordinator,
            session,
        }
    }

    /// Runs the initialising iteration and discards its acknowledgement.
    pub fn started(mut self) -> Self {
        assert!(self.step());
        let acks = self.responses();
        assert_eq!(acks, vec![json!({ "typeRequest": "resuming" })]);
        self
    }

    pub fn send(&self, message: Value) {
        self.coordinator.send_json(&message);
    }

    /// A handle for injecting messages from inside a script.
    pub fn injector(&self) -> Sender<String> {
        self.coordinator.sender()
    }

    pub fn step(&mut self) -> bool {
        self.engine.step().unwrap()
    }

    pub fn responses(&self) -> Vec<Value> {
        self.coordinator.drain_json()
    }
}

pub fn data_set() -> InMemoryDataSet {
    InMemoryDataSet::new(["age", "weight kg", "group"], 4)
}

pub fn analysis(id: i64, perform: &str, options: Value) -> Value {
    json!({
        "typeRequest": "analysis",
        "id": id,
        "perform": perform,
        "name": "Ttest",
        "title": "T-Test",
        "revision": 1,
        "options": options,
    })
}

pub fn rich_analysis(id: i64, perform: &str, options: Value) -> Value {
    let mut message = analysis(id, perform, options);
    message["jaspResults"] = json!(true);
    message
}

pub fn inject(sender: &Sender<String>, message: Value) {
    sender.send(message.to_string()).unwrap();
}
