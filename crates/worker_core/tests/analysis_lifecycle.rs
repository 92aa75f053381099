use std::sync::Once;

use pretty_assertions::assert_eq;
use serde_json::json;
use worker_core::{
    AnalysisRequest, AnalysisStatus, Directive, Emission, EngineMachine, EngineState, Perform,
    RunOutcome, RunStep,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn idle_machine() -> EngineMachine {
    let mut machine = EngineMachine::new();
    machine.finish_initialization().unwrap();
    machine
}

fn request(id: i64, perform: &str, rich: bool) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(id, Perform::from_name(perform));
    request.name = "Ttest".into();
    request.jasp_results = rich;
    request.options = json!({ "variables": ["a"], "perform": perform });
    request
}

#[test]
fn fresh_run_goes_idle_analysis_idle() {
    init_logging();
    let mut machine = idle_machine();

    let status = machine.receive_analysis(request(7, "run", false), false).unwrap();
    assert_eq!(status, AnalysisStatus::ToRun);
    assert_eq!(machine.state(), EngineState::Analysis);

    let step = machine.begin_run().unwrap();
    assert_eq!(
        step,
        RunStep::Invoke {
            perform: Perform::Run,
            rich_results: false
        }
    );
    assert_eq!(machine.analysis_status(), AnalysisStatus::Running);

    let outcome = machine.finish_run(false).unwrap();
    assert_eq!(outcome, RunOutcome::Deliver { send: true });
    assert_eq!(machine.analysis_status(), AnalysisStatus::Complete);
    assert_eq!(machine.slot().progress(), -1);

    machine.complete_run().unwrap();
    assert_eq!(machine.state(), EngineState::Idle);
    assert_eq!(machine.analysis_status(), AnalysisStatus::Empty);
    assert_eq!(machine.slot().id(), Some(7));
}

#[test]
fn classic_init_reports_inited() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(1, "init", false), false).unwrap();

    assert_eq!(
        machine.begin_run().unwrap(),
        RunStep::Invoke {
            perform: Perform::Init,
            rich_results: false
        }
    );
    assert_eq!(machine.analysis_status(), AnalysisStatus::Initing);
    assert_eq!(machine.finish_run(false).unwrap(), RunOutcome::Deliver { send: true });
    assert_eq!(machine.analysis_status(), AnalysisStatus::Inited);
}

#[test]
fn rich_init_runs_directly_and_sends_nothing_at_the_end() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(1, "init", true), false).unwrap();

    assert_eq!(
        machine.begin_run().unwrap(),
        RunStep::Invoke {
            perform: Perform::Run,
            rich_results: true
        }
    );
    assert_eq!(machine.finish_run(false).unwrap(), RunOutcome::Deliver { send: false });
    assert_eq!(machine.analysis_status(), AnalysisStatus::Running);
}

#[test]
fn same_id_run_under_rich_results_becomes_changed_with_new_options() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(3, "run", true), false).unwrap();
    machine.begin_run().unwrap();

    let mut update = request(3, "run", true);
    update.options = json!({ "variables": ["a", "b"] });
    let status = machine.receive_analysis(update, false).unwrap();
    assert_eq!(status, AnalysisStatus::Changed);

    let checkpoint = machine.checkpoint(false, -1);
    assert_eq!(checkpoint.emission, Emission::None);
    assert_eq!(
        checkpoint.directive,
        Directive::Changed {
            options: json!({ "variables": ["a", "b"] })
        }
    );

    // Runtime incorporated the change and returned a payload.
    assert_eq!(machine.finish_run(false).unwrap(), RunOutcome::Deliver { send: false });
}

#[test]
fn same_id_run_under_classic_protocol_aborts() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(3, "run", false), false).unwrap();
    machine.begin_run().unwrap();

    let before = machine.slot().pending().cloned();
    let mut update = request(3, "run", false);
    update.title = "renamed".into();
    assert_eq!(
        machine.receive_analysis(update, false).unwrap(),
        AnalysisStatus::Aborted
    );
    assert_eq!(machine.slot().pending().cloned(), before);
    assert_eq!(machine.checkpoint(true, 50).directive, Directive::Aborted);

    assert_eq!(machine.finish_run(false).unwrap(), RunOutcome::Dropped);
    assert_eq!(machine.state(), EngineState::Idle);
    assert_eq!(machine.analysis_status(), AnalysisStatus::Empty);
}

#[test]
fn same_id_init_changes_even_classic_analyses() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(3, "run", false), false).unwrap();
    machine.begin_run().unwrap();

    assert_eq!(
        machine.receive_analysis(request(3, "init", false), false).unwrap(),
        AnalysisStatus::Changed
    );
}

#[test]
fn different_id_supersedes_running_analysis() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(1, "run", true), false).unwrap();
    machine.begin_run().unwrap();

    assert_eq!(
        machine.receive_analysis(request(2, "run", true), false).unwrap(),
        AnalysisStatus::ToRun
    );
    assert_eq!(machine.checkpoint(true, 10).directive, Directive::Aborted);
    assert_eq!(machine.finish_run(false).unwrap(), RunOutcome::Superseded);
    assert_eq!(machine.state(), EngineState::Analysis);

    assert_eq!(
        machine.begin_run().unwrap(),
        RunStep::Invoke {
            perform: Perform::Run,
            rich_results: true
        }
    );
    assert_eq!(machine.slot().id(), Some(2));
}

#[test]
fn change_never_seen_by_runtime_restarts_without_discarding() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(5, "run", true), false).unwrap();
    machine.begin_run().unwrap();
    machine.receive_analysis(request(5, "run", true), false).unwrap();

    assert_eq!(
        machine.finish_run(false).unwrap(),
        RunOutcome::Restart {
            discard_temp_files: false
        }
    );
    assert_eq!(machine.analysis_status(), AnalysisStatus::ToInit);
    assert_eq!(machine.state(), EngineState::Analysis);
}

#[test]
fn null_payload_after_change_restarts_and_discards() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(5, "run", true), false).unwrap();
    machine.begin_run().unwrap();
    machine.receive_analysis(request(5, "run", true), false).unwrap();
    assert!(matches!(
        machine.checkpoint(false, -1).directive,
        Directive::Changed { .. }
    ));

    assert_eq!(
        machine.finish_run(true).unwrap(),
        RunOutcome::Restart {
            discard_temp_files: true
        }
    );
    assert_eq!(
        machine.begin_run().unwrap(),
        RunStep::Invoke {
            perform: Perform::Run,
            rich_results: true
        }
    );
}

#[test]
fn unknown_perform_is_an_analysis_error_not_a_state_change() {
    init_logging();
    let mut machine = idle_machine();
    assert_eq!(
        machine.receive_analysis(request(9, "explode", false), false).unwrap(),
        AnalysisStatus::Error
    );
    assert_eq!(machine.state(), EngineState::Idle);
    assert!(machine.slot().pending().is_none());
}

#[test]
fn image_requests_bypass_the_run_pipeline() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(2, "saveImg", false), false).unwrap();
    assert_eq!(machine.begin_run().unwrap(), RunStep::SaveImage);

    machine.complete_image();
    assert_eq!(machine.analysis_status(), AnalysisStatus::Complete);
    machine.complete_run().unwrap();
    assert_eq!(machine.state(), EngineState::Idle);
}

#[test]
fn aborted_slot_is_cleared_on_next_iteration() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(2, "run", false), false).unwrap();
    machine.stop().unwrap();
    assert_eq!(machine.analysis_status(), AnalysisStatus::Aborted);
    assert_eq!(machine.state(), EngineState::Stopped);
}

#[test]
fn developer_mode_is_captured_in_the_snapshot() {
    init_logging();
    let mut machine = idle_machine();
    machine.receive_analysis(request(2, "run", false), true).unwrap();
    assert!(machine.slot().pending().unwrap().developer_mode);
}
