// tests/integration/workflow_engine.rs

use jobwright::engine::EngineRunner;
use jobwright::errors::EngineError;
use jobwright::model::{Metadata, PreconditionSpec, WorkflowModel};
use jobwright::precondition::PreconditionRegistry;
use jobwright::types::Priority;
use jobwright::workflow::{WorkflowEngine, WorkflowState, WorkflowStateMachine};
use jobwright_test_utils::builders::TaskBuilder;
use jobwright_test_utils::fakes::RecordingListener;
use jobwright_test_utils::{init_tracing, with_timeout};

fn engine(slots: usize) -> WorkflowEngine {
    WorkflowEngine::new(EngineRunner::new(slots), PreconditionRegistry::builtin())
        .with_poll_interval(std::time::Duration::from_millis(5))
}

fn model(id: &str, cmds: &[&str]) -> WorkflowModel {
    let tasks = cmds
        .iter()
        .enumerate()
        .map(|(i, cmd)| TaskBuilder::new(&format!("t{i}"), cmd).build())
        .collect();
    WorkflowModel::new(id, tasks)
}

#[test]
fn completed_instance_cannot_run_again() {
    let mut m = WorkflowStateMachine::new("wf");
    for s in [
        WorkflowState::Queued,
        WorkflowState::Running,
        WorkflowState::Completed,
    ] {
        m.transition(s).unwrap();
    }

    let err = m.transition(WorkflowState::Running).unwrap_err();
    assert!(matches!(
        &err,
        EngineError::IllegalTransition { from, to } if from == "completed" && to == "running"
    ));
    assert_eq!(m.state(), &WorkflowState::Completed);
    assert_eq!(m.history().len(), 3);
}

#[test]
fn unlisted_transitions_are_rejected() {
    let mut m = WorkflowStateMachine::new("wf");
    assert!(m.transition(WorkflowState::Running).is_err());
    assert!(m.transition(WorkflowState::Paused).is_err());
    assert_eq!(m.state(), &WorkflowState::Created);
    assert!(m.history().is_empty());
}

#[test]
fn cancel_before_dispatch_fails_instance() {
    let mut engine = engine(1);
    let id = engine
        .start_workflow(model("wf", &["true"]), Metadata::new(), None)
        .unwrap();
    assert_eq!(engine.state_of(&id), Some(WorkflowState::Queued));

    engine.cancel(&id).unwrap();
    assert_eq!(
        engine.state_of(&id),
        Some(WorkflowState::Failed {
            reason: "cancelled".into()
        })
    );
    assert!(engine.is_idle());
    assert!(engine.cancel("no-such-instance").is_err());
}

#[test]
fn unknown_precondition_kind_is_refused_at_start() {
    let mut engine = engine(1);
    let wf = WorkflowModel::new(
        "wf",
        vec![TaskBuilder::new("t", "true")
            .precondition(PreconditionSpec::new("p", "telepathy"))
            .build()],
    );
    assert!(engine.start_workflow(wf, Metadata::new(), None).is_err());
    assert!(engine.instances().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn runs_tasks_in_order_and_records_receipt() {
    init_tracing();
    let listener = RecordingListener::new();
    let mut engine = engine(2);
    engine.add_listener(listener.clone());

    let mut metadata = Metadata::new();
    metadata.add("Run", "42");
    let id = engine
        .start_workflow(model("ingest", &["true", "true"]), metadata, None)
        .unwrap();

    let summaries = with_timeout(engine.run_until_idle()).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].state, WorkflowState::Completed);
    assert_eq!(summaries[0].completed_tasks, 2);

    assert_eq!(
        listener.transitions_of(&id),
        vec![
            ("created".to_string(), "queued".to_string()),
            ("queued".to_string(), "running".to_string()),
            ("running".to_string(), "completed".to_string()),
        ]
    );

    let receipt = engine.completion_receipt(&id).unwrap();
    assert_eq!(receipt.receipt().transaction_id(), id);
    assert_eq!(receipt.receipt().catalog_ids().len(), 2);
    assert_eq!(receipt.metadata().get("Run"), Some("42"));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_task_fails_instance() {
    let mut engine = engine(1);
    let id = engine
        .start_workflow(model("wf", &["exit 1", "true"]), Metadata::new(), None)
        .unwrap();

    with_timeout(engine.run_until_idle()).await.unwrap();

    match engine.state_of(&id) {
        Some(WorkflowState::Failed { reason }) => assert!(reason.contains("'t0'"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(engine.completion_receipt(&id).is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn higher_priority_is_released_first() {
    let mut engine = engine(1);
    let low = engine
        .start_workflow(model("low", &["true"]), Metadata::new(), Some(Priority::LOW))
        .unwrap();
    let high = engine
        .start_workflow(model("high", &["true"]), Metadata::new(), Some(Priority::HIGH))
        .unwrap();

    let report = engine.tick().await.unwrap();
    assert_eq!(report.released, 1);
    assert_eq!(engine.state_of(&high), Some(WorkflowState::Running));
    assert_eq!(engine.state_of(&low), Some(WorkflowState::Queued));

    with_timeout(engine.run_until_idle()).await.unwrap();
    assert_eq!(engine.state_of(&low), Some(WorkflowState::Completed));
}

#[cfg(unix)]
#[tokio::test]
async fn waits_for_metadata_then_runs() {
    let mut engine = engine(1);
    let wf = WorkflowModel::new(
        "wf",
        vec![TaskBuilder::new("fetch", "true")
            .precondition(
                PreconditionSpec::new("has-input", "metadata_present").with_param("key", "InputFile"),
            )
            .build()],
    );
    let id = engine.start_workflow(wf, Metadata::new(), None).unwrap();

    let report = engine.tick().await.unwrap();
    assert_eq!(report.released, 0);
    assert_eq!(
        engine.state_of(&id),
        Some(WorkflowState::Waiting {
            condition: "has-input".into()
        })
    );

    // Still blocked: waiting is not re-entered.
    engine.tick().await.unwrap();
    assert_eq!(engine.processor(&id).unwrap().times_blocked(), 1);

    engine.add_metadata(&id, "InputFile", "/data/in.dat").unwrap();
    let report = engine.tick().await.unwrap();
    assert_eq!(report.released, 1);

    with_timeout(engine.run_until_idle()).await.unwrap();
    assert_eq!(engine.state_of(&id), Some(WorkflowState::Completed));
}

#[cfg(unix)]
#[tokio::test]
async fn stalls_instead_of_spinning_on_unmet_condition() {
    let mut engine = engine(1);
    let wf = WorkflowModel::new(
        "wf",
        vec![TaskBuilder::new("t", "true")
            .precondition(PreconditionSpec::new("nope", "never"))
            .build()],
    );
    let id = engine.start_workflow(wf, Metadata::new(), None).unwrap();

    let summaries = with_timeout(engine.run_until_idle()).await.unwrap();
    assert!(matches!(summaries[0].state, WorkflowState::Waiting { .. }));
    assert_eq!(summaries[0].times_blocked, 1);
    assert!(!engine.is_idle());
    assert_eq!(engine.runner().used_slots(), 0);
    assert!(engine.state_of(&id).is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn result_arriving_while_paused_applies_on_resume() {
    let mut engine = engine(1);
    let id = engine
        .start_workflow(model("wf", &["sleep 0.1"]), Metadata::new(), None)
        .unwrap();

    engine.tick().await.unwrap();
    assert!(engine.processor(&id).unwrap().has_task_in_flight());
    engine.pause(&id).unwrap();

    // The task finishes while paused; the engine stalls rather than exits.
    with_timeout(engine.run_until_idle()).await.unwrap();
    assert_eq!(engine.state_of(&id), Some(WorkflowState::Paused));
    assert!(engine.cancel(&id).is_err());

    engine.resume(&id).unwrap();
    assert_eq!(engine.state_of(&id), Some(WorkflowState::Completed));
    assert!(engine.completion_receipt(&id).is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn run_stops_on_shutdown_signal() {
    let mut engine = engine(1);
    engine
        .start_workflow(
            WorkflowModel::new(
                "wf",
                vec![TaskBuilder::new("t", "true")
                    .precondition(PreconditionSpec::new("nope", "never"))
                    .build()],
            ),
            Metadata::new(),
            None,
        )
        .unwrap();

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(engine.run(rx, false));
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    tx.send(true).unwrap();

    let summaries = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(!summaries[0].state.is_done());
}

#[cfg(unix)]
#[tokio::test]
async fn finished_instances_are_bounded_and_prunable() {
    let mut engine = engine(3).with_retention(1);
    let ids: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            engine
                .start_workflow(model(name, &["true"]), Metadata::new(), None)
                .unwrap()
        })
        .collect();

    let summaries = with_timeout(engine.run_until_idle()).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].model_id, "c");
    assert!(engine.state_of(&ids[0]).is_none());
    assert!(engine.completion_receipt(&ids[0]).is_none());
    assert!(engine.completion_receipt(&ids[2]).is_some());

    assert_eq!(engine.prune_finished(), 1);
    assert!(engine.instances().is_empty());
    assert!(engine.completion_receipt(&ids[2]).is_none());
}
