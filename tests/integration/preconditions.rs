// tests/integration/preconditions.rs

use std::sync::Arc;
use std::time::Duration;

use jobwright::model::{Metadata, PreconditionSpec, TaskModel, WorkflowModel};
use jobwright::precondition::{
    ConditionClock, ConditionContext, ConditionRules, Precondition, PreconditionEvaluator,
    PreconditionRegistry, RegistryError,
};
use jobwright::types::Priority;
use jobwright::workflow::{Release, WorkflowProcessor, WorkflowState};
use jobwright_test_utils::builders::TaskBuilder;
use jobwright_test_utils::fakes::CountingPrecondition;
use jobwright_test_utils::init_tracing;

fn submitted(task: TaskModel, metadata: Metadata) -> WorkflowProcessor {
    let model = Arc::new(WorkflowModel::new("wf", vec![task]));
    let mut p = WorkflowProcessor::new(
        "i1",
        model,
        metadata,
        Priority::NORMAL,
        0,
        &PreconditionRegistry::builtin(),
    )
    .unwrap();
    p.submit().unwrap();
    p
}

#[test]
fn evaluation_stops_at_first_failure() {
    init_tracing();
    let first = CountingPrecondition::new("first", true);
    let second = CountingPrecondition::new("second", false);
    let third = CountingPrecondition::new("third", true);

    let evaluator = PreconditionEvaluator::new(vec![
        Arc::clone(&first) as Arc<dyn Precondition>,
        Arc::clone(&second) as Arc<dyn Precondition>,
        Arc::clone(&third) as Arc<dyn Precondition>,
    ]);

    let metadata = Metadata::new();
    let ctx = ConditionContext::new(&metadata, 1);
    assert!(!evaluator.passes_preconditions(&ctx));

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_eq!(third.calls(), 0);
    assert_eq!(evaluator.first_failure(&ctx), Some("second"));
}

#[test]
fn empty_list_passes() {
    let evaluator = PreconditionEvaluator::new(Vec::new());
    let metadata = Metadata::new();
    assert!(evaluator.is_empty());
    assert!(evaluator.passes_preconditions(&ConditionContext::new(&metadata, 0)));
}

#[test]
fn builtin_kinds_read_metadata_and_slots() {
    let registry = PreconditionRegistry::builtin();
    let specs = vec![
        PreconditionSpec::new("has-input", "metadata_present").with_param("key", "InputFile"),
        PreconditionSpec::new("is-raw", "metadata_equals")
            .with_param("key", "Format")
            .with_param("value", "raw"),
        PreconditionSpec::new("two-free", "open_slots").with_param("min", "2"),
    ];
    let evaluator = PreconditionEvaluator::new(registry.build_all(&specs).unwrap());

    let mut metadata = Metadata::new();
    assert_eq!(
        evaluator.first_failure(&ConditionContext::new(&metadata, 4)),
        Some("has-input")
    );

    metadata.add("InputFile", "/data/a.dat");
    metadata.add("Format", "cooked");
    assert_eq!(
        evaluator.first_failure(&ConditionContext::new(&metadata, 4)),
        Some("is-raw")
    );

    // Any value of a multi-valued key may match.
    metadata.add("Format", "raw");
    assert_eq!(
        evaluator.first_failure(&ConditionContext::new(&metadata, 1)),
        Some("two-free")
    );
    assert!(evaluator.passes_preconditions(&ConditionContext::new(&metadata, 2)));
}

#[test]
fn registry_rejects_bad_specs() {
    let registry = PreconditionRegistry::builtin();

    let unknown = registry.build(&PreconditionSpec::new("p", "telepathy")).unwrap_err();
    assert_eq!(
        unknown,
        RegistryError::UnknownKind {
            id: "p".into(),
            kind: "telepathy".into()
        }
    );

    let missing = registry
        .build(&PreconditionSpec::new("p", "metadata_present"))
        .unwrap_err();
    assert!(matches!(missing, RegistryError::MissingParam { param: "key", .. }));

    let invalid = registry
        .build(&PreconditionSpec::new("p", "open_slots").with_param("min", "lots"))
        .unwrap_err();
    assert!(matches!(invalid, RegistryError::InvalidParam { param: "min", .. }));
}

#[derive(Debug)]
struct EvenSlots {
    id: String,
}

impl Precondition for EvenSlots {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, ctx: &ConditionContext<'_>) -> bool {
        ctx.open_slots % 2 == 0
    }
}

fn build_even_slots(spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
    Ok(Arc::new(EvenSlots {
        id: spec.id.clone(),
    }))
}

#[test]
fn custom_kinds_can_be_registered() {
    let mut registry = PreconditionRegistry::empty();
    assert!(registry.build(&PreconditionSpec::new("p", "always")).is_err());

    registry.register("even_slots", build_even_slots);
    assert_eq!(registry.kinds(), vec!["even_slots"]);

    let pre = registry.build(&PreconditionSpec::new("even", "even_slots")).unwrap();
    let metadata = Metadata::new();
    assert!(pre.passes(&ConditionContext::new(&metadata, 2)));
    assert!(!pre.passes(&ConditionContext::new(&metadata, 3)));
    assert_eq!(pre.id(), "even");
}

#[test]
fn optional_precondition_never_blocks() {
    let task = TaskBuilder::new("t", "true")
        .precondition(PreconditionSpec::new("nice-to-have", "never").optional())
        .build();
    let mut p = submitted(task, Metadata::new());

    assert!(matches!(p.try_release(1).unwrap(), Release::Ready(_)));
    assert_eq!(p.times_blocked(), 0);
}

#[test]
fn optional_failure_does_not_hide_a_required_one() {
    let first = CountingPrecondition::new("soft", false);
    let second = CountingPrecondition::new("hard", false);
    let optional = ConditionRules {
        optional: true,
        timeout: None,
    };
    let evaluator = PreconditionEvaluator::with_rules(vec![
        (Arc::clone(&first) as Arc<dyn Precondition>, optional),
        (Arc::clone(&second) as Arc<dyn Precondition>, ConditionRules::default()),
    ]);

    let metadata = Metadata::new();
    assert_eq!(evaluator.first_failure(&ConditionContext::new(&metadata, 0)), Some("hard"));
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn precondition_counts_as_met_after_its_timeout() {
    let task = TaskBuilder::new("t", "true")
        .precondition(PreconditionSpec::new("slow-feed", "never").with_timeout_secs(30))
        .build();
    let mut p = submitted(task, Metadata::new());

    assert_eq!(p.try_release(1).unwrap(), Release::Blocked("slow-feed".into()));

    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(p.try_release(1).unwrap(), Release::Blocked("slow-feed".into()));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(matches!(p.try_release(1).unwrap(), Release::Ready(_)));
    assert_eq!(p.state(), &WorkflowState::Running);
    assert_eq!(p.times_blocked(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_clock_starts_at_first_evaluation() {
    let never = CountingPrecondition::new("gate", false);
    let evaluator = PreconditionEvaluator::with_rules(vec![(
        never as Arc<dyn Precondition>,
        ConditionRules {
            optional: false,
            timeout: Some(Duration::from_secs(10)),
        },
    )]);
    let metadata = Metadata::new();
    let ctx = ConditionContext::new(&metadata, 0);
    let mut clock = ConditionClock::new();

    // Time passing before the first evaluation does not count.
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(evaluator.first_blocking(&ctx, &mut clock), Some("gate"));

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(evaluator.first_blocking(&ctx, &mut clock), None);
}

#[test]
fn missing_required_metadata_fails_instance() {
    let task = TaskBuilder::new("fetch", "true").requires("InputFile").build();
    let mut p = submitted(task, Metadata::new());

    assert_eq!(p.try_release(1).unwrap(), Release::Idle);
    match p.state() {
        WorkflowState::Failed { reason } => assert!(reason.contains("'InputFile'"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn required_metadata_present_releases_task() {
    let task = TaskBuilder::new("fetch", "true").requires("InputFile").build();
    let mut metadata = Metadata::new();
    metadata.add("InputFile", "/data/in.dat");
    let mut p = submitted(task, metadata);

    assert!(matches!(p.try_release(1).unwrap(), Release::Ready(_)));
}
