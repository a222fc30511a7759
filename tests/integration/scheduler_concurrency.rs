// tests/integration/scheduler_concurrency.rs

use std::sync::{Arc, Barrier};
use std::thread;

use jobwright::errors::JobwrightError;
use jobwright::scheduler::ScheduleStep;
use jobwright_test_utils::builders::{job_spec, scheduler};
use jobwright_test_utils::init_tracing;

#[test]
fn five_concurrent_schedules_on_four_slots_place_exactly_four() {
    init_tracing();
    let sched = Arc::new(scheduler(
        &[("n1", 2), ("n2", 2)],
        &[("gpu", &["n1", "n2"])],
    ));
    let barrier = Arc::new(Barrier::new(5));

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let sched = Arc::clone(&sched);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let spec = job_spec(&format!("job-{i}"), "gpu", 1);
                barrier.wait();
                let placed = sched.schedule(&spec).unwrap();
                (spec, placed)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let placed: Vec<_> = results.iter().filter(|(_, ok)| *ok).collect();
    let refused: Vec<_> = results.iter().filter(|(_, ok)| !*ok).collect();

    assert_eq!(placed.len(), 4);
    assert_eq!(refused.len(), 1);
    assert_eq!(sched.monitor().load_of("n1").unwrap(), 2);
    assert_eq!(sched.monitor().load_of("n2").unwrap(), 2);

    // The refused job keeps failing until someone releases.
    let waiting = &refused[0].0;
    assert!(!sched.schedule(waiting).unwrap());

    let freed = sched.release(placed[0].0.id()).unwrap();
    assert!(freed.is_some());
    assert!(sched.schedule(waiting).unwrap());
    assert_eq!(sched.assigned_count(), 4);
}

#[test]
fn many_threads_never_overfill_a_node() {
    let sched = Arc::new(scheduler(
        &[("a", 3), ("b", 5), ("c", 1)],
        &[("batch", &["a", "b", "c"])],
    ));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let sched = Arc::clone(&sched);
            thread::spawn(move || {
                let mut placed = 0;
                for i in 0..50 {
                    let spec = job_spec(&format!("t{t}-{i}"), "batch", 1 + (i % 2));
                    if sched.schedule(&spec).unwrap() {
                        placed += 1;
                        if i % 3 == 0 {
                            sched.release(spec.id()).unwrap();
                        }
                    }
                    for n in sched.monitor().snapshot() {
                        assert!(n.load <= n.node.capacity, "{} overfilled", n.node);
                    }
                }
                placed
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    let total: u32 = sched.monitor().snapshot().iter().map(|n| n.load).sum();
    assert!(total <= 9);
}

#[test]
fn prefers_least_loaded_node_then_lowest_id() {
    let sched = scheduler(&[("n-b", 4), ("n-a", 4)], &[("q", &["n-b", "n-a"])]);

    let first = sched.step_schedule(&job_spec("j1", "q", 1)).unwrap();
    assert_eq!(first.node().map(|n| n.node_id.as_str()), Some("n-a"));

    let second = sched.step_schedule(&job_spec("j2", "q", 1)).unwrap();
    assert_eq!(second.node().map(|n| n.node_id.as_str()), Some("n-b"));

    // Tied at load 1: the heavier job goes to n-a.
    let third = sched.step_schedule(&job_spec("j3", "q", 2)).unwrap();
    assert!(matches!(third, ScheduleStep::Assigned { load_after: 3, .. }));
    let next = sched.node_available(&job_spec("j4", "q", 1)).unwrap().unwrap();
    assert_eq!(next.node_id, "n-b");
}

#[test]
fn job_too_heavy_for_every_node_is_not_placed() {
    let sched = scheduler(&[("small", 1)], &[("q", &["small"])]);
    let step = sched.step_schedule(&job_spec("big", "q", 2)).unwrap();
    assert_eq!(step, ScheduleStep::NoCapacity { queue_nodes: 1 });
    assert_eq!(sched.monitor().load_of("small").unwrap(), 0);
}

#[test]
fn unknown_queue_is_a_scheduler_error() {
    let sched = scheduler(&[("n1", 1)], &[("q", &["n1"])]);
    match sched.schedule(&job_spec("j", "nowhere", 1)) {
        Err(JobwrightError::Scheduler(msg)) => assert!(msg.contains("nowhere"), "{msg}"),
        other => panic!("expected scheduler error, got {other:?}"),
    }
}

#[test]
fn release_is_idempotent() {
    let sched = scheduler(&[("n1", 1)], &[("q", &["n1"])]);
    let spec = job_spec("j", "q", 1);
    assert!(sched.schedule(&spec).unwrap());

    assert_eq!(sched.release("j").unwrap().as_deref(), Some("n1"));
    assert_eq!(sched.release("j").unwrap(), None);
    assert_eq!(sched.monitor().load_of("n1").unwrap(), 0);
}
