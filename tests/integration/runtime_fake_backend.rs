// tests/integration/runtime_fake_backend.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use jobwright::batch::BatchManager;
use jobwright::model::JobStatus;
use jobwright::resource::{QueueManager, ResourceMonitor, ResourceNode};
use jobwright::runtime::{JobOutcome, ManagerCore, ManagerEvent, Runtime, RuntimeOptions};
use jobwright::scheduler::Scheduler;
use jobwright_test_utils::builders::job_spec;
use jobwright_test_utils::fakes::{FakeBackend, FakeDispatch};
use jobwright_test_utils::{init_tracing, with_timeout};

use crate::common::{closed_port, report_of, single_node};

fn once_options() -> RuntimeOptions {
    RuntimeOptions {
        exit_when_idle: true,
        retry_interval: Duration::from_millis(10),
        ..RuntimeOptions::default()
    }
}


#[tokio::test]
async fn jobs_beyond_capacity_wait_for_a_release() {
    init_tracing();
    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBackend::completing(tx.clone());
    let log = backend.dispatch_log();
    let batch = Arc::new(BatchManager::new(backend, Duration::from_secs(1)));
    let core = ManagerCore::new(single_node(1), 10, once_options());
    let runtime = Runtime::new(core, rx, &tx, batch);

    for id in ["j1", "j2", "j3"] {
        tx.send(ManagerEvent::JobSubmitted {
            spec: job_spec(id, "q", 1),
        })
        .await
        .unwrap();
    }

    let reports = with_timeout(runtime.run()).await.unwrap();

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.status == JobStatus::Success));
    let order: Vec<String> = log.lock().iter().map(|(job, _)| job.clone()).collect();
    assert_eq!(order, vec!["j1", "j2", "j3"]);
}

#[tokio::test]
async fn rejected_dispatch_is_requeued_and_retried() {
    init_tracing();
    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBackend::completing(tx.clone()).then(FakeDispatch::Reject("node busy".into()));
    let log = backend.dispatch_log();
    let batch = Arc::new(BatchManager::new(backend, Duration::from_secs(1)));
    let core = ManagerCore::new(single_node(2), 10, once_options());
    let runtime = Runtime::new(core, rx, &tx, batch);

    tx.send(ManagerEvent::JobSubmitted {
        spec: job_spec("j1", "q", 2),
    })
    .await
    .unwrap();

    let reports = with_timeout(runtime.run()).await.unwrap();
    let r = report_of(&reports, "j1");
    assert_eq!(r.status, JobStatus::Success);
    assert_eq!(r.retries, 1);
    assert_eq!(r.node_id.as_deref(), Some("n1"));
    assert_eq!(log.lock().len(), 2);
}

#[tokio::test]
async fn failed_job_is_reported_and_frees_capacity() {
    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBackend::completing(tx.clone())
        .then(FakeDispatch::Complete(JobOutcome::Failure("exit 2".into())));
    let batch = Arc::new(BatchManager::new(backend, Duration::from_secs(1)));
    let core = ManagerCore::new(single_node(1), 10, once_options());
    let runtime = Runtime::new(core, rx, &tx, batch);

    for id in ["bad", "good"] {
        tx.send(ManagerEvent::JobSubmitted {
            spec: job_spec(id, "q", 1),
        })
        .await
        .unwrap();
    }

    let reports = with_timeout(runtime.run()).await.unwrap();
    let bad = report_of(&reports, "bad");
    assert_eq!(bad.status, JobStatus::Failure);
    assert_eq!(bad.last_error.as_deref(), Some("exit 2"));
    assert_eq!(report_of(&reports, "good").status, JobStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn dispatch_timeout_requeues_job() {
    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBackend::completing(tx.clone()).then(FakeDispatch::Hang);
    let batch = Arc::new(BatchManager::new(backend, Duration::from_millis(100)));
    let core = ManagerCore::new(single_node(1), 10, once_options());
    let runtime = Runtime::new(core, rx, &tx, batch);

    tx.send(ManagerEvent::JobSubmitted {
        spec: job_spec("slow", "q", 1),
    })
    .await
    .unwrap();

    let reports = runtime.run().await.unwrap();
    let r = report_of(&reports, "slow");
    assert_eq!(r.status, JobStatus::Success);
    assert_eq!(r.retries, 1);
    assert!(
        r.last_error.as_deref().is_some_and(|e| e.contains("timed out")),
        "{r:?}"
    );
}

#[tokio::test]
async fn pending_job_can_be_cancelled() {
    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBackend::accepting(tx.clone());
    let batch = Arc::new(BatchManager::new(backend, Duration::from_secs(1)));
    let core = ManagerCore::new(single_node(1), 10, RuntimeOptions::default());
    let runtime = Runtime::new(core, rx, &tx, batch);

    tx.send(ManagerEvent::JobSubmitted {
        spec: job_spec("running", "q", 1),
    })
    .await
    .unwrap();
    tx.send(ManagerEvent::JobSubmitted {
        spec: job_spec("waiting", "q", 1),
    })
    .await
    .unwrap();
    tx.send(ManagerEvent::CancelRequested {
        job_id: "waiting".into(),
    })
    .await
    .unwrap();
    tx.send(ManagerEvent::ShutdownRequested).await.unwrap();

    let reports = with_timeout(runtime.run()).await.unwrap();
    assert_eq!(report_of(&reports, "waiting").status, JobStatus::Killed);
    assert!(!report_of(&reports, "running").status.is_terminal());
}

#[tokio::test]
async fn unreachable_node_requeues_job() {
    init_tracing();
    let addr = closed_port().await;
    let monitor = ResourceMonitor::from_nodes([ResourceNode::new("n1", addr.to_string(), 1)]).unwrap();
    let queues = QueueManager::from_queues([("q", vec!["n1".to_string()])], &monitor).unwrap();
    let scheduler = Scheduler::new(Arc::new(monitor), Arc::new(queues));

    let (tx, rx) = mpsc::channel(64);
    let backend = FakeBackend::completing(tx.clone());
    let log = backend.dispatch_log();
    let batch = Arc::new(BatchManager::new(backend, Duration::from_secs(1)).with_probe(true));
    // No retry tick during the test.
    let options = RuntimeOptions {
        retry_interval: Duration::from_secs(3600),
        ..RuntimeOptions::default()
    };
    let runtime = Runtime::new(ManagerCore::new(scheduler, 10, options), rx, &tx, batch);
    let handle = tokio::spawn(runtime.run());

    tx.send(ManagerEvent::JobSubmitted {
        spec: job_spec("j1", "q", 1),
    })
    .await
    .unwrap();
    // Refused connects fail fast; give the failure time to come back.
    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(ManagerEvent::ShutdownRequested).await.unwrap();

    let reports = with_timeout(handle).await.unwrap().unwrap();
    let r = report_of(&reports, "j1");
    assert_eq!(r.status, JobStatus::Queued);
    assert_eq!(r.retries, 1);
    assert!(
        r.last_error.as_deref().is_some_and(|e| e.contains("unreachable")),
        "{r:?}"
    );
    assert!(log.lock().is_empty());
}
