//! Full pipeline runs: register → optimize → DESIGN, plus session artifacts.

use std::sync::Arc;

use chipforge_core::{
    read_session_artifact, stage, write_session_artifact, DesignError, DesignPipeline,
    DesignRequest, Designer, LifecycleStore, LifecycleTracker, MemoryLifecycleStore,
    PipelineConfig, Requirements, SessionOutcome, StagePlan, SurrealLifecycleStore,
};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

async fn check_reference_run<S: LifecycleStore>(pipeline: &DesignPipeline<S>) {
    let request = DesignRequest::new("chip-a", "proj-1", Requirements::new(2.0, 5.0, 50.0));
    let report = pipeline
        .run(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::Converged);
    assert!(report.quality.passed());
    assert_eq!(report.history.stages(), vec![stage::REGISTERED, stage::DESIGN]);

    let design = report.history.latest().unwrap();
    assert_eq!(design.payload.snapshot.as_ref(), Some(&report.snapshot));
    assert_eq!(design.payload.analysis.as_ref(), Some(&report.analysis));
    assert_eq!(design.payload.notes["outcome"], "converged");

    let registered = report.history.iter().next().unwrap();
    assert_eq!(
        registered.payload.requirements,
        Some(Requirements::new(2.0, 5.0, 50.0))
    );

    let stored = pipeline.tracker().load_requirements("chip-a").await.unwrap();
    assert_eq!(stored, Some(Requirements::new(2.0, 5.0, 50.0)));
    let session = pipeline.load_session("chip-a").await.unwrap().unwrap();
    assert_eq!(session.session_id, report.session_id);
    assert_eq!(session.best().snapshot, report.snapshot);
}

#[tokio::test]
async fn memory_reference_run() {
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap();
    check_reference_run(&pipeline).await;
}

#[tokio::test]
async fn surreal_reference_run() {
    let store = SurrealLifecycleStore::in_memory().await.unwrap();
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), store).unwrap();
    check_reference_run(&pipeline).await;
}

#[tokio::test]
async fn same_seed_gives_same_design() {
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap();
    let req = Requirements::new(2.0, 5.0, 50.0).with_throughput(4.0);

    let a = pipeline
        .run(DesignRequest::new("a", "p", req.clone()).with_seed(9), &CancellationToken::new())
        .await
        .unwrap();
    let b = pipeline
        .run(DesignRequest::new("b", "p", req).with_seed(9), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(a.snapshot.id(), b.snapshot.id());
    assert_eq!(a.analysis.overall.to_bits(), b.analysis.overall.to_bits());
}

#[tokio::test]
async fn duplicate_chip_is_rejected_before_optimizing() {
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap();
    let request = DesignRequest::new("c1", "p", Requirements::new(2.0, 5.0, 50.0));
    pipeline.run(request.clone(), &CancellationToken::new()).await.unwrap();

    let err = pipeline.run(request, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DesignError::DuplicateChip { .. }));
    assert_eq!(pipeline.tracker().history("c1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn infeasible_request_leaves_chip_registered() {
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap();
    let request = DesignRequest::new("tiny", "p", Requirements::new(2.0, 0.1, 50.0));
    let err = pipeline.run(request, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DesignError::InfeasibleRequirements { .. }));

    let status = pipeline.tracker().status("tiny").await.unwrap();
    assert_eq!(status.stage, stage::REGISTERED);
}

#[tokio::test]
async fn invalid_requirements_register_nothing() {
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap();
    let request = DesignRequest::new("bad", "p", Requirements::new(0.0, 5.0, 50.0));
    let err = pipeline.run(request, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DesignError::InvalidRequirements(_)));
    assert!(pipeline.tracker().list_chips().await.unwrap().is_empty());
}

fn plan(stages: &[&str]) -> StagePlan {
    StagePlan::new(stages.iter().map(|s| s.to_string()).collect()).unwrap()
}

#[tokio::test]
async fn plan_without_design_stage_is_rejected_up_front() {
    let mut config = PipelineConfig::default();
    config.lifecycle.stages = plan(&["INTAKE", "SIGNOFF"]);
    let err = DesignPipeline::from_config(config.clone(), MemoryLifecycleStore::new())
        .err()
        .unwrap();
    assert!(matches!(err, DesignError::InvalidConfig(ref m) if m.contains("DESIGN")));
    assert!(matches!(Designer::new(config), Err(DesignError::InvalidConfig(_))));

    // a tracker built by hand is checked before anything is registered
    let designer = Designer::new(PipelineConfig::default()).unwrap();
    let tracker = LifecycleTracker::with_plan(MemoryLifecycleStore::new(), plan(&["INTAKE", "SIGNOFF"]));
    let pipeline = DesignPipeline::new(Arc::new(designer), Arc::new(tracker));
    let request = DesignRequest::new("c1", "p", Requirements::new(2.0, 5.0, 50.0));
    let err = pipeline.run(request, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DesignError::InvalidConfig(_)));
    assert!(pipeline.tracker().list_chips().await.unwrap().is_empty());
}

#[tokio::test]
async fn custom_plan_records_design_stage() {
    let mut config = PipelineConfig::default();
    config.lifecycle.stages = plan(&["INTAKE", "DESIGN", "SIGNOFF"]);
    let pipeline = DesignPipeline::from_config(config, MemoryLifecycleStore::new()).unwrap();

    let request = DesignRequest::new("c1", "p", Requirements::new(2.0, 5.0, 50.0));
    let report = pipeline.run(request, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.history.stages(), vec!["INTAKE", stage::DESIGN]);
}

#[tokio::test]
async fn cancelled_run_keeps_registration() {
    let pipeline = DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = DesignRequest::new("c1", "p", Requirements::new(2.0, 5.0, 50.0));
    let err = pipeline.run(request, &cancel).await.unwrap_err();
    assert!(matches!(err, DesignError::SessionCancelled { .. }));
    assert_eq!(pipeline.tracker().status("c1").await.unwrap().stage, stage::REGISTERED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_for_different_chips() {
    let pipeline = Arc::new(
        DesignPipeline::from_config(PipelineConfig::default(), MemoryLifecycleStore::new()).unwrap(),
    );
    let mut handles = Vec::new();
    for i in 0..6 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let req = Requirements::new(2.0, 5.0, 50.0).with_throughput(1.0 + i as f64);
            pipeline
                .run(DesignRequest::new(format!("chip-{i}"), "p", req), &CancellationToken::new())
                .await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.history.len(), 2);
    }
    assert_eq!(pipeline.tracker().list_chips().await.unwrap().len(), 6);
}

#[test]
fn session_artifact_round_trip_and_tamper_detection() {
    let dir = tempdir().unwrap();
    let designer = chipforge_core::Designer::new(PipelineConfig::default()).unwrap();
    let session = designer
        .optimize(
            &Requirements::new(2.0, 5.0, 50.0).with_throughput(4.0),
            2,
            &CancellationToken::new(),
        )
        .unwrap();

    let path = write_session_artifact(&session, dir.path()).unwrap();
    let id = session.session_id.to_string();
    let back = read_session_artifact(&id, dir.path()).unwrap();
    assert_eq!(back, session);

    let mut json = std::fs::read_to_string(&path).unwrap();
    json = json.replacen("\"iteration\": 0", "\"iteration\": 7", 1);
    std::fs::write(&path, json).unwrap();
    let err = read_session_artifact(&id, dir.path()).unwrap_err();
    assert!(matches!(err, DesignError::DigestMismatch { .. }));
}
