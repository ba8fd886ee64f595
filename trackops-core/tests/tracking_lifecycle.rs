//! Run-lifecycle integration tests against an in-memory tracking API.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use trackops_core::{
    ActiveRun, Experiment, Metric, Param, RunInfo, RunStatus, RunTag, TrackingApi, TrackingError,
};

#[derive(Default)]
struct MockServer {
    experiments: Mutex<Vec<Experiment>>,
    params: Mutex<Vec<(String, String, String)>>,
    metrics: Mutex<Vec<(String, String, f64, i64)>>,
    tags: Mutex<Vec<(String, String, String)>>,
    statuses: Mutex<Vec<(String, RunStatus)>>,
    runs_created: Mutex<Vec<String>>,
}

#[async_trait]
impl TrackingApi for MockServer {
    async fn create_experiment(&self, name: &str) -> Result<String, TrackingError> {
        let mut experiments = self.experiments.lock().unwrap();
        if experiments.iter().any(|e| e.name == name) {
            return Err(TrackingError::Api {
                code: "RESOURCE_ALREADY_EXISTS".into(),
                message: format!("experiment '{}' already exists", name),
            });
        }
        let id = (experiments.len() + 1).to_string();
        experiments.push(Experiment {
            experiment_id: id.clone(),
            name: name.to_string(),
            artifact_location: None,
            lifecycle_stage: Some("active".into()),
        });
        Ok(id)
    }

    async fn get_experiment_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Experiment>, TrackingError> {
        Ok(self
            .experiments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.name == name)
            .cloned())
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>, TrackingError> {
        Ok(self.experiments.lock().unwrap().clone())
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunInfo, TrackingError> {
        let run_id = format!("run-{}", run_name);
        self.runs_created.lock().unwrap().push(run_id.clone());
        Ok(RunInfo {
            run_id,
            experiment_id: experiment_id.to_string(),
            status: Some(RunStatus::Running),
            artifact_uri: None,
        })
    }

    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError> {
        self.statuses
            .lock()
            .unwrap()
            .push((run_id.to_string(), status));
        Ok(())
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        self.params
            .lock()
            .unwrap()
            .push((run_id.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }

    async fn log_metric(
        &self,
        run_id: &str,
        key: &str,
        value: f64,
        step: Option<i64>,
    ) -> Result<(), TrackingError> {
        self.metrics.lock().unwrap().push((
            run_id.to_string(),
            key.to_string(),
            value,
            step.unwrap_or(0),
        ));
        Ok(())
    }

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        self.tags
            .lock()
            .unwrap()
            .push((run_id.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }

    async fn log_batch(
        &self,
        run_id: &str,
        params: &[Param],
        metrics: &[Metric],
        tags: &[RunTag],
    ) -> Result<(), TrackingError> {
        for p in params {
            self.log_param(run_id, &p.key, &p.value).await?;
        }
        for m in metrics {
            self.log_metric(run_id, &m.key, m.value, Some(m.step)).await?;
        }
        for t in tags {
            self.set_tag(run_id, &t.key, &t.value).await?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_ensure_experiment_is_idempotent() {
    let server = MockServer::default();
    let first = server.ensure_experiment("simple_artifact_test").await.unwrap();
    let second = server.ensure_experiment("simple_artifact_test").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(server.experiments.lock().unwrap().len(), 1);
}

/// A server where the experiment is invisible to get-by-name until create
/// has been attempted: exercises the lost-create-race branch.
struct RacyServer {
    inner: MockServer,
    visible: AtomicBool,
}

#[async_trait]
impl TrackingApi for RacyServer {
    async fn create_experiment(&self, name: &str) -> Result<String, TrackingError> {
        self.visible.store(true, Ordering::SeqCst);
        let _ = self.inner.create_experiment(name).await;
        Err(TrackingError::Api {
            code: "RESOURCE_ALREADY_EXISTS".into(),
            message: format!("experiment '{}' already exists", name),
        })
    }

    async fn get_experiment_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Experiment>, TrackingError> {
        if self.visible.load(Ordering::SeqCst) {
            self.inner.get_experiment_by_name(name).await
        } else {
            Ok(None)
        }
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>, TrackingError> {
        self.inner.list_experiments().await
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunInfo, TrackingError> {
        self.inner.create_run(experiment_id, run_name).await
    }

    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError> {
        self.inner.update_run(run_id, status).await
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        self.inner.log_param(run_id, key, value).await
    }

    async fn log_metric(
        &self,
        run_id: &str,
        key: &str,
        value: f64,
        step: Option<i64>,
    ) -> Result<(), TrackingError> {
        self.inner.log_metric(run_id, key, value, step).await
    }

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        self.inner.set_tag(run_id, key, value).await
    }

    async fn log_batch(
        &self,
        run_id: &str,
        params: &[Param],
        metrics: &[Metric],
        tags: &[RunTag],
    ) -> Result<(), TrackingError> {
        self.inner.log_batch(run_id, params, metrics, tags).await
    }
}

#[tokio::test]
async fn test_ensure_experiment_resolves_lost_create_race() {
    let server = RacyServer {
        inner: MockServer::default(),
        visible: AtomicBool::new(false),
    };
    let id = server.ensure_experiment("demo-experiment").await.unwrap();
    assert_eq!(id, "1");
}

#[tokio::test]
async fn test_full_run_lifecycle() {
    let server = MockServer::default();
    let artifacts = TempDir::new().unwrap();

    let run = ActiveRun::start(&server, "demo-experiment", "smoke_test")
        .await
        .unwrap()
        .with_artifact_root(artifacts.path());

    run.log_param("alpha", 0.01).await.unwrap();
    run.log_param("l1_ratio", 0.1).await.unwrap();
    for step in 0..5 {
        run.log_metric("rmse", 0.5 - step as f64 * 0.05, Some(step))
            .await
            .unwrap();
    }
    run.set_tag("data_source", "synthetic").await.unwrap();

    let report = serde_json::json!({"accuracy": 0.95});
    run.log_dict(&report, "classification_report.json").unwrap();

    let local = artifacts.path().join("output.txt");
    std::fs::write(&local, "Hello tracking!").unwrap();
    run.log_artifact(&local, Some("test_files")).unwrap();

    let info = run.end().await.unwrap();

    assert_eq!(server.params.lock().unwrap().len(), 2);
    assert_eq!(server.metrics.lock().unwrap().len(), 5);
    {
        let metrics = server.metrics.lock().unwrap();
        let (run_id, key, value, step) = &metrics[4];
        assert_eq!(run_id, &info.run_id);
        assert_eq!(key, "rmse");
        assert!((value - 0.3).abs() < 1e-9);
        assert_eq!(*step, 4);
    }
    assert_eq!(server.tags.lock().unwrap().len(), 1);
    assert_eq!(
        server.statuses.lock().unwrap().as_slice(),
        &[(info.run_id.clone(), RunStatus::Finished)]
    );
    assert!(artifacts.path().join("classification_report.json").exists());
    assert!(artifacts.path().join("test_files/output.txt").exists());
}

#[tokio::test]
async fn test_artifact_failure_does_not_abort_run() {
    let server = MockServer::default();

    // No artifact root: dict logging fails, but the run can still record
    // metrics and finish.
    let run = ActiveRun::start(&server, "demo-experiment", "no_mount")
        .await
        .unwrap();

    let err = run
        .log_dict(&serde_json::json!({"k": 1}), "meta.json")
        .unwrap_err();
    assert!(matches!(err, TrackingError::ArtifactStore { .. }));

    run.log_metric("accuracy", 0.9, None).await.unwrap();
    run.end().await.unwrap();

    assert_eq!(server.metrics.lock().unwrap().len(), 1);
    assert_eq!(server.statuses.lock().unwrap().len(), 1);
}
