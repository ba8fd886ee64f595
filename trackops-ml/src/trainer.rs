//! Tracked training runs.
//!
//! Generates the voltage dataset, fits the selected model, evaluates it,
//! and logs the whole run (parameters, metrics, feature importances,
//! report artifacts, tags) against the tracking server. Artifact-log
//! failures are reported and skipped; the run still finishes with its
//! parameters and metrics intact.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use trackops_core::{ActiveRun, Metric, TrackingApi};

use crate::data::{voltage_dataset, VOLTAGE_CLASS_LABELS};
use crate::error::MlError;
use crate::forest::{ForestParams, RandomForest};
use crate::linear::{LogisticParams, LogisticRegression};
use crate::metrics::{accuracy, classification_report, confusion_matrix, cross_validate};
use crate::model::{Classifier, ModelKind};
use crate::prep::{train_test_split, StandardScaler};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub n_samples: usize,
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            n_samples: 5000,
            test_size: 0.2,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingToggles {
    pub cross_validation: bool,
    pub cv_folds: usize,
    pub enable_feature_scaling: bool,
}

impl Default for TrainingToggles {
    fn default() -> Self {
        Self {
            cross_validation: true,
            cv_folds: 5,
            enable_feature_scaling: true,
        }
    }
}

/// Full training specification, YAML-overridable field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSpec {
    pub experiment_name: String,
    pub model_name: String,
    pub data: DataConfig,
    pub random_forest: ForestParams,
    pub logistic_regression: LogisticParams,
    pub training: TrainingToggles,
}

impl Default for TrainingSpec {
    fn default() -> Self {
        Self {
            experiment_name: "voltage-fluctuation-prediction".to_string(),
            model_name: "voltage_fluctuation_predictor".to_string(),
            data: DataConfig::default(),
            random_forest: ForestParams::default(),
            logistic_regression: LogisticParams::default(),
            training: TrainingToggles::default(),
        }
    }
}

impl TrainingSpec {
    /// Defaults, overlaid with a YAML file when one is given. A missing
    /// file is reported and ignored, matching the demo scripts.
    pub fn load(config_file: Option<&Path>) -> Result<Self, MlError> {
        let Some(path) = config_file else {
            return Ok(Self::default());
        };
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| MlError::config(format!("{}: {}", path.display(), e)))
    }
}

/// What a completed training run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub model_name: String,
    pub accuracy: f64,
    pub training_secs: f64,
}

fn build_model(kind: ModelKind, spec: &TrainingSpec) -> Box<dyn Classifier> {
    match kind {
        ModelKind::RandomForest => Box::new(RandomForest::new(spec.random_forest.clone())),
        ModelKind::LogisticRegression => {
            Box::new(LogisticRegression::new(spec.logistic_regression.clone()))
        }
    }
}

/// Model hyperparameters as loggable key/value strings.
fn hyperparams(kind: ModelKind, spec: &TrainingSpec) -> Vec<(String, String)> {
    let value = match kind {
        ModelKind::RandomForest => serde_json::to_value(&spec.random_forest),
        ModelKind::LogisticRegression => serde_json::to_value(&spec.logistic_regression),
    };
    let Ok(serde_json::Value::Object(map)) = value else {
        return Vec::new();
    };
    map.into_iter()
        .map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::Null => "none".to_string(),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (format!("model_{}", key), rendered)
        })
        .collect()
}

/// Train one model against the voltage dataset and log the run.
pub async fn run_training(
    client: &dyn TrackingApi,
    spec: &TrainingSpec,
    kind: ModelKind,
    model_version: &str,
    artifact_root: Option<&Path>,
) -> Result<TrainingOutcome, MlError> {
    let run_name = format!("voltage_{}_v{}", kind.as_str(), model_version);
    info!(run_name, model = kind.as_str(), "starting tracked training");

    let mut run = ActiveRun::start(client, &spec.experiment_name, &run_name).await?;
    if let Some(root) = artifact_root {
        let dir = root.join(run.run_id()).join("artifacts");
        std::fs::create_dir_all(&dir)?;
        run = run.with_artifact_root(dir);
    }

    match train_and_log(&run, spec, kind, model_version).await {
        Ok((score, training_secs)) => {
            let info = run.end().await?;
            info!(
                run_id = %info.run_id,
                accuracy = score,
                training_secs,
                "training run completed"
            );
            Ok(TrainingOutcome {
                run_id: info.run_id,
                model_name: spec.model_name.clone(),
                accuracy: score,
                training_secs,
            })
        }
        Err(e) => {
            // Leave whatever was logged in place; only flip the status.
            if let Err(fail_err) = run.fail().await {
                warn!("failed to mark run as failed: {}", fail_err);
            }
            Err(e)
        }
    }
}

async fn train_and_log(
    run: &ActiveRun<'_>,
    spec: &TrainingSpec,
    kind: ModelKind,
    model_version: &str,
) -> Result<(f64, f64), MlError> {
    let dataset = voltage_dataset(spec.data.n_samples, spec.data.random_state);
    let split = train_test_split(&dataset, spec.data.test_size, spec.data.random_state, true)?;

    let (x_train, x_test) = if spec.training.enable_feature_scaling {
        let (scaler, x_train) = StandardScaler::fit_transform(&split.x_train)?;
        (x_train, scaler.transform(&split.x_test))
    } else {
        (split.x_train.clone(), split.x_test.clone())
    };

    run.log_param("model_type", kind.as_str()).await?;
    run.log_param("model_version", model_version).await?;
    run.log_param("training_samples", x_train.len()).await?;
    run.log_param("test_samples", x_test.len()).await?;
    run.log_param("n_features", dataset.n_features()).await?;
    run.log_param("feature_scaling", spec.training.enable_feature_scaling)
        .await?;
    for (key, value) in hyperparams(kind, spec) {
        run.log_param(&key, value).await?;
    }

    let mut model = build_model(kind, spec);
    let started = Instant::now();
    model.fit(&x_train, &split.y_train)?;
    let training_secs = started.elapsed().as_secs_f64();

    let predictions = model.predict(&x_test);
    let score = accuracy(&split.y_test, &predictions);

    if spec.training.cross_validation {
        let cv = cross_validate(
            &x_train,
            &split.y_train,
            spec.training.cv_folds,
            spec.data.random_state,
            || build_model(kind, spec),
        )?;
        run.log_metric("cv_mean_accuracy", cv.mean_score, None).await?;
        run.log_metric("cv_std_accuracy", cv.std_score, None).await?;
    }

    run.log_metric("accuracy", score, None).await?;
    run.log_metric("training_time_seconds", training_secs, None)
        .await?;

    if let Some(importances) = model.feature_importances() {
        let metrics: Vec<Metric> = dataset
            .feature_names
            .iter()
            .zip(&importances)
            .map(|(name, &value)| Metric::now(format!("feature_importance_{}", name), value, None))
            .collect();
        run.log_batch(&[], &metrics, &[]).await?;
    }

    // Report artifacts are best-effort: the run is still useful without
    // them when the artifact mount is absent.
    let report = classification_report(&split.y_test, &predictions, &VOLTAGE_CLASS_LABELS);
    let matrix = confusion_matrix(&split.y_test, &predictions, dataset.n_classes());
    let metadata = serde_json::json!({
        "model_type": kind.as_str(),
        "model_version": model_version,
        "training_timestamp": chrono::Utc::now().to_rfc3339(),
        "feature_columns": dataset.feature_names,
        "class_labels": VOLTAGE_CLASS_LABELS,
        "training_config": spec.training,
    });
    let artifacts = [
        (
            serde_json::to_value(&report)?,
            "classification_report.json",
        ),
        (
            serde_json::json!({ "confusion_matrix": matrix }),
            "confusion_matrix.json",
        ),
        (metadata, "model_metadata.json"),
    ];
    for (value, file) in &artifacts {
        if let Err(e) = run.log_dict(value, file) {
            warn!("could not log artifact {}: {}", file, e);
        }
    }

    run.set_tag("model_domain", "voltage_fluctuation").await?;
    run.set_tag("model_type", kind.as_str()).await?;
    run.set_tag("model_version", model_version).await?;
    run.set_tag("environment", "local_training").await?;
    run.set_tag("data_source", "synthetic").await?;

    Ok((score, training_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use trackops_core::{Experiment, Param, RunInfo, RunStatus, RunTag, TrackingError};

    #[derive(Default)]
    struct MockTracking {
        params: Mutex<Vec<(String, String)>>,
        metrics: Mutex<Vec<(String, f64)>>,
        tags: Mutex<Vec<(String, String)>>,
        statuses: Mutex<Vec<RunStatus>>,
    }

    #[async_trait]
    impl TrackingApi for MockTracking {
        async fn create_experiment(&self, _name: &str) -> Result<String, TrackingError> {
            Ok("1".into())
        }

        async fn get_experiment_by_name(
            &self,
            _name: &str,
        ) -> Result<Option<Experiment>, TrackingError> {
            Ok(None)
        }

        async fn list_experiments(&self) -> Result<Vec<Experiment>, TrackingError> {
            Ok(Vec::new())
        }

        async fn create_run(
            &self,
            experiment_id: &str,
            run_name: &str,
        ) -> Result<RunInfo, TrackingError> {
            Ok(RunInfo {
                run_id: format!("run-{}", run_name),
                experiment_id: experiment_id.to_string(),
                status: Some(RunStatus::Running),
                artifact_uri: None,
            })
        }

        async fn update_run(
            &self,
            _run_id: &str,
            status: RunStatus,
        ) -> Result<(), TrackingError> {
            self.statuses.lock().unwrap().push(status);
            Ok(())
        }

        async fn log_param(
            &self,
            _run_id: &str,
            key: &str,
            value: &str,
        ) -> Result<(), TrackingError> {
            self.params
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
            Ok(())
        }

        async fn log_metric(
            &self,
            _run_id: &str,
            key: &str,
            value: f64,
            _step: Option<i64>,
        ) -> Result<(), TrackingError> {
            self.metrics.lock().unwrap().push((key.to_string(), value));
            Ok(())
        }

        async fn set_tag(&self, _run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
            self.tags
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
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

    fn quick_spec() -> TrainingSpec {
        TrainingSpec {
            data: DataConfig {
                n_samples: 300,
                test_size: 0.2,
                random_state: 42,
            },
            random_forest: ForestParams {
                n_estimators: 5,
                max_depth: Some(4),
                min_samples_split: 2,
                min_samples_leaf: 1,
                seed: 42,
            },
            training: TrainingToggles {
                cross_validation: true,
                cv_folds: 3,
                enable_feature_scaling: true,
            },
            ..TrainingSpec::default()
        }
    }

    #[tokio::test]
    async fn test_run_training_logs_the_full_run() {
        let tracking = MockTracking::default();
        let artifacts = TempDir::new().unwrap();

        let outcome = run_training(
            &tracking,
            &quick_spec(),
            ModelKind::RandomForest,
            "1.0",
            Some(artifacts.path()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.run_id, "run-voltage_random_forest_v1.0");
        assert!((0.0..=1.0).contains(&outcome.accuracy));

        let params = tracking.params.lock().unwrap();
        let param = |k: &str| params.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(param("model_type").as_deref(), Some("random_forest"));
        assert_eq!(param("model_n_estimators").as_deref(), Some("5"));
        assert_eq!(param("feature_scaling").as_deref(), Some("true"));

        let metrics = tracking.metrics.lock().unwrap();
        let has_metric = |k: &str| metrics.iter().any(|(key, _)| key == k);
        assert!(has_metric("accuracy"));
        assert!(has_metric("training_time_seconds"));
        assert!(has_metric("cv_mean_accuracy"));
        assert!(has_metric("feature_importance_electrical_load_percent"));

        let tags = tracking.tags.lock().unwrap();
        assert!(tags.contains(&("data_source".to_string(), "synthetic".to_string())));

        assert_eq!(
            tracking.statuses.lock().unwrap().as_slice(),
            &[RunStatus::Finished]
        );

        let run_dir = artifacts.path().join(&outcome.run_id).join("artifacts");
        assert!(run_dir.join("classification_report.json").exists());
        assert!(run_dir.join("confusion_matrix.json").exists());
        assert!(run_dir.join("model_metadata.json").exists());
    }

    #[tokio::test]
    async fn test_run_training_logistic_regression() {
        let tracking = MockTracking::default();
        let mut spec = quick_spec();
        spec.training.cross_validation = false;
        spec.logistic_regression.epochs = 50;

        let outcome = run_training(
            &tracking,
            &spec,
            ModelKind::LogisticRegression,
            "2.1",
            None,
        )
        .await
        .unwrap();

        assert_eq!(outcome.run_id, "run-voltage_logistic_regression_v2.1");
        let metrics = tracking.metrics.lock().unwrap();
        assert!(!metrics.iter().any(|(key, _)| key == "cv_mean_accuracy"));
        // Importance metrics are logged even without an artifact mount.
        assert!(metrics
            .iter()
            .any(|(key, _)| key.starts_with("feature_importance_")));
    }

    #[test]
    fn test_spec_yaml_overlay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("training.yaml");
        std::fs::write(
            &path,
            r#"
experiment_name: custom-experiment
data:
  n_samples: 1234
random_forest:
  n_estimators: 99
"#,
        )
        .unwrap();

        let spec = TrainingSpec::load(Some(&path)).unwrap();
        assert_eq!(spec.experiment_name, "custom-experiment");
        assert_eq!(spec.data.n_samples, 1234);
        // Unspecified fields keep their defaults.
        assert_eq!(spec.data.random_state, 42);
        assert_eq!(spec.random_forest.n_estimators, 99);
        assert_eq!(spec.random_forest.min_samples_split, 5);
        assert!(spec.training.cross_validation);
    }

    #[test]
    fn test_spec_missing_file_falls_back_to_defaults() {
        let spec = TrainingSpec::load(Some(Path::new("/nonexistent/training.yaml"))).unwrap();
        assert_eq!(spec.experiment_name, "voltage-fluctuation-prediction");
    }

    #[test]
    fn test_hyperparams_stringify() {
        let spec = TrainingSpec::default();
        let params = hyperparams(ModelKind::RandomForest, &spec);
        let find = |k: &str| {
            params
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(find("model_n_estimators").as_deref(), Some("150"));
        assert_eq!(find("model_max_depth").as_deref(), Some("12"));
    }
}
