//! Wire types for the tracking REST API (MLflow 2.0 surface).

use serde::{Deserialize, Serialize};

/// A named grouping of runs on the tracking server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    #[serde(default)]
    pub artifact_location: Option<String>,
    #[serde(default)]
    pub lifecycle_stage: Option<String>,
}

/// Terminal and non-terminal run states understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

/// Identity and location of a single tracked run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub artifact_uri: Option<String>,
}

/// A scalar parameter logged against a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// A scalar metric logged against a run, optionally at a step index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub value: f64,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub step: i64,
}

impl Metric {
    pub fn now(key: impl Into<String>, value: f64, step: Option<i64>) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: chrono::Utc::now().timestamp_millis(),
            step: step.unwrap_or(0),
        }
    }
}

/// A free-text tag set on a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTag {
    pub key: String,
    pub value: String,
}

impl RunTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_api_str() {
        assert_eq!(RunStatus::Running.as_api_str(), "RUNNING");
        assert_eq!(RunStatus::Finished.as_api_str(), "FINISHED");
        assert_eq!(RunStatus::Failed.as_api_str(), "FAILED");
    }

    #[test]
    fn test_run_info_parses_server_payload() {
        let json = r#"{
            "run_id": "abc123",
            "experiment_id": "7",
            "status": "RUNNING",
            "artifact_uri": "file:///mlflow/artifacts/7/abc123/artifacts",
            "start_time": 1724200000000
        }"#;
        let info: RunInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.run_id, "abc123");
        assert_eq!(info.status, Some(RunStatus::Running));
    }

    #[test]
    fn test_metric_step_defaults_to_zero() {
        let m = Metric::now("rmse", 0.42, None);
        assert_eq!(m.step, 0);
        assert!(m.timestamp > 0);
    }
}
