//! Tracking-server REST client.
//!
//! The API surface is fronted by the `TrackingApi` trait so tests and
//! offline tooling can substitute a mock; `RestTrackingClient` is the
//! reqwest-backed implementation speaking the MLflow 2.0 REST protocol.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::TrackingConfig;
use crate::error::TrackingError;
use crate::types::{Experiment, Metric, Param, RunInfo, RunStatus, RunTag};

/// Operations the tooling needs from a tracking server.
#[async_trait]
pub trait TrackingApi: Send + Sync {
    async fn create_experiment(&self, name: &str) -> Result<String, TrackingError>;
    async fn get_experiment_by_name(&self, name: &str)
        -> Result<Option<Experiment>, TrackingError>;
    async fn list_experiments(&self) -> Result<Vec<Experiment>, TrackingError>;
    async fn create_run(&self, experiment_id: &str, run_name: &str)
        -> Result<RunInfo, TrackingError>;
    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError>;
    async fn log_param(&self, run_id: &str, key: &str, value: &str)
        -> Result<(), TrackingError>;
    async fn log_metric(
        &self,
        run_id: &str,
        key: &str,
        value: f64,
        step: Option<i64>,
    ) -> Result<(), TrackingError>;
    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError>;
    async fn log_batch(
        &self,
        run_id: &str,
        params: &[Param],
        metrics: &[Metric],
        tags: &[RunTag],
    ) -> Result<(), TrackingError>;

    /// Get the experiment id for `name`, creating the experiment when
    /// absent. Safe to call concurrently: a create that loses the race is
    /// resolved by a second lookup.
    async fn ensure_experiment(&self, name: &str) -> Result<String, TrackingError> {
        if let Some(exp) = self.get_experiment_by_name(name).await? {
            return Ok(exp.experiment_id);
        }
        match self.create_experiment(name).await {
            Ok(id) => Ok(id),
            Err(TrackingError::Api { ref code, .. }) if code == "RESOURCE_ALREADY_EXISTS" => self
                .get_experiment_by_name(name)
                .await?
                .map(|exp| exp.experiment_id)
                .ok_or_else(|| TrackingError::ExperimentNotFound { name: name.into() }),
            Err(e) => Err(e),
        }
    }
}

/// MLflow REST client over reqwest.
pub struct RestTrackingClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct SearchExperimentsResponse {
    #[serde(default)]
    experiments: Vec<Experiment>,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunEnvelope,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    info: RunInfo,
}

impl RestTrackingClient {
    pub fn new(config: &TrackingConfig) -> Result<Self, TrackingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TrackingError::Connection {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: config.tracking_uri.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => req.basic_auth(user, Some(pass)),
            (Some(user), None) => req.basic_auth(user, None::<&str>),
            _ => req,
        }
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, TrackingError> {
        debug!(path, "tracking API request");
        let req = self.authorize(self.http.post(self.endpoint(path)).json(&body));
        let resp = req.send().await.map_err(|e| TrackingError::Connection {
            message: e.to_string(),
        })?;
        Self::decode(resp).await
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, TrackingError> {
        debug!(path, "tracking API request");
        let req = self.authorize(self.http.get(self.endpoint(path)).query(query));
        let resp = req.send().await.map_err(|e| TrackingError::Connection {
            message: e.to_string(),
        })?;
        Self::decode(resp).await
    }

    async fn decode(resp: reqwest::Response) -> Result<serde_json::Value, TrackingError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(TrackingError::AuthFailed);
        }
        let text = resp.text().await.map_err(|e| TrackingError::Connection {
            message: e.to_string(),
        })?;
        if !status.is_success() {
            let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or(ApiErrorBody {
                error_code: None,
                message: None,
            });
            return Err(TrackingError::Api {
                code: body
                    .error_code
                    .unwrap_or_else(|| status.as_u16().to_string()),
                message: body.message.unwrap_or(text),
            });
        }
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TrackingError::ResponseParse {
            message: e.to_string(),
        })
    }

    fn parse<T: serde::de::DeserializeOwned>(
        value: serde_json::Value,
    ) -> Result<T, TrackingError> {
        serde_json::from_value(value).map_err(|e| TrackingError::ResponseParse {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl TrackingApi for RestTrackingClient {
    async fn create_experiment(&self, name: &str) -> Result<String, TrackingError> {
        let value = self
            .post("experiments/create", json!({ "name": name }))
            .await?;
        let resp: CreateExperimentResponse = Self::parse(value)?;
        Ok(resp.experiment_id)
    }

    async fn get_experiment_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Experiment>, TrackingError> {
        let result = self
            .get("experiments/get-by-name", &[("experiment_name", name)])
            .await;
        match result {
            Ok(value) => {
                let resp: GetExperimentResponse = Self::parse(value)?;
                Ok(Some(resp.experiment))
            }
            Err(TrackingError::Api { ref code, .. }) if code == "RESOURCE_DOES_NOT_EXIST" => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>, TrackingError> {
        let value = self
            .post("experiments/search", json!({ "max_results": 1000 }))
            .await?;
        let resp: SearchExperimentsResponse = Self::parse(value)?;
        Ok(resp.experiments)
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunInfo, TrackingError> {
        let value = self
            .post(
                "runs/create",
                json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": chrono::Utc::now().timestamp_millis(),
                }),
            )
            .await?;
        let resp: CreateRunResponse = Self::parse(value)?;
        Ok(resp.run.info)
    }

    async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError> {
        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": status.as_api_str(),
                "end_time": chrono::Utc::now().timestamp_millis(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        self.post(
            "runs/log-parameter",
            json!({ "run_id": run_id, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn log_metric(
        &self,
        run_id: &str,
        key: &str,
        value: f64,
        step: Option<i64>,
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/log-metric",
            json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": chrono::Utc::now().timestamp_millis(),
                "step": step.unwrap_or(0),
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_tag(&self, run_id: &str, key: &str, value: &str) -> Result<(), TrackingError> {
        self.post(
            "runs/set-tag",
            json!({ "run_id": run_id, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn log_batch(
        &self,
        run_id: &str,
        params: &[Param],
        metrics: &[Metric],
        tags: &[RunTag],
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/log-batch",
            json!({
                "run_id": run_id,
                "params": params,
                "metrics": metrics,
                "tags": tags,
            }),
        )
        .await?;
        Ok(())
    }
}
