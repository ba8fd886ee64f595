//! Run lifecycle handle.
//!
//! `ActiveRun` wraps one tracked run: parameters, metrics, and tags go to
//! the server; dictionary and file artifacts go to the run's artifact
//! directory. Ending a run is explicit. A failed artifact write never
//! rolls back anything already logged; the caller decides whether to
//! continue.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::client::TrackingApi;
use crate::error::TrackingError;
use crate::types::{Metric, Param, RunInfo, RunStatus, RunTag};

pub struct ActiveRun<'a> {
    client: &'a dyn TrackingApi,
    info: RunInfo,
    store: Option<ArtifactStore>,
}

impl<'a> ActiveRun<'a> {
    /// Ensure the experiment exists, create a run under it, and resolve
    /// the run's artifact directory when the server reports a local one.
    pub async fn start(
        client: &'a dyn TrackingApi,
        experiment_name: &str,
        run_name: &str,
    ) -> Result<ActiveRun<'a>, TrackingError> {
        let experiment_id = client.ensure_experiment(experiment_name).await?;
        let info = client.create_run(&experiment_id, run_name).await?;
        info!(run_id = %info.run_id, experiment_id = %experiment_id, "started run");

        let store = match info.artifact_uri.as_deref() {
            Some(uri) => match ArtifactStore::from_uri(uri) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("artifact URI not locally writable: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(ActiveRun {
            client,
            info,
            store,
        })
    }

    /// Override the artifact directory, e.g. when the server-reported URI
    /// is not mounted at the same path on this host.
    pub fn with_artifact_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store = Some(ArtifactStore::from_root(root));
        self
    }

    pub fn info(&self) -> &RunInfo {
        &self.info
    }

    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    pub async fn log_param(
        &self,
        key: &str,
        value: impl ToString + Send,
    ) -> Result<(), TrackingError> {
        self.client
            .log_param(&self.info.run_id, key, &value.to_string())
            .await
    }

    pub async fn log_metric(
        &self,
        key: &str,
        value: f64,
        step: Option<i64>,
    ) -> Result<(), TrackingError> {
        self.client
            .log_metric(&self.info.run_id, key, value, step)
            .await
    }

    pub async fn set_tag(&self, key: &str, value: &str) -> Result<(), TrackingError> {
        self.client.set_tag(&self.info.run_id, key, value).await
    }

    pub async fn log_batch(
        &self,
        params: &[Param],
        metrics: &[Metric],
        tags: &[RunTag],
    ) -> Result<(), TrackingError> {
        self.client
            .log_batch(&self.info.run_id, params, metrics, tags)
            .await
    }

    fn store(&self) -> Result<&ArtifactStore, TrackingError> {
        self.store.as_ref().ok_or_else(|| TrackingError::ArtifactStore {
            message: "run has no locally writable artifact directory".into(),
        })
    }

    /// Serialize a JSON mapping as an artifact of this run.
    pub fn log_dict(
        &self,
        value: &serde_json::Value,
        artifact_file: &str,
    ) -> Result<PathBuf, TrackingError> {
        self.store()?.log_dict(value, artifact_file)
    }

    /// Copy a file into this run's artifact directory.
    pub fn log_artifact(
        &self,
        local_path: &Path,
        artifact_path: Option<&str>,
    ) -> Result<PathBuf, TrackingError> {
        self.store()?.log_artifact(local_path, artifact_path)
    }

    /// Mark the run FINISHED on the server.
    pub async fn end(self) -> Result<RunInfo, TrackingError> {
        self.client
            .update_run(&self.info.run_id, RunStatus::Finished)
            .await?;
        info!(run_id = %self.info.run_id, "run finished");
        Ok(self.info)
    }

    /// Mark the run FAILED on the server.
    pub async fn fail(self) -> Result<RunInfo, TrackingError> {
        self.client
            .update_run(&self.info.run_id, RunStatus::Failed)
            .await?;
        warn!(run_id = %self.info.run_id, "run marked failed");
        Ok(self.info)
    }
}
