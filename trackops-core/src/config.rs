//! Configuration system for trackops.
//!
//! Uses `figment` for layered configuration: defaults -> `trackops.toml` in
//! the workspace -> `TRACKOPS_*` environment variables. The tracking-server
//! environment contract (`MLFLOW_TRACKING_URI`, `MLFLOW_USERNAME`,
//! `MLFLOW_PASSWORD`) is honored on top of the layered result.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for tracking-server access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Base URL of the tracking server, e.g. `http://localhost:5000/mlflow`.
    pub tracking_uri: String,
    /// Basic-auth username, if the ingress requires authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Default experiment to log runs under.
    pub experiment: String,
    /// Local artifact mount root, when the server uses a file-backed
    /// artifact store shared with this host (Kubernetes volume mount).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_root: Option<PathBuf>,
    /// Ceiling for the once-per-second server health poll.
    pub health_poll_ceiling_secs: u64,
    /// Per-request timeout for tracking API calls.
    pub request_timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: "http://localhost:5000".to_string(),
            username: None,
            password: None,
            experiment: "demo-experiment".to_string(),
            artifact_root: None,
            health_poll_ceiling_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

/// Name of the workspace configuration file.
pub const CONFIG_FILE: &str = "trackops.toml";

/// Load configuration: defaults -> workspace `trackops.toml` -> `TRACKOPS_*`
/// environment -> `MLFLOW_*` aliases.
pub fn load_config(workspace: Option<&Path>) -> Result<TrackingConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TrackingConfig::default()));

    if let Some(ws) = workspace {
        let path = ws.join(CONFIG_FILE);
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
    }

    let mut config: TrackingConfig = figment
        .merge(Env::prefixed("TRACKOPS_"))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

    // The original scripts take the server location and credentials from the
    // MLflow environment contract when present.
    if let Ok(uri) = std::env::var("MLFLOW_TRACKING_URI") {
        if !uri.is_empty() {
            config.tracking_uri = uri;
        }
    }
    if let Ok(user) = std::env::var("MLFLOW_USERNAME") {
        if !user.is_empty() {
            config.username = Some(user);
        }
    }
    if let Ok(pass) = std::env::var("MLFLOW_PASSWORD") {
        if !pass.is_empty() {
            config.password = Some(pass);
        }
    }
    if config.artifact_root.is_none() {
        if let Ok(root) = std::env::var("MLFLOW_DEFAULT_ARTIFACT_ROOT") {
            if !root.is_empty() {
                let stripped = root.strip_prefix("file://").unwrap_or(&root);
                config.artifact_root = Some(PathBuf::from(stripped));
            }
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &TrackingConfig) -> Result<(), ConfigError> {
    if config.tracking_uri.is_empty() {
        return Err(ConfigError::MissingField {
            field: "tracking_uri".into(),
        });
    }
    url::Url::parse(&config.tracking_uri).map_err(|e| ConfigError::Invalid {
        message: format!("tracking_uri is not a valid URL: {}", e),
    })?;
    if config.health_poll_ceiling_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "health_poll_ceiling_secs must be nonzero".into(),
        });
    }
    Ok(())
}
