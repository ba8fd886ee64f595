//! Per-environment deployment configuration.
//!
//! Each environment directory carries a `config.yaml` with the database
//! connection fields and optional ingress path. Keys are SCREAMING_CASE,
//! matching the placeholder names in the manifest templates. Unknown keys
//! flow through to template substitution unchanged, so environments can
//! introduce extra placeholders without code changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::DeployError;

/// A scalar config value: YAML integers are accepted anywhere a string is
/// (PG_PORT is commonly written unquoted) and stringified on use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(n) => write!(f, "{}", n),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Deployment configuration for one named environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(rename = "NAMESPACE")]
    pub namespace: String,
    #[serde(rename = "PG_USER")]
    pub pg_user: String,
    #[serde(rename = "PG_PASSWORD")]
    pub pg_password: String,
    #[serde(rename = "PG_HOST")]
    pub pg_host: String,
    #[serde(rename = "PG_PORT")]
    pub pg_port: ConfigValue,
    #[serde(rename = "PG_DATABASE")]
    pub pg_database: String,
    #[serde(rename = "PG_SCHEMA")]
    pub pg_schema: String,
    /// Ingress path prefix; when absent no ingress manifest is generated.
    #[serde(rename = "MLFLOW_PATH", default, skip_serializing_if = "Option::is_none")]
    pub mlflow_path: Option<String>,
    /// Any further keys pass straight through to the templates.
    #[serde(flatten)]
    pub extra: BTreeMap<String, ConfigValue>,
}

impl EnvironmentConfig {
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        if !path.exists() {
            return Err(DeployError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| DeployError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Flatten into the template substitution mapping: every plain value
    /// under its config key, plus base64-encoded `*_B64` variants of the
    /// database credential fields for Secret manifests.
    pub fn substitutions(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        values.insert("NAMESPACE".to_string(), self.namespace.clone());
        values.insert("PG_USER".to_string(), self.pg_user.clone());
        values.insert("PG_PASSWORD".to_string(), self.pg_password.clone());
        values.insert("PG_HOST".to_string(), self.pg_host.clone());
        values.insert("PG_PORT".to_string(), self.pg_port.to_string());
        values.insert("PG_DATABASE".to_string(), self.pg_database.clone());
        values.insert("PG_SCHEMA".to_string(), self.pg_schema.clone());
        if let Some(path) = &self.mlflow_path {
            values.insert("MLFLOW_PATH".to_string(), path.clone());
        }
        for (key, value) in &self.extra {
            values.insert(key.clone(), value.to_string());
        }

        let encoded = [
            ("PG_USER_B64", &values["PG_USER"]),
            ("PG_PASSWORD_B64", &values["PG_PASSWORD"]),
            ("PG_HOST_B64", &values["PG_HOST"]),
            ("PG_DATABASE_B64", &values["PG_DATABASE"]),
            ("PG_PORT_B64", &values["PG_PORT"]),
            ("PG_SCHEMA_B64", &values["PG_SCHEMA"]),
        ]
        .map(|(key, plain)| (key.to_string(), crate::template::base64_value(plain)));
        values.extend(encoded);

        values
    }
}
