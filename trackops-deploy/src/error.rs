//! Error types for the trackops-deploy crate.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for deployment operations.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Environment config not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Environment config error: {message}")]
    Config { message: String },

    #[error("Template '{template}' failed to render: {message}")]
    Render { template: String, message: String },

    #[error("kubectl error: {message}")]
    Kubectl { message: String },

    #[error("Failed to parse cluster response: {message}")]
    Parse { message: String },

    #[error("Auth secret error: {message}")]
    Auth { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn kubectl(msg: impl Into<String>) -> Self {
        Self::Kubectl {
            message: msg.into(),
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth {
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeployError::Render {
            template: "mlflow-deployment-template.yaml".into(),
            message: "variable NAMESPACE not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Template 'mlflow-deployment-template.yaml' failed to render: variable NAMESPACE not found"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DeployError = io_err.into();
        assert!(matches!(err, DeployError::Io(_)));
    }
}
