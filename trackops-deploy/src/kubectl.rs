//! kubectl wrapper for cluster operations.
//!
//! Uses the kubectl CLI; requires kubectl to be installed and configured
//! for the target cluster.

use tracing::debug;

use crate::error::DeployError;

/// Thin async wrapper over the kubectl binary.
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new()
    }
}

impl Kubectl {
    pub fn new() -> Self {
        Self {
            program: "kubectl".to_string(),
        }
    }

    /// Point at a different binary (tests, wrappers like `minikube kubectl`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run kubectl with the given args and return trimmed stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, DeployError> {
        debug!(args = ?args, "running kubectl");
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| DeployError::Kubectl {
                message: format!("kubectl not found or failed to execute: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            if stderr.is_empty() {
                return Err(DeployError::Kubectl {
                    message: format!(
                        "kubectl exited with status {}: {}",
                        output.status,
                        stdout.trim()
                    ),
                });
            }
            return Err(DeployError::Kubectl {
                message: stderr.trim().to_string(),
            });
        }

        Ok(stdout.trim().to_string())
    }

    /// Probe for a usable kubectl installation.
    pub async fn client_version(&self) -> Result<String, DeployError> {
        self.run(&["version", "--client", "--output=yaml"]).await
    }

    /// Run a query that produces JSON and parse it.
    pub async fn run_json(&self, args: &[&str]) -> Result<serde_json::Value, DeployError> {
        let stdout = self.run(args).await?;
        serde_json::from_str(&stdout).map_err(|e| DeployError::Parse {
            message: format!("kubectl produced malformed JSON: {}", e),
        })
    }
}
