//! Basic-auth secret generation for the tracking-server ingress.
//!
//! Produces an htpasswd credential line (via the system `htpasswd`
//! utility, or from a pre-generated file), base64-encodes it, and renders
//! the Kubernetes Secret the nginx ingress consumes. Applying the secret
//! to the cluster is an explicit, flag-gated step.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::DeployError;
use crate::kubectl::Kubectl;
use crate::template::base64_value;

/// Where the htpasswd credential line comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Run `htpasswd -nbB <username> <password>`.
    Generate { username: String, password: String },
    /// Read the first line of an existing htpasswd file.
    File(PathBuf),
}

/// Produce the htpasswd line for the configured source.
pub async fn htpasswd_line(source: &CredentialSource) -> Result<String, DeployError> {
    match source {
        CredentialSource::Generate { username, password } => {
            let output = tokio::process::Command::new("htpasswd")
                .args(["-nbB", username, password])
                .output()
                .await
                .map_err(|e| {
                    DeployError::auth(format!(
                        "htpasswd not found or failed to execute (install apache2-utils): {}",
                        e
                    ))
                })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(DeployError::auth(format!(
                    "htpasswd exited with status {}: {}",
                    output.status,
                    stderr.trim()
                )));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let line = stdout.trim();
            if line.is_empty() {
                return Err(DeployError::auth("htpasswd produced no output"));
            }
            Ok(line.to_string())
        }
        CredentialSource::File(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                DeployError::auth(format!("failed to read {}: {}", path.display(), e))
            })?;
            let line = content
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .ok_or_else(|| {
                    DeployError::auth(format!("{} contains no credential line", path.display()))
                })?;
            if !line.contains(':') {
                return Err(DeployError::auth(format!(
                    "{} does not look like an htpasswd entry",
                    path.display()
                )));
            }
            Ok(line.to_string())
        }
    }
}

/// Render the Opaque Secret carrying the base64-encoded htpasswd content
/// under the `auth` key the nginx ingress expects.
pub fn secret_yaml(secret_name: &str, namespace: &str, htpasswd: &str) -> String {
    format!(
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: {}\n  namespace: {}\ntype: Opaque\ndata:\n  auth: {}\n",
        secret_name,
        namespace,
        base64_value(htpasswd)
    )
}

/// Apply a generated secret manifest to the cluster. Refuses to replace
/// an existing secret unless `overwrite` is set.
pub async fn apply_secret(
    kubectl: &Kubectl,
    secret_name: &str,
    namespace: &str,
    manifest_path: &Path,
    overwrite: bool,
) -> Result<(), DeployError> {
    let exists = kubectl
        .run(&["get", "secret", secret_name, "-n", namespace])
        .await
        .is_ok();
    if exists {
        if !overwrite {
            return Err(DeployError::auth(format!(
                "secret {} already exists in {} (pass --overwrite to replace it)",
                secret_name, namespace
            )));
        }
        info!(secret = secret_name, namespace, "deleting existing secret");
        kubectl
            .run(&["delete", "secret", secret_name, "-n", namespace])
            .await?;
    }

    let manifest = manifest_path.to_string_lossy();
    kubectl.run(&["apply", "-f", manifest.as_ref()]).await?;

    // Final read-back confirms the apply landed.
    kubectl
        .run(&["get", "secret", secret_name, "-n", namespace])
        .await?;
    info!(secret = secret_name, namespace, "auth secret deployed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::base64_decode;
    use tempfile::TempDir;

    #[test]
    fn test_secret_yaml_round_trips_credential_line() {
        let line = "mlops:$2y$05$abcdefghijklmnopqrstuv";
        let yaml = secret_yaml("basic-auth-secret", "smart-dc-dev", line);

        assert!(yaml.contains("name: basic-auth-secret"));
        assert!(yaml.contains("namespace: smart-dc-dev"));
        let encoded = yaml
            .lines()
            .find_map(|l| l.trim().strip_prefix("auth: "))
            .unwrap();
        assert_eq!(base64_decode(encoded).unwrap(), line);
    }

    #[tokio::test]
    async fn test_htpasswd_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("htpasswd");
        std::fs::write(&path, "\nmlops:$2y$05$hash\n").unwrap();

        let line = htpasswd_line(&CredentialSource::File(path)).await.unwrap();
        assert_eq!(line, "mlops:$2y$05$hash");
    }

    #[tokio::test]
    async fn test_htpasswd_file_without_entry_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("htpasswd");
        std::fs::write(&path, "not-an-entry\n").unwrap();

        let err = htpasswd_line(&CredentialSource::File(path))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_htpasswd_missing_file_rejected() {
        let err = htpasswd_line(&CredentialSource::File(PathBuf::from(
            "/nonexistent/htpasswd",
        )))
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::Auth { .. }));
    }
}
