//! File-backed artifact store.
//!
//! The deployment this tooling targets mounts the server's artifact root
//! into client pods as a shared volume, so artifact logging is a local
//! filesystem write into the run's `artifact_uri` directory.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::TrackingError;

/// Writable view over one run's artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Resolve a store from a run's `artifact_uri`. Only local (`file://`
    /// or plain-path) URIs are supported; remote schemes belong to the
    /// server's own artifact backend.
    pub fn from_uri(uri: &str) -> Result<Self, TrackingError> {
        let path = if let Some(stripped) = uri.strip_prefix("file://") {
            stripped
        } else if uri.contains("://") {
            return Err(TrackingError::ArtifactStore {
                message: format!("unsupported artifact URI scheme: {}", uri),
            });
        } else {
            uri
        };
        Ok(Self {
            root: PathBuf::from(path),
        })
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Round-trip a probe file to confirm the mount is present and
    /// writable before any run starts logging into it.
    pub fn verify_writable(&self) -> Result<(), TrackingError> {
        if !self.root.exists() {
            return Err(TrackingError::ArtifactStore {
                message: format!("artifact root does not exist: {}", self.root.display()),
            });
        }
        let probe = self.root.join("mount_test.txt");
        std::fs::write(&probe, format!("mount probe {}", chrono::Utc::now().to_rfc3339()))
            .map_err(|e| TrackingError::ArtifactStore {
                message: format!("artifact root is not writable: {}", e),
            })?;
        std::fs::remove_file(&probe).map_err(|e| TrackingError::ArtifactStore {
            message: format!("failed to remove mount probe: {}", e),
        })?;
        Ok(())
    }

    /// Copy a local file into the artifact directory, optionally under a
    /// destination subdirectory. Returns the stored path.
    pub fn log_artifact(
        &self,
        local_path: &Path,
        artifact_path: Option<&str>,
    ) -> Result<PathBuf, TrackingError> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| TrackingError::ArtifactStore {
                message: format!("not a file path: {}", local_path.display()),
            })?;
        let dest_dir = match artifact_path {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        };
        std::fs::create_dir_all(&dest_dir).map_err(|e| TrackingError::ArtifactStore {
            message: format!("failed to create {}: {}", dest_dir.display(), e),
        })?;
        let dest = dest_dir.join(file_name);
        std::fs::copy(local_path, &dest).map_err(|e| TrackingError::ArtifactStore {
            message: format!(
                "failed to copy {} to {}: {}",
                local_path.display(),
                dest.display(),
                e
            ),
        })?;
        debug!(artifact = %dest.display(), "stored artifact");
        Ok(dest)
    }

    /// Serialize a JSON document into the artifact directory. The
    /// `artifact_file` may contain subdirectories ("reports/summary.json").
    pub fn log_dict(
        &self,
        value: &serde_json::Value,
        artifact_file: &str,
    ) -> Result<PathBuf, TrackingError> {
        let dest = self.root.join(artifact_file);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrackingError::ArtifactStore {
                message: format!("failed to create {}: {}", parent.display(), e),
            })?;
        }
        let content =
            serde_json::to_string_pretty(value).map_err(|e| TrackingError::ArtifactStore {
                message: format!("failed to serialize {}: {}", artifact_file, e),
            })?;
        // Write via a temp name so readers never observe a partial document.
        let tmp = dest.with_extension("tmp");
        std::fs::write(&tmp, &content).map_err(|e| TrackingError::ArtifactStore {
            message: format!("failed to write {}: {}", dest.display(), e),
        })?;
        std::fs::rename(&tmp, &dest).map_err(|e| TrackingError::ArtifactStore {
            message: format!("failed to finalize {}: {}", dest.display(), e),
        })?;
        debug!(artifact = %dest.display(), "stored JSON artifact");
        Ok(dest)
    }
}
