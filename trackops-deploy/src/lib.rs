//! # trackops-deploy
//!
//! Kubernetes deployment toolkit for the tracking server: per-environment
//! manifest generation from templates (with base64-encoded credential
//! fields), ingress basic-auth secret handling, and read-only deployment
//! verification through kubectl.

pub mod auth;
pub mod config;
pub mod error;
pub mod kubectl;
pub mod manifests;
pub mod template;
pub mod verify;

pub use auth::{apply_secret, htpasswd_line, secret_yaml, CredentialSource};
pub use config::{ConfigValue, EnvironmentConfig};
pub use error::{DeployError, Result};
pub use kubectl::Kubectl;
pub use manifests::{GeneratedManifests, ManifestGenerator};
pub use verify::{
    verify_deployment, CheckKind, CheckOutcome, ClusterQueries, VerifyReport, APP_SELECTOR,
};
