//! Deployment verification.
//!
//! Five read-only checks against the target namespace: namespace
//! existence, then label-selected pods, services, persistent volume
//! claims, and secrets. Each check runs, parses, classifies, and
//! accumulates; a failing or unreachable check never aborts the
//! remaining ones. The deployment is healthy only when all five pass.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::DeployError;
use crate::kubectl::Kubectl;

/// Label selector the tracking-server manifests apply to every resource.
pub const APP_SELECTOR: &str = "app=mlflow";

/// The five resource kinds a deployment is checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Namespace,
    Pods,
    Services,
    Storage,
    Secrets,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Namespace,
        CheckKind::Pods,
        CheckKind::Services,
        CheckKind::Storage,
        CheckKind::Secrets,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Namespace => "Namespace",
            CheckKind::Pods => "Pods",
            CheckKind::Services => "Services",
            CheckKind::Storage => "Storage",
            CheckKind::Secrets => "Secrets",
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            CheckKind::Namespace => "namespace",
            CheckKind::Pods => "pods",
            CheckKind::Services => "svc",
            CheckKind::Storage => "pvc",
            CheckKind::Secrets => "secrets",
        }
    }
}

/// Result of one check.
#[derive(Debug)]
pub struct CheckOutcome {
    pub kind: CheckKind,
    pub passed: bool,
    pub detail: String,
}

/// Aggregated verification result for one environment.
#[derive(Debug)]
pub struct VerifyReport {
    pub namespace: String,
    pub outcomes: Vec<CheckOutcome>,
}

impl VerifyReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }
}

/// The read-only cluster queries verification needs. Fronted by a trait
/// so tests can substitute canned responses.
#[async_trait]
pub trait ClusterQueries: Send + Sync {
    async fn namespace_exists(&self, namespace: &str) -> Result<(), DeployError>;
    async fn list_resources(
        &self,
        resource: &str,
        namespace: &str,
        selector: &str,
    ) -> Result<serde_json::Value, DeployError>;
}

#[async_trait]
impl ClusterQueries for Kubectl {
    async fn namespace_exists(&self, namespace: &str) -> Result<(), DeployError> {
        self.run(&["get", "namespace", namespace]).await.map(|_| ())
    }

    async fn list_resources(
        &self,
        resource: &str,
        namespace: &str,
        selector: &str,
    ) -> Result<serde_json::Value, DeployError> {
        self.run_json(&["get", resource, "-n", namespace, "-l", selector, "-o", "json"])
            .await
    }
}

// Minimal typed subsets of the kubectl JSON listings; everything else in
// the objects is ignored.

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<KubeObject>,
}

#[derive(Debug, Deserialize)]
struct KubeObject {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<ObjectStatus>,
    #[serde(default)]
    spec: Option<ObjectSpec>,
    /// Secret type lives at the top level of the object.
    #[serde(rename = "type", default)]
    secret_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectStatus {
    #[serde(default)]
    phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectSpec {
    #[serde(rename = "type", default)]
    service_type: Option<String>,
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Debug, Deserialize)]
struct ServicePort {
    port: u16,
}

/// Run all five checks and aggregate the outcomes.
pub async fn verify_deployment(
    cluster: &dyn ClusterQueries,
    namespace: &str,
    selector: &str,
) -> VerifyReport {
    let mut outcomes = Vec::with_capacity(CheckKind::ALL.len());
    for kind in CheckKind::ALL {
        debug!(check = kind.label(), namespace, "running deployment check");
        let outcome = match run_check(cluster, kind, namespace, selector).await {
            Ok(detail) => CheckOutcome {
                kind,
                passed: true,
                detail,
            },
            Err(detail) => CheckOutcome {
                kind,
                passed: false,
                detail,
            },
        };
        outcomes.push(outcome);
    }
    VerifyReport {
        namespace: namespace.to_string(),
        outcomes,
    }
}

async fn run_check(
    cluster: &dyn ClusterQueries,
    kind: CheckKind,
    namespace: &str,
    selector: &str,
) -> Result<String, String> {
    if kind == CheckKind::Namespace {
        return match cluster.namespace_exists(namespace).await {
            Ok(()) => Ok(format!("namespace {} exists", namespace)),
            Err(e) => Err(format!("namespace {} not found: {}", namespace, e)),
        };
    }

    let value = cluster
        .list_resources(kind.resource(), namespace, selector)
        .await
        .map_err(|e| format!("failed to list {}: {}", kind.resource(), e))?;
    let list: ObjectList = serde_json::from_value(value)
        .map_err(|e| format!("failed to parse {} listing: {}", kind.resource(), e))?;

    if list.items.is_empty() {
        return Err(format!(
            "no {} matched selector {} in {}",
            kind.resource(),
            selector,
            namespace
        ));
    }

    let described: Vec<String> = list.items.iter().map(|obj| describe(kind, obj)).collect();
    Ok(described.join(", "))
}

fn describe(kind: CheckKind, obj: &KubeObject) -> String {
    let name = &obj.metadata.name;
    match kind {
        CheckKind::Pods | CheckKind::Storage => {
            let phase = obj
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .unwrap_or("Unknown");
            format!("{} ({})", name, phase)
        }
        CheckKind::Services => {
            let spec = obj.spec.as_ref();
            let service_type = spec
                .and_then(|s| s.service_type.as_deref())
                .unwrap_or("Unknown");
            match spec.and_then(|s| s.ports.first()) {
                Some(port) => format!("{} ({}) on port {}", name, service_type, port.port),
                None => format!("{} ({})", name, service_type),
            }
        }
        CheckKind::Secrets => {
            let secret_type = obj.secret_type.as_deref().unwrap_or("Opaque");
            format!("{} ({})", name, secret_type)
        }
        CheckKind::Namespace => name.clone(),
    }
}
