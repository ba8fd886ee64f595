//! Environment-specific manifest generation.
//!
//! Reads the template set from a templates directory, substitutes one
//! environment's configuration, and writes the results to that
//! environment's `generated/` directory. The ingress manifest is only
//! produced when the environment configures an ingress path.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::EnvironmentConfig;
use crate::error::DeployError;
use crate::template;

/// Templates every environment gets.
const TEMPLATE_FILES: &[&str] = &[
    "mlflow-deployment-template.yaml",
    "mlflow-service-template.yaml",
    "mlflow-pv-template.yaml",
    "mlflow-pvc-template.yaml",
    "mlflow-postgres-secret-template.yaml",
];

/// Added only when `MLFLOW_PATH` is configured.
const INGRESS_TEMPLATE: &str = "mlflow-ingress-template.yaml";

/// Outcome of generating one environment.
#[derive(Debug)]
pub struct GeneratedManifests {
    pub environment: String,
    pub written: Vec<PathBuf>,
    /// Template files that were listed but not present on disk.
    pub missing_templates: Vec<String>,
}

pub struct ManifestGenerator {
    templates_dir: PathBuf,
    deploy_dir: PathBuf,
}

impl ManifestGenerator {
    pub fn new(templates_dir: impl Into<PathBuf>, deploy_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            deploy_dir: deploy_dir.into(),
        }
    }

    /// Conventional layout rooted at a deploy directory: templates in
    /// `<root>/templates`, environments in `<root>/<env>/`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(root.join("templates"), root)
    }

    pub fn config_path(&self, environment: &str) -> PathBuf {
        self.deploy_dir.join(environment).join("config.yaml")
    }

    /// Generate all manifests for one environment.
    pub fn generate(&self, environment: &str) -> Result<GeneratedManifests, DeployError> {
        let config = EnvironmentConfig::load(&self.config_path(environment))?;
        let values = config.substitutions();

        let output_dir = self.deploy_dir.join(environment).join("generated");
        std::fs::create_dir_all(&output_dir)?;

        let mut template_files: Vec<&str> = TEMPLATE_FILES.to_vec();
        if config.mlflow_path.is_some() {
            info!(
                environment,
                path = config.mlflow_path.as_deref().unwrap_or_default(),
                "ingress path configured, including ingress manifest"
            );
            template_files.push(INGRESS_TEMPLATE);
        }

        let mut written = Vec::new();
        let mut missing_templates = Vec::new();
        for template_file in template_files {
            let template_path = self.templates_dir.join(template_file);
            if !template_path.exists() {
                warn!(template = template_file, "template not found, skipping");
                missing_templates.push(template_file.to_string());
                continue;
            }
            let template_text = std::fs::read_to_string(&template_path)?;
            let rendered = template::render(template_file, &template_text, &values)?;

            let output_name = template_file.replace("-template", "");
            let output_path = output_dir.join(output_name);
            std::fs::write(&output_path, rendered)?;
            info!(generated = %output_path.display(), "wrote manifest");
            written.push(output_path);
        }

        Ok(GeneratedManifests {
            environment: environment.to_string(),
            written,
            missing_templates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = "\
NAMESPACE: smart-dc-dev
PG_USER: mlflow
PG_PASSWORD: s3cret
PG_HOST: citus-coordinator
PG_PORT: 5432
PG_DATABASE: mlflow
PG_SCHEMA: public
";

    fn scaffold(config: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        let templates = root.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::create_dir_all(root.path().join("dev")).unwrap();
        std::fs::write(root.path().join("dev/config.yaml"), config).unwrap();

        std::fs::write(
            templates.join("mlflow-deployment-template.yaml"),
            "namespace: {{NAMESPACE}}\nhost: {{PG_HOST}}\n",
        )
        .unwrap();
        std::fs::write(
            templates.join("mlflow-service-template.yaml"),
            "namespace: {{NAMESPACE}}\nport: {{PG_PORT}}\n",
        )
        .unwrap();
        std::fs::write(
            templates.join("mlflow-pv-template.yaml"),
            "name: mlflow-pv\n",
        )
        .unwrap();
        std::fs::write(
            templates.join("mlflow-pvc-template.yaml"),
            "namespace: {{NAMESPACE}}\n",
        )
        .unwrap();
        std::fs::write(
            templates.join("mlflow-postgres-secret-template.yaml"),
            "user: {{PG_USER_B64}}\npassword: {{PG_PASSWORD_B64}}\n",
        )
        .unwrap();
        std::fs::write(
            templates.join("mlflow-ingress-template.yaml"),
            "path: {{MLFLOW_PATH}}\n",
        )
        .unwrap();
        root
    }

    #[test]
    fn test_generate_without_ingress() {
        let root = scaffold(CONFIG);
        let generator = ManifestGenerator::from_root(root.path());

        let result = generator.generate("dev").unwrap();
        assert_eq!(result.written.len(), 5);
        assert!(result.missing_templates.is_empty());

        let secret = std::fs::read_to_string(
            root.path().join("dev/generated/mlflow-postgres-secret.yaml"),
        )
        .unwrap();
        assert!(secret.contains("user: bWxmbG93"));
        assert!(!root
            .path()
            .join("dev/generated/mlflow-ingress.yaml")
            .exists());
    }

    #[test]
    fn test_generate_with_ingress() {
        let config = format!("{}MLFLOW_PATH: /mlflowdev\n", CONFIG);
        let root = scaffold(&config);
        let generator = ManifestGenerator::from_root(root.path());

        let result = generator.generate("dev").unwrap();
        assert_eq!(result.written.len(), 6);
        let ingress =
            std::fs::read_to_string(root.path().join("dev/generated/mlflow-ingress.yaml"))
                .unwrap();
        assert_eq!(ingress, "path: /mlflowdev\n");
    }

    #[test]
    fn test_missing_template_is_skipped_not_fatal() {
        let root = scaffold(CONFIG);
        std::fs::remove_file(
            root.path()
                .join("templates/mlflow-pv-template.yaml"),
        )
        .unwrap();
        let generator = ManifestGenerator::from_root(root.path());

        let result = generator.generate("dev").unwrap();
        assert_eq!(result.written.len(), 4);
        assert_eq!(
            result.missing_templates,
            vec!["mlflow-pv-template.yaml".to_string()]
        );
    }

    #[test]
    fn test_unresolved_placeholder_aborts_generation() {
        let root = scaffold(CONFIG);
        std::fs::write(
            root.path().join("templates/mlflow-service-template.yaml"),
            "image: {{MLFLOW_IMAGE}}\n",
        )
        .unwrap();
        let generator = ManifestGenerator::from_root(root.path());

        let err = generator.generate("dev").unwrap_err();
        assert!(matches!(err, DeployError::Render { .. }));
    }

    #[test]
    fn test_unknown_environment() {
        let root = scaffold(CONFIG);
        let generator = ManifestGenerator::from_root(root.path());
        let err = generator.generate("staging").unwrap_err();
        assert!(matches!(err, DeployError::ConfigNotFound { .. }));
    }
}
