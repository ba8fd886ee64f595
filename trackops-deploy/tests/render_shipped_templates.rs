//! Renders the repository's shipped template set against the example
//! environment configs.

use std::path::PathBuf;
use tempfile::TempDir;
use trackops_deploy::ManifestGenerator;

fn repo_deploy_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../deploy")
}

fn render_environment(env: &str) -> Vec<String> {
    let deploy = repo_deploy_dir();
    let scratch = TempDir::new().unwrap();
    std::fs::create_dir_all(scratch.path().join(env)).unwrap();
    std::fs::copy(
        deploy.join(env).join("config.yaml"),
        scratch.path().join(env).join("config.yaml"),
    )
    .unwrap();

    let generator = ManifestGenerator::new(deploy.join("templates"), scratch.path());
    let result = generator.generate(env).unwrap();
    assert!(result.missing_templates.is_empty());
    result
        .written
        .iter()
        .map(|p| std::fs::read_to_string(p).unwrap())
        .collect()
}

#[test]
fn test_dev_environment_renders_fully() {
    let rendered = render_environment("dev");
    // Both example configs set an ingress path, so all six templates render.
    assert_eq!(rendered.len(), 6);
    for text in &rendered {
        assert!(!text.contains("{{"), "unresolved placeholder:\n{}", text);
    }
    assert!(rendered.iter().any(|t| t.contains("path: /mlflowdev(/|$)(.*)")));
}

#[test]
fn test_prod_environment_renders_fully() {
    let rendered = render_environment("prod");
    assert_eq!(rendered.len(), 6);
    for text in &rendered {
        assert!(!text.contains("{{"));
        assert!(text.contains("smart-dc-prod") || !text.contains("namespace:"));
    }
}

#[test]
fn test_rendered_manifests_are_valid_yaml() {
    for text in render_environment("dev") {
        let parsed: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert!(parsed.get("kind").is_some());
    }
}
