//! CLI subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::Context;

use trackops_core::{
    wait_for_server, ActiveRun, ArtifactStore, RestTrackingClient, TrackingApi, TrackingConfig,
};
use trackops_deploy::{
    apply_secret, htpasswd_line, secret_yaml, verify_deployment, CredentialSource,
    EnvironmentConfig, Kubectl, ManifestGenerator,
};
use trackops_ml::{run_training, ModelKind, TrainingSpec};

use crate::{Commands, ConfigAction, DeployAction, ExperimentsAction};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Deploy { action } => handle_deploy(action, workspace).await,
        Commands::Train {
            server,
            model_type,
            model_version,
            config,
            experiment,
        } => handle_train(server, model_type, model_version, config, experiment, workspace).await,
        Commands::Smoke {
            server,
            artifact_root,
        } => handle_smoke(server, artifact_root, workspace).await,
        Commands::Experiments { action } => match action {
            ExperimentsAction::List { server } => handle_experiments_list(server, workspace).await,
        },
    }
}

fn resolve(workspace: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        workspace.join(path)
    }
}

fn tracking_config(workspace: &Path, server: Option<String>) -> anyhow::Result<TrackingConfig> {
    let mut config = trackops_core::load_config(Some(workspace))?;
    if let Some(server) = server {
        config.tracking_uri = server;
    }
    Ok(config)
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace.join(trackops_core::config::CONFIG_FILE);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let default_config = TrackingConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = trackops_core::load_config(Some(workspace))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

async fn handle_deploy(action: DeployAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        DeployAction::Generate { env, root } => {
            let root = resolve(workspace, root);
            let generator = ManifestGenerator::from_root(&root);

            let environments = match env {
                Some(env) => vec![env],
                None => discover_environments(&root)?,
            };

            for environment in &environments {
                println!("\nProcessing {} environment...", environment);
                let result = generator
                    .generate(environment)
                    .with_context(|| format!("generation failed for {}", environment))?;
                for path in &result.written {
                    println!("Generated: {}", path.display());
                }
                for missing in &result.missing_templates {
                    println!("Warning: template {} not found", missing);
                }
            }

            println!("\nDeployment files generated successfully.");
            println!("\nTo deploy:");
            println!("1. kubectl apply -f {}/<env>/generated/", root.display());
            println!("2. kubectl get pods -n <namespace>");
            println!("3. kubectl get svc -n <namespace>");
            println!("4. kubectl get ingress -n <namespace>");
            Ok(())
        }
        DeployAction::Verify {
            env,
            root,
            selector,
        } => {
            let root = resolve(workspace, root);
            let config = EnvironmentConfig::load(&root.join(&env).join("config.yaml"))?;

            println!(
                "Verifying {} deployment in namespace {}",
                env, config.namespace
            );
            let kubectl = Kubectl::new();
            let report = verify_deployment(&kubectl, &config.namespace, &selector).await;

            println!();
            for outcome in &report.outcomes {
                let verdict = if outcome.passed { "PASS" } else { "FAIL" };
                println!("{:10} {}  {}", outcome.kind.label(), verdict, outcome.detail);
            }
            println!(
                "\nOverall: {}/{} checks passed",
                report.passed(),
                report.total()
            );

            if report.all_passed() {
                println!("Deployment looks good.");
                Ok(())
            } else {
                anyhow::bail!(
                    "{} of {} checks failed for namespace {}",
                    report.total() - report.passed(),
                    report.total(),
                    config.namespace
                )
            }
        }
        DeployAction::Auth {
            env,
            username,
            password,
            htpasswd_file,
            secret_name,
            apply,
            overwrite,
            root,
        } => {
            let root = resolve(workspace, root);
            let config = EnvironmentConfig::load(&root.join(&env).join("config.yaml"))?;

            let source = match (htpasswd_file, username, password) {
                (Some(file), _, _) => CredentialSource::File(resolve(workspace, file)),
                (None, Some(username), Some(password)) => {
                    CredentialSource::Generate { username, password }
                }
                _ => anyhow::bail!("provide --username and --password, or --htpasswd-file"),
            };

            let line = htpasswd_line(&source).await?;
            let yaml = secret_yaml(&secret_name, &config.namespace, &line);

            let output_dir = root.join(&env).join("generated");
            std::fs::create_dir_all(&output_dir)?;
            let output_path = output_dir.join("01-basic-auth-secret.yaml");
            std::fs::write(&output_path, yaml)?;
            println!("Wrote {}", output_path.display());

            if apply {
                let kubectl = Kubectl::new();
                kubectl
                    .client_version()
                    .await
                    .context("kubectl is required to apply the secret")?;
                apply_secret(
                    &kubectl,
                    &secret_name,
                    &config.namespace,
                    &output_path,
                    overwrite,
                )
                .await?;
                println!(
                    "Secret {} deployed to namespace {}",
                    secret_name, config.namespace
                );
            }

            println!("\nTo enable authentication on the ingress, add:");
            println!("  nginx.ingress.kubernetes.io/auth-type: \"basic\"");
            println!(
                "  nginx.ingress.kubernetes.io/auth-secret: \"{}\"",
                secret_name
            );
            println!("  nginx.ingress.kubernetes.io/auth-realm: \"Authentication Required\"");
            Ok(())
        }
    }
}

/// Environments are the deploy-root subdirectories carrying a config.yaml.
fn discover_environments(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut environments = Vec::new();
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("cannot read deploy directory {}", root.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && path.join("config.yaml").exists() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                environments.push(name.to_string());
            }
        }
    }
    environments.sort();
    if environments.is_empty() {
        anyhow::bail!(
            "no environments with a config.yaml found under {}",
            root.display()
        );
    }
    Ok(environments)
}

async fn handle_train(
    server: Option<String>,
    model_type: String,
    model_version: String,
    config_file: Option<PathBuf>,
    experiment: Option<String>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = tracking_config(workspace, server)?;
    let mut spec = TrainingSpec::load(config_file.map(|p| resolve(workspace, p)).as_deref())?;
    if let Some(experiment) = experiment {
        spec.experiment_name = experiment;
    }
    let kind = ModelKind::from_str_loose(&model_type);

    println!("Tracking server: {}", config.tracking_uri);
    println!("Model type: {}", kind.as_str());
    println!("Model version: {}", model_version);

    wait_for_server(&config.tracking_uri, config.health_poll_ceiling_secs).await?;

    let client = RestTrackingClient::new(&config)?;
    let outcome = run_training(
        &client,
        &spec,
        kind,
        &model_version,
        config.artifact_root.as_deref(),
    )
    .await?;

    println!("\nTraining completed.");
    println!("Accuracy: {:.4}", outcome.accuracy);
    println!("Training time: {:.2}s", outcome.training_secs);
    println!("Run ID: {}", outcome.run_id);
    println!("View runs at: {}", config.tracking_uri);
    Ok(())
}

async fn handle_smoke(
    server: Option<String>,
    artifact_root: Option<PathBuf>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = tracking_config(workspace, server)?;
    let artifact_root = artifact_root
        .map(|p| resolve(workspace, p))
        .or_else(|| config.artifact_root.clone());

    println!("Tracking server: {}", config.tracking_uri);

    // Confirm the artifact mount before starting anything server-side.
    if let Some(root) = &artifact_root {
        ArtifactStore::from_root(root).verify_writable()?;
        println!("Artifact mount OK: {}", root.display());
    }

    wait_for_server(&config.tracking_uri, config.health_poll_ceiling_secs).await?;
    let client = RestTrackingClient::new(&config)?;

    let run_name = format!(
        "smoke-test-{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let mut run = ActiveRun::start(&client, &config.experiment, &run_name).await?;
    if let Some(root) = &artifact_root {
        let dir = root.join(run.run_id()).join("artifacts");
        std::fs::create_dir_all(&dir)?;
        run = run.with_artifact_root(dir);
    }
    println!("Started run: {}", run.run_id());

    run.log_param("test_type", "artifact_logging").await?;
    run.log_param("timestamp", chrono::Utc::now().to_rfc3339())
        .await?;
    run.log_metric("test_score", 0.95, None).await?;
    run.log_metric("artifact_count", 1.0, None).await?;
    for step in 0..5i64 {
        run.log_metric("rmse", 1.0 / (step + 1) as f64, Some(step))
            .await?;
    }
    println!("Parameters and metrics logged");

    let payload = serde_json::json!({
        "test_id": "artifact_smoke",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "description": "artifact round-trip verification",
        "run_name": run_name,
    });

    // Artifact failures are reported, not fatal: params and metrics are
    // already on the server.
    match run.log_dict(&payload, "metadata.json") {
        Ok(path) => println!("JSON artifact logged: {}", path.display()),
        Err(e) => println!("JSON artifact failed: {}", e),
    }

    let scratch = std::env::temp_dir().join(format!("trackops-smoke-{}.txt", std::process::id()));
    std::fs::write(&scratch, format!("smoke test artifact for {}\n", run_name))?;
    match run.log_artifact(&scratch, Some("test_files")) {
        Ok(path) => println!("File artifact logged: {}", path.display()),
        Err(e) => println!("File artifact failed: {}", e),
    }
    let _ = std::fs::remove_file(&scratch);

    let info = run.end().await?;
    println!("\nRun completed.");
    println!("Run ID: {}", info.run_id);
    println!("Experiment ID: {}", info.experiment_id);
    println!(
        "View run at: {}/#/experiments/{}/runs/{}",
        config.tracking_uri.trim_end_matches('/'),
        info.experiment_id,
        info.run_id
    );
    Ok(())
}

async fn handle_experiments_list(
    server: Option<String>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = tracking_config(workspace, server)?;
    let client = RestTrackingClient::new(&config)?;

    let experiments = client.list_experiments().await?;
    if experiments.is_empty() {
        println!("No experiments on {}", config.tracking_uri);
        return Ok(());
    }
    println!("Experiments on {}:", config.tracking_uri);
    for experiment in &experiments {
        println!("  {} (id {})", experiment.name, experiment.experiment_id);
    }
    Ok(())
}
