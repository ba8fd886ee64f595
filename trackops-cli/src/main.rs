//! trackops CLI - operations around an experiment-tracking deployment.
//!
//! Subcommands cover manifest generation, cluster verification, ingress
//! auth secrets, tracked demo training, and artifact smoke tests.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// trackops: deploy, verify, and exercise an experiment-tracking server
#[derive(Parser, Debug)]
#[command(name = "trackops", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (location of trackops.toml and deploy/)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Deployment operations (manifests, verification, auth secrets)
    Deploy {
        #[command(subcommand)]
        action: DeployAction,
    },
    /// Train a model on the synthetic voltage dataset and log the run
    Train {
        /// Tracking server URL (overrides configuration)
        #[arg(long)]
        server: Option<String>,
        /// Model family: random_forest or logistic_regression
        #[arg(long, default_value = "random_forest")]
        model_type: String,
        /// Model version recorded with the run
        #[arg(long, default_value = "1.0")]
        model_version: String,
        /// YAML training configuration overlay
        #[arg(long)]
        config: Option<PathBuf>,
        /// Experiment name (overrides the training configuration)
        #[arg(long)]
        experiment: Option<String>,
    },
    /// Round-trip smoke test: params, metrics, and artifacts on one run
    Smoke {
        /// Tracking server URL (overrides configuration)
        #[arg(long)]
        server: Option<String>,
        /// Local artifact mount root to verify and log into
        #[arg(long)]
        artifact_root: Option<PathBuf>,
    },
    /// Experiment operations against the tracking server
    Experiments {
        #[command(subcommand)]
        action: ExperimentsAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum DeployAction {
    /// Render environment manifests from the template set
    Generate {
        /// Environment to generate (e.g. dev, prod); omit for all
        #[arg(short, long)]
        env: Option<String>,
        /// Deploy directory holding templates/ and environment configs
        #[arg(long, default_value = "deploy")]
        root: PathBuf,
    },
    /// Check namespace, pods, services, storage, and secrets
    Verify {
        /// Environment whose namespace is checked
        env: String,
        /// Deploy directory holding the environment configs
        #[arg(long, default_value = "deploy")]
        root: PathBuf,
        /// Label selector the tracking resources carry
        #[arg(long, default_value = trackops_deploy::APP_SELECTOR)]
        selector: String,
    },
    /// Generate (and optionally apply) the ingress basic-auth secret
    Auth {
        /// Environment whose namespace receives the secret
        env: String,
        /// Username for the generated htpasswd entry
        #[arg(short, long)]
        username: Option<String>,
        /// Password for the generated htpasswd entry
        #[arg(short, long)]
        password: Option<String>,
        /// Use an existing htpasswd file instead of generating one
        #[arg(long, conflicts_with_all = ["username", "password"])]
        htpasswd_file: Option<PathBuf>,
        /// Name of the Kubernetes secret
        #[arg(long, default_value = "basic-auth-secret")]
        secret_name: String,
        /// Apply the secret to the cluster after writing it
        #[arg(long)]
        apply: bool,
        /// Replace the secret if it already exists
        #[arg(long)]
        overwrite: bool,
        /// Deploy directory holding the environment configs
        #[arg(long, default_value = "deploy")]
        root: PathBuf,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default trackops.toml in the workspace
    Init,
    /// Show the resolved configuration
    Show,
}

#[derive(clap::Subcommand, Debug)]
enum ExperimentsAction {
    /// List experiments on the tracking server
    List {
        /// Tracking server URL (overrides configuration)
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("io", "smart-dc", "trackops")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "trackops.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
