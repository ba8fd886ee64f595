//! Error types for the trackops core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the tracking API, artifact storage, and configuration domains.

use std::path::PathBuf;

/// Top-level error type for the trackops core library.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from tracking-server interactions and artifact storage.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Server connection failed: {message}")]
    Connection { message: String },

    #[error("Tracking API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for tracking server")]
    AuthFailed,

    #[error("Server did not become healthy within {waited_secs}s")]
    HealthTimeout { waited_secs: u64 },

    #[error("Artifact store error: {message}")]
    ArtifactStore { message: String },

    #[error("Experiment not found: {name}")]
    ExperimentNotFound { name: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
