//! Typed error hierarchy for the night cycle.
//!
//! Four enums cover the four failure domains:
//! - `ConfigError`: environment and config file problems, raised before any remote call
//! - `HostingError`: source-hosting API failures
//! - `CompletionError`: language-model API failures
//! - `CycleError`: conditions that end a whole run

use thiserror::Error;

/// Errors raised while assembling the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid repository identifier '{0}': expected owner/name")]
    InvalidRepoSlug(String),

    #[error("Failed to read config file at {path}: {message}")]
    File {
        path: std::path::PathBuf,
        message: String,
    },
}

/// Errors from the source-hosting API.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hosting API rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    #[error("Hosting API rate limit exceeded")]
    RateLimited,

    #[error("Hosting API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request to hosting API failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Malformed hosting API response: {0}")]
    Decode(String),
}

impl HostingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostingError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HostingError::Unauthorized { .. })
    }
}

/// Errors from the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion API rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Completion API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request to completion API failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Completion API returned no choices")]
    EmptyResponse,
}

/// Conditions that abort a night cycle instead of being recorded per file.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to resolve repository: {0}")]
    Repository(#[source] HostingError),

    #[error("Failed to enumerate repository files: {0}")]
    Enumeration(#[source] HostingError),

    #[error("Authentication failed during {stage}: {message}")]
    Unauthorized { stage: String, message: String },
}
