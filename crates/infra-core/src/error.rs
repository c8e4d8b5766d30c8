//! Error types for infra-core

use std::fmt;
use std::path::PathBuf;

use infra_api::ApiMessage;

use crate::reconcile::ResourceHandle;
use crate::validate::Violation;

/// Result type for infra-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling resources
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Desired state rejected before any network call
    #[error("Invalid desired state: {}", join(.violations))]
    Validation { violations: Vec<Violation> },

    /// A resource with this name already exists and adoption was not requested
    #[error("{kind} '{name}' already exists; set adopt to reconcile the existing resource")]
    Conflict { kind: String, name: String },

    /// Non-success envelope from the provider
    #[error("Remote API error (status {status}): {}", join(.errors))]
    RemoteApi { status: u16, errors: Vec<ApiMessage> },

    /// Transport, decoding or credential failure below the envelope layer
    #[error(transparent)]
    Transport(infra_api::Error),

    /// Post-write read-back never matched the written values.
    ///
    /// The resource may exist remotely; `handle` identifies it for cleanup.
    #[error(
        "{} '{}' did not converge after {attempts} read-back attempts: {detail}",
        .handle.kind,
        .handle.name
    )]
    ConsistencyTimeout {
        handle: Box<ResourceHandle>,
        attempts: u32,
        detail: String,
    },

    /// One or more deletions failed during scope teardown
    #[error(
        "Teardown of scope '{scope}' failed for {} resource(s): {}",
        .failures.len(),
        join(.failures)
    )]
    Teardown {
        scope: String,
        failures: Vec<TeardownFailure>,
    },

    /// The resource is not (yet) visible at this path
    #[error("Resource not found at {path}")]
    NotFound { path: String },

    #[error("Logical id not tracked by scope: {0}")]
    UnknownLogicalId(String),

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Scope state error: {message}")]
    State { message: String },

    #[error("Failed to parse {format} document at {path}: {message}")]
    DocumentParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported document format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl From<infra_api::Error> for Error {
    fn from(error: infra_api::Error) -> Self {
        match error {
            infra_api::Error::Api { status, errors } => Self::RemoteApi { status, errors },
            other => Self::Transport(other),
        }
    }
}

impl Error {
    /// Errors that no amount of waiting can resolve
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Conflict { .. }
                | Self::UnknownLogicalId(_)
                | Self::Config { .. }
                | Self::UnsupportedFormat { .. }
                | Self::DocumentParse { .. }
        )
    }
}

/// A single deletion that failed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub logical_id: String,
    pub name: String,
    pub message: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.logical_id, self.name, self.message)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
