//! Error types for infra-api

use crate::client::Method;
use crate::envelope::ApiMessage;

/// Result type for infra-api operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the control plane
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced an HTTP response
    #[error("{method} {path} failed: {message}")]
    Transport {
        method: Method,
        path: String,
        message: String,
    },

    /// The provider answered with a non-success envelope
    #[error("API request failed with status {status}: {}", describe(.errors))]
    Api { status: u16, errors: Vec<ApiMessage> },

    /// The response body was not a recognisable envelope
    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Missing API credentials: environment variable {var} is not set")]
    MissingCredentials { var: String },

    #[error("Invalid API configuration: {message}")]
    Config { message: String },
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details returned".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
