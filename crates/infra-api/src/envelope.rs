//! Response envelope extraction
//!
//! Every control-plane response wraps its payload as
//! `{ "success": bool, "result": ..., "errors": [...], "messages": [...] }`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A single error or informational message from the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl ApiMessage {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Decoded response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

impl Envelope {
    /// Build a successful envelope around `result`
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result,
            errors: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Build a failed envelope carrying `errors`
    pub fn failed(errors: Vec<ApiMessage>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            errors,
            messages: Vec::new(),
        }
    }

    /// Decode an envelope from a raw response body.
    ///
    /// An empty body is treated as an envelope whose success follows the
    /// HTTP status, since some deletes answer with no content.
    pub fn from_body(path: &str, status: u16, body: &Value) -> Result<Self> {
        if body.is_null() {
            return Ok(if (200..300).contains(&status) {
                Self::ok(Value::Null)
            } else {
                Self::failed(Vec::new())
            });
        }
        serde_json::from_value(body.clone()).map_err(|e| Error::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Unwrap the `result`, turning a non-success envelope into [`Error::Api`]
    pub fn into_result(self, status: u16) -> Result<Value> {
        if self.success {
            Ok(self.result)
        } else {
            Err(Error::Api {
                status,
                errors: self.errors,
            })
        }
    }
}
