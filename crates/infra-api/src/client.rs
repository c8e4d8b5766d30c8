//! ControlPlane trait and raw response types

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Envelope, Result};

/// HTTP verb used against the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// A response before envelope extraction
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Decode the envelope carried by this response
    pub fn envelope(&self, path: &str) -> Result<Envelope> {
        Envelope::from_body(path, self.status, &self.body)
    }

    /// Extract the `result` payload, failing on a non-success envelope
    pub fn into_result(self, path: &str) -> Result<Value> {
        let status = self.status;
        self.envelope(path)?.into_result(status)
    }
}

/// Transport seam to the remote control plane.
///
/// Implementations hold no per-request mutable state, so a single client
/// can be shared across concurrent reconciliations.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get(&self, path: &str) -> Result<RawResponse>;

    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse>;

    async fn put(&self, path: &str, body: &Value) -> Result<RawResponse>;

    async fn delete(&self, path: &str) -> Result<RawResponse>;
}

#[async_trait]
impl<T: ControlPlane + ?Sized> ControlPlane for Arc<T> {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        (**self).get(path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse> {
        (**self).post(path, body).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<RawResponse> {
        (**self).put(path, body).await
    }

    async fn delete(&self, path: &str) -> Result<RawResponse> {
        (**self).delete(path).await
    }
}
