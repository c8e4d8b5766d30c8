//! HTTP implementation of [`ControlPlane`] over `reqwest`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::{ApiConfig, ControlPlane, Error, Method, RawResponse, Result};

/// Control-plane client authenticating with a bearer token
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpControlPlane {
    /// Build a client from configuration, reading the token from the environment
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let token = config.resolve_token()?;
        Self::new(
            &config.base_url,
            token,
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, path, "Sending control-plane request");

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        }
        .bearer_auth(&self.token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |e: reqwest::Error| Error::Transport {
            method,
            path: path.to_string(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| Error::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })?
        };

        tracing::debug!(%method, path, status, "Received control-plane response");
        Ok(RawResponse::new(status, body))
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        self.send(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse> {
        self.send(Method::Post, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<RawResponse> {
        self.send(Method::Put, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<RawResponse> {
        self.send(Method::Delete, path, None).await
    }
}
