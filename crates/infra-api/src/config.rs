//! API endpoint and credential settings

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_TOKEN_ENV: &str = "CLOUDFLARE_API_TOKEN";
pub const DEFAULT_ACCOUNT_ENV: &str = "CLOUDFLARE_ACCOUNT_ID";

/// Connection settings for the control plane.
///
/// The API token itself is never stored in configuration files; only the
/// name of the environment variable holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Account identifier substituted into resource paths.
    /// Falls back to `CLOUDFLARE_ACCOUNT_ID` when empty.
    pub account_id: String,
    pub api_token_env: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            account_id: String::new(),
            api_token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    /// Resolve the account id from config, then the environment
    pub fn resolve_account_id(&self) -> Result<String> {
        if !self.account_id.is_empty() {
            return Ok(self.account_id.clone());
        }
        std::env::var(DEFAULT_ACCOUNT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config {
                message: format!(
                    "no account_id configured and {} is not set",
                    DEFAULT_ACCOUNT_ENV
                ),
            })
    }

    /// Read the API token from the configured environment variable
    pub fn resolve_token(&self) -> Result<String> {
        std::env::var(&self.api_token_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::MissingCredentials {
                var: self.api_token_env.clone(),
            })
    }
}
