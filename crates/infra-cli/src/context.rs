//! Command context
//!
//! Bundles the loaded engine configuration with the control-plane client.
//! The client is built lazily so commands that never touch the provider
//! (such as `validate`) work without credentials.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use infra_api::{ControlPlane, HttpControlPlane};
use infra_core::{
    EngineConfig, Reconciler, ResourceType, Scope, ScopeState, Teardown, resource_for_kind,
    worker_resource,
};

use crate::error::{CliError, Result};

pub struct Context {
    pub config: EngineConfig,
    client: Option<Arc<dyn ControlPlane>>,
}

impl Context {
    /// Load configuration from `path`, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            config: EngineConfig::load_or_default(Some(path))?,
            client: None,
        })
    }

    /// Use an existing client instead of connecting over HTTP
    #[cfg(test)]
    pub fn with_client(config: EngineConfig, client: Arc<dyn ControlPlane>) -> Self {
        Self {
            config,
            client: Some(client),
        }
    }

    fn client(&self) -> Result<Arc<dyn ControlPlane>> {
        match &self.client {
            Some(client) => Ok(Arc::clone(client)),
            None => Ok(Arc::new(HttpControlPlane::from_config(&self.config.api)?)),
        }
    }

    /// Reconciler for workers on the configured account
    pub fn reconciler(&self) -> Result<Arc<Reconciler>> {
        self.reconciler_for(worker_resource())
    }

    fn reconciler_for(&self, resource: ResourceType) -> Result<Arc<Reconciler>> {
        let account_id = self.config.api.resolve_account_id()?;
        let reconciler = Reconciler::new(self.client()?, account_id, resource)
            .with_retry(self.config.retry_policy()?);
        Ok(Arc::new(reconciler))
    }

    pub fn state_path(&self) -> &Path {
        &self.config.state.path
    }

    pub fn load_state(&self) -> Result<ScopeState> {
        Ok(ScopeState::load_or_new(
            self.state_path(),
            &self.config.state.scope,
        )?)
    }

    /// Rebuild the persisted scope, resolving each entry's owner by its kind
    pub fn restore_scope(&self, state: &ScopeState) -> Result<Scope> {
        let mut owners: HashMap<String, Arc<dyn Teardown>> = HashMap::new();
        for entry in state.entries() {
            let kind = &entry.handle.kind;
            if owners.contains_key(kind) {
                continue;
            }
            if let Some(resource) = resource_for_kind(kind) {
                let owner: Arc<dyn Teardown> = self.reconciler_for(resource)?;
                owners.insert(kind.clone(), owner);
            }
        }

        Scope::restore(state, |kind| owners.get(kind).cloned())
            .map_err(|e| CliError::user(format!("state file {}: {}", self.state_path().display(), e)))
    }
}
