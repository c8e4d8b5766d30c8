//! Resource lifecycle reconciliation
//!
//! Per resource: `absent -> creating -> present`, with
//! `present -> updating -> present` and `present -> deleting -> absent`.
//!
//! Writes always send the complete desired state, so a field omitted from a
//! later apply is cleared remotely. After every write the object is read
//! back under the retry executor until the managed fields match what was
//! written, which guards against read-after-write lag.

mod handle;
mod resource;

pub use handle::{Applied, Origin, ResourceHandle};
pub use resource::{ACCOUNT_PLACEHOLDER, ResourceType};

use std::sync::Arc;

use async_trait::async_trait;
use infra_api::ControlPlane;
use serde_json::Value;

use crate::document::{DesiredState, ObservedState, WireDocument};
use crate::retry::{RetryExecutor, RetryFailure, RetryPolicy};
use crate::validate::validate_name;
use crate::{Error, Result};

/// Anything that can delete a resource identified by a handle
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn delete(&self, handle: &ResourceHandle) -> Result<()>;
}

/// Reconciles one resource type against the control plane
pub struct Reconciler {
    client: Arc<dyn ControlPlane>,
    account_id: String,
    resource: ResourceType,
    read_back: RetryExecutor,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        account_id: impl Into<String>,
        resource: ResourceType,
    ) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            resource,
            read_back: RetryExecutor::default(),
        }
    }

    /// Use `policy` for post-write consistency checks
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_back = RetryExecutor::new(policy);
        self
    }

    /// Fetch the current observed state, `None` if the resource is absent
    pub async fn read(&self, name: &str) -> Result<Option<ObservedState>> {
        validate_name(name)?;
        let path = self.resource.resource_path(&self.account_id, name);
        let wire = self.fetch(&path).await?;
        Ok(wire.map(|w| self.resource.mapper().from_wire(&w)))
    }

    /// Create `name` from `desired`, or adopt an existing resource.
    ///
    /// An existing resource is a [`Error::Conflict`] unless `adopt` is set,
    /// in which case it is overwritten with the full desired state.
    pub async fn apply(&self, name: &str, desired: &DesiredState, adopt: bool) -> Result<Applied> {
        validate_name(name)?;
        self.resource.schema().validate(desired)?;

        let kind = self.resource.kind();
        let body = self.wire_body(name, desired);
        let path = self.resource.resource_path(&self.account_id, name);

        let (origin, result) = match self.fetch(&path).await? {
            None => {
                let collection = self.resource.collection_path(&self.account_id);
                tracing::info!(kind, name, "Creating resource");
                let response = self.client.post(&collection, &body).await?;
                (Origin::Created, response.into_result(&collection)?)
            }
            Some(_) if !adopt => {
                return Err(Error::Conflict {
                    kind: kind.to_string(),
                    name: name.to_string(),
                });
            }
            Some(_) => {
                tracing::info!(kind, name, "Adopting existing resource");
                let response = self.client.put(&path, &body).await?;
                (Origin::Adopted, response.into_result(&path)?)
            }
        };

        let handle = ResourceHandle::new(kind, name, path, origin)
            .with_id(ResourceType::server_id(&result));
        self.confirm(handle, desired).await
    }

    /// Rewrite a resource this caller already owns with the full desired state
    pub async fn update(&self, handle: &ResourceHandle, desired: &DesiredState) -> Result<Applied> {
        self.resource.schema().validate(desired)?;

        let body = self.wire_body(&handle.name, desired);
        tracing::info!(kind = %handle.kind, name = %handle.name, "Updating resource");
        let response = self.client.put(&handle.path, &body).await?;
        let result = response.into_result(&handle.path)?;

        let id = ResourceType::server_id(&result).or_else(|| handle.id.clone());
        let handle = handle.reissued(Origin::Updated).with_id(id);
        self.confirm(handle, desired).await
    }

    /// Delete the resource behind `handle`; already-absent is success
    pub async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let response = self.client.delete(&handle.path).await?;
        if response.is_not_found() {
            tracing::debug!(kind = %handle.kind, name = %handle.name, "Resource already absent");
            return Ok(());
        }
        response.into_result(&handle.path)?;
        tracing::info!(kind = %handle.kind, name = %handle.name, "Deleted resource");
        Ok(())
    }

    fn wire_body(&self, name: &str, desired: &DesiredState) -> Value {
        let mut wire = self.resource.mapper().to_wire(desired);
        wire.insert("name".to_string(), Value::String(name.to_string()));
        Value::Object(wire)
    }

    async fn fetch(&self, path: &str) -> Result<Option<WireDocument>> {
        let response = self.client.get(path).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        match response.into_result(path)? {
            Value::Object(wire) => Ok(Some(wire)),
            Value::Null => Ok(None),
            other => Err(Error::Transport(infra_api::Error::Decode {
                path: path.to_string(),
                message: format!("expected an object result, found {}", other),
            })),
        }
    }

    async fn fetch_observed(&self, path: &str) -> Result<ObservedState> {
        match self.fetch(path).await? {
            Some(wire) => Ok(self.resource.mapper().from_wire(&wire)),
            None => Err(Error::NotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Poll until the managed fields read back as written
    async fn confirm(&self, handle: ResourceHandle, desired: &DesiredState) -> Result<Applied> {
        let path = handle.path.clone();
        let outcome = self
            .read_back
            .execute(
                || self.fetch_observed(&path),
                |observed: &ObservedState| self.resource.converged(desired, observed),
            )
            .await;

        match outcome {
            Ok(observed) => {
                tracing::debug!(name = %handle.name, origin = %handle.origin, "Read-back converged");
                Ok(Applied { handle, observed })
            }
            Err(RetryFailure::Aborted { error, .. }) => Err(error),
            Err(RetryFailure::Exhausted { attempts, error }) => {
                tracing::warn!(name = %handle.name, attempts, %error, "Read-back never succeeded");
                Err(Error::ConsistencyTimeout {
                    handle: Box::new(handle),
                    attempts,
                    detail: error.to_string(),
                })
            }
            Err(RetryFailure::Rejected { attempts, last }) => {
                let drifted = self.resource.drifted_fields(desired, &last);
                tracing::warn!(name = %handle.name, attempts, ?drifted, "Read-back never converged");
                Err(Error::ConsistencyTimeout {
                    handle: Box::new(handle),
                    attempts,
                    detail: format!("observed state still differs in {}", drifted.join(", ")),
                })
            }
        }
    }
}

#[async_trait]
impl Teardown for Reconciler {
    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        Reconciler::delete(self, handle).await
    }
}
