//! Scopes group the resources created by one unit of work
//!
//! Every handle produced inside a scope is registered with it; teardown
//! deletes them in reverse registration order so later resources, which may
//! depend on earlier ones, go first. Teardown attempts every resource and
//! reports all failures together.

mod state;

pub use state::{ScopeState, StateEntry};

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::document::{DesiredState, ObservedState};
use crate::error::TeardownFailure;
use crate::reconcile::{Reconciler, ResourceHandle, Teardown};
use crate::{Error, Result};

/// A handle tracked by a scope, together with what can delete it
#[derive(Clone)]
pub struct ScopeEntry {
    pub logical_id: String,
    pub handle: ResourceHandle,
    owner: Arc<dyn Teardown>,
}

impl std::fmt::Debug for ScopeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeEntry")
            .field("logical_id", &self.logical_id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Ordered registry of resources owned by one unit of work
pub struct Scope {
    name: String,
    id: Uuid,
    entries: Mutex<Vec<ScopeEntry>>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Run `body` inside a fresh scope and tear the scope down afterwards.
    ///
    /// Teardown runs whether the body succeeds or fails. If the returned
    /// future is dropped before completion, the scope's drop schedules
    /// teardown on the current runtime instead. A body error takes precedence
    /// over a teardown error.
    ///
    /// The drop path is best effort: a task spawned while the runtime itself
    /// is shutting down (the end of `block_on` or of a `#[tokio::test]`) never
    /// runs. Callers that may be cancelled that late should [`Scope::release`]
    /// and persist the handles instead.
    pub async fn run<F, Fut, T>(name: impl Into<String>, body: F) -> Result<T>
    where
        F: FnOnce(Arc<Scope>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let scope = Arc::new(Scope::new(name));
        let outcome = body(Arc::clone(&scope)).await;
        let teardown = scope.destroy_all().await;

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(teardown_error)) => {
                tracing::warn!(scope = %scope.name, %teardown_error, "Teardown failed after body error");
                Err(error)
            }
        }
    }

    /// Rebuild a scope from persisted state.
    ///
    /// `owner_for` supplies the deleter for each resource kind; entries whose
    /// kind has no owner are rejected.
    pub fn restore<F>(state: &ScopeState, owner_for: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Arc<dyn Teardown>>,
    {
        let mut entries = Vec::with_capacity(state.entries().len());
        for entry in state.entries() {
            let owner = owner_for(&entry.handle.kind).ok_or_else(|| Error::State {
                message: format!(
                    "no reconciler for kind '{}' (logical id {})",
                    entry.handle.kind, entry.logical_id
                ),
            })?;
            entries.push(ScopeEntry {
                logical_id: entry.logical_id.clone(),
                handle: entry.handle.clone(),
                owner,
            });
        }

        Ok(Self {
            name: state.scope().to_string(),
            id: Uuid::new_v4(),
            entries: Mutex::new(entries),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Track `handle` under `logical_id`.
    ///
    /// Re-registering a logical id replaces its handle in place, keeping the
    /// original teardown position.
    pub async fn register(
        &self,
        logical_id: impl Into<String>,
        handle: ResourceHandle,
        owner: Arc<dyn Teardown>,
    ) {
        let logical_id = logical_id.into();
        let mut entries = self.entries.lock().await;
        tracing::debug!(scope = %self.name, %logical_id, name = %handle.name, origin = %handle.origin, "Registering resource");

        if let Some(existing) = entries.iter_mut().find(|e| e.logical_id == logical_id) {
            existing.handle = handle;
            existing.owner = owner;
        } else {
            entries.push(ScopeEntry {
                logical_id,
                handle,
                owner,
            });
        }
    }

    pub async fn get(&self, logical_id: &str) -> Option<ResourceHandle> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.logical_id == logical_id)
            .map(|e| e.handle.clone())
    }

    /// Tracked handles in registration order
    pub async fn handles(&self) -> Vec<(String, ResourceHandle)> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|e| (e.logical_id.clone(), e.handle.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Declaratively define a resource under `logical_id`.
    ///
    /// The first definition applies (create, or adopt when `adopt` is set);
    /// later definitions of a tracked id update it with the full desired
    /// state. The remote name is the desired `name` field, falling back to
    /// the logical id. When the write lands but read-back times out, the
    /// handle is still registered so teardown can remove it.
    pub async fn define(
        &self,
        reconciler: &Arc<Reconciler>,
        logical_id: &str,
        desired: &DesiredState,
        adopt: bool,
    ) -> Result<ObservedState> {
        let outcome = match self.get(logical_id).await {
            Some(handle) => reconciler.update(&handle, desired).await,
            None => {
                let name = desired
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or(logical_id);
                reconciler.apply(name, desired, adopt).await
            }
        };

        let owner: Arc<dyn Teardown> = Arc::clone(reconciler) as Arc<dyn Teardown>;
        match outcome {
            Ok(applied) => {
                self.register(logical_id, applied.handle, owner).await;
                Ok(applied.observed)
            }
            Err(Error::ConsistencyTimeout {
                handle,
                attempts,
                detail,
            }) => {
                self.register(logical_id, (*handle).clone(), owner).await;
                Err(Error::ConsistencyTimeout {
                    handle,
                    attempts,
                    detail,
                })
            }
            Err(error) => Err(error),
        }
    }

    /// Delete one tracked resource and stop tracking it
    pub async fn destroy(&self, logical_id: &str) -> Result<()> {
        let entry = {
            let mut entries = self.entries.lock().await;
            let position = entries
                .iter()
                .position(|e| e.logical_id == logical_id)
                .ok_or_else(|| Error::UnknownLogicalId(logical_id.to_string()))?;
            entries.remove(position)
        };
        entry.owner.delete(&entry.handle).await
    }

    /// Delete every tracked resource in reverse registration order.
    ///
    /// All deletions are attempted; failures are returned together as
    /// [`Error::Teardown`].
    pub async fn destroy_all(&self) -> Result<()> {
        let entries = std::mem::take(&mut *self.entries.lock().await);
        tracing::debug!(scope = %self.name, scope_id = %self.id, count = entries.len(), "Tearing down scope");
        teardown(&self.name, entries).await
    }

    /// Snapshot the tracked handles for persistence
    pub async fn snapshot(&self) -> ScopeState {
        let mut state = ScopeState::new(&self.name);
        for entry in self.entries.lock().await.iter() {
            state.add_entry(StateEntry::new(&entry.logical_id, entry.handle.clone()));
        }
        state
    }

    /// Stop tracking every resource without deleting anything.
    ///
    /// Returns the released handles so another process can take them over.
    pub async fn release(&self) -> ScopeState {
        let state = self.snapshot().await;
        self.entries.lock().await.clear();
        tracing::debug!(scope = %self.name, count = state.entries().len(), "Released resources");
        state
    }
}

async fn teardown(scope: &str, entries: Vec<ScopeEntry>) -> Result<()> {
    let mut failures = Vec::new();

    for entry in entries.into_iter().rev() {
        tracing::debug!(scope, logical_id = %entry.logical_id, name = %entry.handle.name, "Destroying resource");
        if let Err(error) = entry.owner.delete(&entry.handle).await {
            tracing::warn!(scope, logical_id = %entry.logical_id, %error, "Failed to destroy resource");
            failures.push(TeardownFailure {
                logical_id: entry.logical_id,
                name: entry.handle.name,
                message: error.to_string(),
            });
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Teardown {
            scope: scope.to_string(),
            failures,
        })
    }
}

/// Schedules teardown of anything still tracked.
///
/// The spawned task is lost if the runtime is already shutting down, so the
/// guarantee only holds while the runtime keeps running after the drop.
impl Drop for Scope {
    fn drop(&mut self) {
        let entries = std::mem::take(self.entries.get_mut());
        if entries.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!(scope = %self.name, scope_id = %self.id, count = entries.len(), "Scope dropped with live resources, scheduling teardown");
                let name = self.name.clone();
                runtime.spawn(async move {
                    if let Err(error) = teardown(&name, entries).await {
                        tracing::warn!(scope = %name, %error, "Deferred teardown failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    scope = %self.name,
                    count = entries.len(),
                    "Scope dropped outside a runtime; resources were not destroyed"
                );
            }
        }
    }
}
