//! Reconciliation engine for declaratively managed cloud resources
//!
//! A caller describes the desired configuration of a resource; the engine
//! drives the remote, eventually-consistent control plane until the
//! observed state matches:
//!
//! - **Validation**: pre-flight checks of desired state ([`Schema`])
//! - **Field mapping**: camel-case caller keys to snake-case wire keys ([`FieldMapper`])
//! - **Retry**: exponential backoff until an acceptance predicate holds ([`RetryExecutor`])
//! - **Reconciliation**: create, adopt, update and delete ([`Reconciler`])
//! - **Scopes**: grouped ownership and reverse-order teardown ([`Scope`])
//!
//! # Architecture
//!
//! ```text
//!              Scope (define / destroy_all)
//!                        |
//!                   Reconciler
//!                        |
//!     +----------+-------+------+-----------+
//!     |          |              |           |
//!  Schema   FieldMapper   RetryExecutor  infra-api
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use infra_core::{Reconciler, Scope, WorkerProps, SendEmailBinding, worker_resource};
//!
//! async fn example(client: Arc<dyn infra_api::ControlPlane>) -> infra_core::Result<()> {
//!     let workers = Arc::new(Reconciler::new(client, "account-id", worker_resource()));
//!     Scope::run("example", |scope| async move {
//!         let props = WorkerProps::new().send_email(SendEmailBinding::new("EMAIL"));
//!         scope.define(&workers, "mailer", &props.to_desired(), false).await?;
//!         Ok(())
//!     })
//!     .await
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod mapper;
pub mod reconcile;
pub mod resources;
pub mod retry;
pub mod scope;
pub mod validate;

pub use config::{EngineConfig, StateConfig};
pub use document::{DesiredState, ObservedState, WireDocument, load_desired};
pub use error::{Error, Result, TeardownFailure};
pub use mapper::{FieldMapper, camel_to_snake, snake_to_camel};
pub use reconcile::{Applied, Origin, Reconciler, ResourceHandle, ResourceType, Teardown};
pub use resources::{
    EmailDestination, SendEmailBinding, WorkerProps, builtin_resources, resource_for_kind,
    worker_resource,
};
pub use retry::{Acceptance, RetryConfig, RetryExecutor, RetryFailure, RetryPolicy, accept_any};
pub use scope::{Scope, ScopeEntry, ScopeState, StateEntry};
pub use validate::{Schema, Violation, ViolationKind, is_valid_email, validate_name};
