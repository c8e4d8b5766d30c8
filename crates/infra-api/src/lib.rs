//! Control-plane API adapter for the infrastructure reconciler
//!
//! Provides the transport seam between the reconciliation engine and a
//! remote, eventually-consistent control plane:
//!
//! - **[`ControlPlane`]**: `get`/`post`/`put`/`delete` against resource paths
//! - **[`Envelope`]**: extraction of the `{ success, result, errors }` shape
//! - **[`HttpControlPlane`]**: `reqwest`-backed implementation with bearer auth
//! - **[`ApiConfig`]**: endpoint, account and credential settings

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;

pub use client::{ControlPlane, Method, RawResponse};
pub use config::ApiConfig;
pub use envelope::{ApiMessage, Envelope};
pub use error::{Error, Result};
pub use http::HttpControlPlane;
