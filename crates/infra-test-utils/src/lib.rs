//! Shared test utilities for the infra-reconciler workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`control_plane`]: [`FakeControlPlane`], an in-memory provider with
//!   configurable read-after-write lag and failure injection
//! - [`logging`]: tracing initialisation for tests

pub mod control_plane;
pub mod logging;

pub use control_plane::{FakeControlPlane, Mutation};
pub use logging::init_test_tracing;
