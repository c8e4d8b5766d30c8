//! Built-in resource types

pub mod worker;

use crate::reconcile::ResourceType;

pub use worker::{EmailDestination, SendEmailBinding, WorkerProps, worker_resource};

/// All built-in resource types
pub fn builtin_resources() -> Vec<ResourceType> {
    vec![worker_resource()]
}

/// Look up a built-in resource type by kind label
pub fn resource_for_kind(kind: &str) -> Option<ResourceType> {
    builtin_resources().into_iter().find(|r| r.kind() == kind)
}
