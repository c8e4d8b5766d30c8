//! Handles to reconciled remote resources
//!
//! A handle identifies a remote resource by kind, name and path, and records
//! how the reconciler came to own it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::ObservedState;

/// How a handle was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// No remote object existed; one was created
    Created,
    /// A pre-existing object was reused because the caller set `adopt`
    Adopted,
    /// An object already tracked by this unit of work was rewritten
    Updated,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Adopted => "adopted",
            Self::Updated => "updated",
        };
        f.write_str(label)
    }
}

/// Identity of a remote resource plus provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Resource type label (e.g., "worker")
    pub kind: String,
    /// Remote name, unique within the account for this kind
    pub name: String,
    /// Resource path relative to the API base URL
    pub path: String,
    /// Server-assigned identifier, when the provider returns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub origin: Origin,
    /// When the handle was produced
    pub recorded_at: DateTime<Utc>,
}

impl ResourceHandle {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            path: path.into(),
            id: None,
            origin,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Copy of this handle re-stamped with a new origin
    pub fn reissued(&self, origin: Origin) -> Self {
        Self {
            origin,
            recorded_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Outcome of a successful apply or update
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub handle: ResourceHandle,
    /// Caller-shaped state read back after the write, including
    /// server-assigned fields
    pub observed: ObservedState,
}
