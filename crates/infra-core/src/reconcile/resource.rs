//! Per-type description of a reconcilable resource

use serde_json::Value;

use crate::document::{DesiredState, ObservedState};
use crate::mapper::FieldMapper;
use crate::validate::Schema;

/// Placeholder substituted with the account id in path templates
pub const ACCOUNT_PLACEHOLDER: &str = "{accountId}";

/// Everything the reconciler needs to know about one resource type.
///
/// The reconciler is generic over resource types; only this value changes
/// between, say, workers and queues.
#[derive(Debug, Clone)]
pub struct ResourceType {
    kind: String,
    collection_template: String,
    schema: Schema,
    managed_fields: Vec<String>,
    mapper: FieldMapper,
}

impl ResourceType {
    /// `collection_template` addresses the collection, e.g.
    /// `/accounts/{accountId}/workers/workers`; individual resources live at
    /// `<collection>/<name>`.
    pub fn new(kind: impl Into<String>, collection_template: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            collection_template: collection_template.into(),
            schema: Schema::new(),
            managed_fields: Vec::new(),
            mapper: FieldMapper::new(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Caller-facing fields owned by the reconciler.
    ///
    /// After a write, each of these must read back equal to the desired
    /// value, or absent when the desired state omits it.
    pub fn with_managed_fields(mut self, fields: &[&str]) -> Self {
        self.managed_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    pub fn managed_fields(&self) -> &[String] {
        &self.managed_fields
    }

    pub fn collection_path(&self, account_id: &str) -> String {
        self.collection_template
            .replace(ACCOUNT_PLACEHOLDER, account_id)
    }

    pub fn resource_path(&self, account_id: &str, name: &str) -> String {
        format!("{}/{}", self.collection_path(account_id), name)
    }

    /// Managed fields whose observed value differs from the desired one
    pub fn drifted_fields(&self, desired: &DesiredState, observed: &ObservedState) -> Vec<String> {
        self.managed_fields
            .iter()
            .filter(|field| desired.get(*field) != observed.get(*field))
            .cloned()
            .collect()
    }

    pub fn converged(&self, desired: &DesiredState, observed: &ObservedState) -> bool {
        self.drifted_fields(desired, observed).is_empty()
    }

    /// Server-assigned identifier from a write or read result
    pub fn server_id(result: &Value) -> Option<String> {
        result.get("id").and_then(Value::as_str).map(str::to_string)
    }
}
