//! Bidirectional field-name mapping between caller and wire conventions
//!
//! Callers write camel-case keys (`allowedSenderAddresses`); the provider
//! speaks snake-case (`allowed_sender_addresses`). Mapping is applied to
//! object keys at every depth; values are carried through untouched.
//!
//! Keys absent from the input are absent from the output. An explicitly
//! empty value (`[]`, `""`, `null`) is preserved as-is, so "not specified"
//! and "specified as empty" stay distinguishable on the wire.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::document::{DesiredState, ObservedState, WireDocument};

/// Convert a camel-case key to snake-case (`sendEmail` -> `send_email`)
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a snake-case key to camel-case (`send_email` -> `sendEmail`)
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' && !out.is_empty() {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Field mapper with optional per-key overrides.
///
/// Overrides cover keys whose wire name does not follow the mechanical
/// conversion; they apply in both directions.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    to_wire: HashMap<String, String>,
    from_wire: HashMap<String, String>,
}

impl FieldMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `caller` to `wire` explicitly, in both directions
    pub fn with_override(mut self, caller: &str, wire: &str) -> Self {
        self.to_wire.insert(caller.to_string(), wire.to_string());
        self.from_wire.insert(wire.to_string(), caller.to_string());
        self
    }

    pub fn wire_key(&self, caller: &str) -> String {
        self.to_wire
            .get(caller)
            .cloned()
            .unwrap_or_else(|| camel_to_snake(caller))
    }

    pub fn caller_key(&self, wire: &str) -> String {
        self.from_wire
            .get(wire)
            .cloned()
            .unwrap_or_else(|| snake_to_camel(wire))
    }

    pub fn to_wire(&self, desired: &DesiredState) -> WireDocument {
        self.map_object(desired, &|k| self.wire_key(k))
    }

    pub fn from_wire(&self, wire: &WireDocument) -> ObservedState {
        self.map_object(wire, &|k| self.caller_key(k))
    }

    fn map_object(&self, object: &Map<String, Value>, rename: &dyn Fn(&str) -> String) -> Map<String, Value> {
        object
            .iter()
            .map(|(key, value)| (rename(key), self.map_value(value, rename)))
            .collect()
    }

    fn map_value(&self, value: &Value, rename: &dyn Fn(&str) -> String) -> Value {
        match value {
            Value::Object(object) => Value::Object(self.map_object(object, rename)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.map_value(v, rename)).collect())
            }
            other => other.clone(),
        }
    }
}
