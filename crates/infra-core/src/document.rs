//! Desired, observed and wire documents, plus format-agnostic loading

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Caller-supplied configuration, keyed by camel-case field names
pub type DesiredState = Map<String, Value>;

/// The provider's current representation, mapped back to camel-case
pub type ObservedState = Map<String, Value>;

/// Payload in the provider's snake-case convention
pub type WireDocument = Map<String, Value>;

/// Load a desired-state document from disk.
///
/// Format is detected from the file extension:
/// - `.json` -> JSON
/// - `.toml` -> TOML
/// - `.yaml`, `.yml` -> YAML
///
/// The top level must be a mapping.
pub fn load_desired(path: &Path) -> Result<DesiredState> {
    let content = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let parse_error = |format: &str, message: String| Error::DocumentParse {
        path: path.to_path_buf(),
        format: format.into(),
        message,
    };

    let value: Value = match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| parse_error("JSON", e.to_string()))?,
        "toml" => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| parse_error("TOML", e.to_string()))?;
            serde_json::to_value(table)?
        }
        "yaml" | "yml" => {
            serde_yaml::from_str(&content).map_err(|e| parse_error("YAML", e.to_string()))?
        }
        _ => return Err(Error::UnsupportedFormat { extension }),
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(parse_error(
            "document",
            format!("expected a mapping at the top level, found {}", type_name(&other)),
        )),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
