//! Pre-flight validation of desired-state documents
//!
//! A [`Schema`] declares, per collection field, which members are required,
//! which groups of members are mutually exclusive, and which members must
//! hold a single email address or a list of them. Validation is synchronous, collects every violation
//! in the document, and runs before any network I/O.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::document::{DesiredState, type_name};
use crate::{Error, Result};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern is valid")
});

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,62}$").expect("name pattern is valid"));

/// Canonical email syntax: local-part "@" domain, domain containing a dot
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

/// Check a resource name before it is substituted into a path
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        return Ok(());
    }
    Err(Error::Validation {
        violations: vec![Violation::new(
            "name",
            ViolationKind::InvalidName {
                value: name.to_string(),
            },
        )],
    })
}

/// What went wrong at a given field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    MutuallyExclusive { group: String, fields: Vec<String> },
    InvalidEmail { value: String },
    MissingField { field: String },
    WrongType { expected: &'static str, found: &'static str },
    InvalidName { value: String },
}

/// A single validation failure, located by field path (e.g. `sendEmail[0]`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MutuallyExclusive { group, fields } if fields.len() == 2 => write!(
                f,
                "{}: cannot specify both {} and {} ({} options are mutually exclusive)",
                self.path, fields[0], fields[1], group
            ),
            ViolationKind::MutuallyExclusive { group, fields } => write!(
                f,
                "{}: cannot specify more than one of {} ({} options are mutually exclusive)",
                self.path,
                fields.join(", "),
                group
            ),
            ViolationKind::InvalidEmail { value } => {
                write!(f, "{}: invalid email address '{}'", self.path, value)
            }
            ViolationKind::MissingField { field } => {
                write!(f, "{}: missing required field {}", self.path, field)
            }
            ViolationKind::WrongType { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.path, expected, found)
            }
            ViolationKind::InvalidName { value } => write!(
                f,
                "{}: '{}' must be 1-63 letters, digits, '-' or '_'",
                self.path, value
            ),
        }
    }
}

/// Members of a sub-configuration of which at most one may be present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusiveGroup {
    pub name: String,
    pub fields: Vec<String>,
}

/// Rules for one collection field whose entries are sub-configurations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionRule {
    pub field: String,
    pub required: Vec<String>,
    pub exclusive: Vec<ExclusiveGroup>,
    pub email_fields: Vec<String>,
    pub email_list_fields: Vec<String>,
}

impl CollectionRule {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn require(mut self, field: &str) -> Self {
        self.required.push(field.to_string());
        self
    }

    pub fn exclusive(mut self, group: &str, fields: &[&str]) -> Self {
        self.exclusive.push(ExclusiveGroup {
            name: group.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    /// Members holding exactly one email address
    pub fn emails(mut self, fields: &[&str]) -> Self {
        self.email_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Members holding an array of email addresses
    pub fn email_lists(mut self, fields: &[&str]) -> Self {
        self.email_list_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    fn check(&self, value: &Value, violations: &mut Vec<Violation>) {
        let Some(entries) = value.as_array() else {
            violations.push(Violation::new(
                &self.field,
                ViolationKind::WrongType {
                    expected: "array",
                    found: type_name(value),
                },
            ));
            return;
        };

        for (index, entry) in entries.iter().enumerate() {
            let path = format!("{}[{}]", self.field, index);
            let Some(entry) = entry.as_object() else {
                violations.push(Violation::new(
                    path,
                    ViolationKind::WrongType {
                        expected: "object",
                        found: type_name(entry),
                    },
                ));
                continue;
            };

            for field in &self.required {
                if !entry.contains_key(field) {
                    violations.push(Violation::new(
                        &path,
                        ViolationKind::MissingField {
                            field: field.clone(),
                        },
                    ));
                }
            }

            for group in &self.exclusive {
                let present: Vec<String> = group
                    .fields
                    .iter()
                    .filter(|f| entry.contains_key(f.as_str()))
                    .cloned()
                    .collect();
                if present.len() > 1 {
                    violations.push(Violation::new(
                        &path,
                        ViolationKind::MutuallyExclusive {
                            group: group.name.clone(),
                            fields: present,
                        },
                    ));
                }
            }

            for field in &self.email_fields {
                if let Some(value) = entry.get(field) {
                    check_email(&format!("{}.{}", path, field), value, violations);
                }
            }

            for field in &self.email_list_fields {
                let Some(value) = entry.get(field) else {
                    continue;
                };
                let path = format!("{}.{}", path, field);
                match value.as_array() {
                    Some(items) => {
                        for (index, item) in items.iter().enumerate() {
                            check_email(&format!("{}[{}]", path, index), item, violations);
                        }
                    }
                    None => violations.push(Violation::new(
                        path,
                        ViolationKind::WrongType {
                            expected: "array of email addresses",
                            found: type_name(value),
                        },
                    )),
                }
            }
        }
    }
}

fn check_email(path: &str, value: &Value, violations: &mut Vec<Violation>) {
    match value {
        Value::String(address) if is_valid_email(address) => {}
        Value::String(address) => violations.push(Violation::new(
            path,
            ViolationKind::InvalidEmail {
                value: address.clone(),
            },
        )),
        other => violations.push(Violation::new(
            path,
            ViolationKind::WrongType {
                expected: "email address",
                found: type_name(other),
            },
        )),
    }
}

/// Declarative validation rules for one resource type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    collections: Vec<CollectionRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, rule: CollectionRule) -> Self {
        self.collections.push(rule);
        self
    }

    /// Collect every violation in `desired`
    pub fn violations(&self, desired: &DesiredState) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.collections {
            if let Some(value) = desired.get(&rule.field) {
                rule.check(value, &mut violations);
            }
        }
        violations
    }

    /// Validate `desired`, failing with all violations found
    pub fn validate(&self, desired: &DesiredState) -> Result<()> {
        let violations = self.violations(desired);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { violations })
        }
    }
}
