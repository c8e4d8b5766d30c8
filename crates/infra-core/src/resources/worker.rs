//! Worker outbound email routing
//!
//! A worker may carry `sendEmail` bindings. Each binding either sends
//! anywhere, to one fixed destination, or to an allowlist of destinations;
//! sender addresses can be restricted independently.

use serde_json::{Map, Value, json};

use crate::document::DesiredState;
use crate::reconcile::ResourceType;
use crate::validate::{CollectionRule, Schema};
use crate::Result;

pub const WORKER_KIND: &str = "worker";
pub const WORKER_COLLECTION: &str = "/accounts/{accountId}/workers/workers";

pub const SEND_EMAIL: &str = "sendEmail";
pub const DESTINATION_ADDRESS: &str = "destinationAddress";
pub const ALLOWED_DESTINATION_ADDRESSES: &str = "allowedDestinationAddresses";
pub const ALLOWED_SENDER_ADDRESSES: &str = "allowedSenderAddresses";

/// Validation rules for worker desired state
pub fn worker_schema() -> Schema {
    Schema::new().collection(
        CollectionRule::new(SEND_EMAIL)
            .require("name")
            .exclusive(
                "destination",
                &[DESTINATION_ADDRESS, ALLOWED_DESTINATION_ADDRESSES],
            )
            .emails(&[DESTINATION_ADDRESS])
            .email_lists(&[ALLOWED_DESTINATION_ADDRESSES, ALLOWED_SENDER_ADDRESSES]),
    )
}

/// The worker resource type
pub fn worker_resource() -> ResourceType {
    ResourceType::new(WORKER_KIND, WORKER_COLLECTION)
        .with_schema(worker_schema())
        .with_managed_fields(&[SEND_EMAIL, "logpush", "tags"])
}

/// Where a binding may deliver mail
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EmailDestination {
    /// Any verified destination on the account
    #[default]
    Unrestricted,
    /// Exactly one destination
    Fixed(String),
    /// Any destination from the list
    Allowlist(Vec<String>),
}

/// A `sendEmail` binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEmailBinding {
    pub name: String,
    pub destination: EmailDestination,
    pub allowed_sender_addresses: Option<Vec<String>>,
}

impl SendEmailBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: EmailDestination::Unrestricted,
            allowed_sender_addresses: None,
        }
    }

    pub fn fixed(mut self, address: impl Into<String>) -> Self {
        self.destination = EmailDestination::Fixed(address.into());
        self
    }

    pub fn allow_destinations<S: Into<String>>(mut self, addresses: impl IntoIterator<Item = S>) -> Self {
        self.destination =
            EmailDestination::Allowlist(addresses.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_senders<S: Into<String>>(mut self, addresses: impl IntoIterator<Item = S>) -> Self {
        self.allowed_sender_addresses = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    fn to_value(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("name".into(), json!(self.name));
        match &self.destination {
            EmailDestination::Unrestricted => {}
            EmailDestination::Fixed(address) => {
                entry.insert(DESTINATION_ADDRESS.into(), json!(address));
            }
            EmailDestination::Allowlist(addresses) => {
                entry.insert(ALLOWED_DESTINATION_ADDRESSES.into(), json!(addresses));
            }
        }
        if let Some(senders) = &self.allowed_sender_addresses {
            entry.insert(ALLOWED_SENDER_ADDRESSES.into(), json!(senders));
        }
        Value::Object(entry)
    }

    /// Parse an entry that has already passed [`worker_schema`]
    fn from_value(entry: &Map<String, Value>) -> Self {
        let strings = |key: &str| -> Option<Vec<String>> {
            entry.get(key).and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
        };

        let destination = match (
            entry.get(DESTINATION_ADDRESS).and_then(Value::as_str),
            strings(ALLOWED_DESTINATION_ADDRESSES),
        ) {
            (Some(address), _) => EmailDestination::Fixed(address.to_string()),
            (None, Some(addresses)) => EmailDestination::Allowlist(addresses),
            (None, None) => EmailDestination::Unrestricted,
        };

        Self {
            name: entry
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            destination,
            allowed_sender_addresses: strings(ALLOWED_SENDER_ADDRESSES),
        }
    }
}

/// Typed desired state for a worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerProps {
    /// Remote name; the scope's logical id is used when unset
    pub name: Option<String>,
    pub send_email: Option<Vec<SendEmailBinding>>,
    pub logpush: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl WorkerProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn send_email(mut self, binding: SendEmailBinding) -> Self {
        self.send_email.get_or_insert_with(Vec::new).push(binding);
        self
    }

    pub fn logpush(mut self, enabled: bool) -> Self {
        self.logpush = Some(enabled);
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Render as a caller-convention document; unset fields are omitted
    pub fn to_desired(&self) -> DesiredState {
        let mut desired = DesiredState::new();
        if let Some(name) = &self.name {
            desired.insert("name".into(), json!(name));
        }
        if let Some(bindings) = &self.send_email {
            desired.insert(
                SEND_EMAIL.into(),
                Value::Array(bindings.iter().map(SendEmailBinding::to_value).collect()),
            );
        }
        if let Some(logpush) = self.logpush {
            desired.insert("logpush".into(), json!(logpush));
        }
        if let Some(tags) = &self.tags {
            desired.insert("tags".into(), json!(tags));
        }
        desired
    }

    /// Parse and validate a caller-convention document
    pub fn from_desired(desired: &DesiredState) -> Result<Self> {
        worker_schema().validate(desired)?;

        let send_email = desired.get(SEND_EMAIL).and_then(Value::as_array).map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .map(SendEmailBinding::from_value)
                .collect()
        });

        Ok(Self {
            name: desired.get("name").and_then(Value::as_str).map(str::to_string),
            send_email,
            logpush: desired.get("logpush").and_then(Value::as_bool),
            tags: desired.get("tags").and_then(Value::as_array).map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            }),
        })
    }
}
