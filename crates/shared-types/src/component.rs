//! # Component Identity
//!
//! A Component names a sender or receiver of events. The same struct is used
//! at every level of precision:
//!
//! | name | hash | id | broker_id | Meaning |
//! |------|------|----|-----------|---------|
//! | ✓ | | | | name-only, resolved against the deployment |
//! | ✓ | ✓ | | | any replica of one version (group) |
//! | ✓ | ✓ | ✓ | | one replica, broker unknown |
//! | ✓ | ✓ | ✓ | ✓ | complete, addressable without routing |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the abbreviated version hash used in keys and subjects.
pub const SHORT_HASH_LEN: usize = 7;

/// Kind of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    #[default]
    Kubefox,
    HttpAdapter,
    Platform,
    Broker,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Kubefox => "kubefox",
            ComponentType::HttpAdapter => "http-adapter",
            ComponentType::Platform => "platform",
            ComponentType::Broker => "broker",
        }
    }

    pub fn is_adapter(&self) -> bool {
        matches!(self, ComponentType::HttpAdapter)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a sender or receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Component {
    #[serde(rename = "type", default)]
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app: String,
    pub name: String,
    /// Version of the component, usually a git commit hash.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    /// Replica instance; empty means any replica of this version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Broker currently hosting the replica; empty means unknown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub broker_id: String,
}

impl Component {
    pub fn new(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            ..Default::default()
        }
    }

    /// Component identified by name alone.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, component_type: ComponentType) -> Self {
        self.component_type = component_type;
        self
    }

    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = app.into();
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_broker(mut self, broker_id: impl Into<String>) -> Self {
        self.broker_id = broker_id.into();
        self
    }

    /// Name, version, replica and broker are all known.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && !self.hash.is_empty()
            && !self.id.is_empty()
            && !self.broker_id.is_empty()
    }

    pub fn is_name_only(&self) -> bool {
        !self.name.is_empty()
            && self.hash.is_empty()
            && self.id.is_empty()
            && self.broker_id.is_empty()
    }

    /// Name and version match, and replica/broker match wherever both sides
    /// know them.
    pub fn equivalent(&self, other: &Component) -> bool {
        fn opt_eq(a: &str, b: &str) -> bool {
            a.is_empty() || b.is_empty() || a == b
        }

        self.name == other.name
            && self.hash == other.hash
            && opt_eq(&self.id, &other.id)
            && opt_eq(&self.broker_id, &other.broker_id)
    }

    pub fn short_hash(&self) -> &str {
        self.hash.get(..SHORT_HASH_LEN).unwrap_or("")
    }

    /// `name-short-id`, unique per replica.
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.name, self.short_hash(), self.id)
    }

    /// `name-short`, shared by every replica of one version.
    pub fn group_key(&self) -> String {
        format!("{}-{}", self.name, self.short_hash())
    }

    /// Durable transport subject this component is reachable on.
    pub fn subject(&self) -> String {
        if !self.broker_id.is_empty() {
            self.broker_subject()
        } else if self.id.is_empty() {
            self.group_subject()
        } else {
            format!("{}.{}", self.group_subject(), self.id)
        }
    }

    pub fn group_subject(&self) -> String {
        format!("evt.js.{}.{}", self.name, self.short_hash())
    }

    pub fn broker_subject(&self) -> String {
        format!("evt.brk.{}", self.broker_id)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
