//! Route store errors.

use shared_types::{BrokerError, ErrorKind};
use thiserror::Error;

use crate::ports::outbound::ResourceKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("event context is invalid: {0}")]
    InvalidContext(String),

    #[error("template '{template}' is invalid: {reason}")]
    Template { template: String, reason: String },

    #[error("app deployment '{app_deployment}' does not depend on {component_type} '{name}'")]
    UndeclaredDependency {
        app_deployment: String,
        name: String,
        component_type: String,
    },

    #[error("{0} adapters are not supported")]
    UnsupportedAdapter(String),

    #[error("resource cache unavailable: {0}")]
    Unavailable(String),

    #[error("resource snapshot could not be loaded: {0}")]
    Snapshot(String),
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for BrokerError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::InvalidContext(_) => ErrorKind::Invalid,
            StoreError::Template { .. } => ErrorKind::RouteInvalid,
            StoreError::UndeclaredDependency { .. } => ErrorKind::ComponentMismatch,
            StoreError::UnsupportedAdapter(_) => ErrorKind::UnsupportedAdapter,
            StoreError::Unavailable(_) | StoreError::Snapshot(_) => ErrorKind::Unexpected,
        };
        BrokerError::new(kind, err.to_string())
    }
}
