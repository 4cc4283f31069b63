//! Identity checks for connecting components.
//!
//! A component presents the Kubernetes ServiceAccount token its pod runs
//! with. The broker reads the account name from the token claims and
//! compares it with the name that component is expected to run as. The
//! token itself is verified separately through a `TokenVerifier`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use shared_types::{BrokerError, BrokerResult, Component, ComponentType};
use std::fmt;

/// Identity presented when a replica subscribes.
#[derive(Clone)]
pub struct ComponentMeta {
    pub platform: String,
    pub component: Component,
    pub pod: String,
    /// Signed ServiceAccount token (JWT).
    pub token: String,
}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("platform", &self.platform)
            .field("component", &self.component)
            .field("pod", &self.pod)
            .finish_non_exhaustive()
    }
}

/// ServiceAccount name bound to `token`, read from its
/// `kubernetes.io.serviceaccount.name` claim. The signature is not checked
/// here.
pub fn service_account_name(token: &str) -> BrokerResult<String> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(BrokerError::unauthorized("token is not a JWT")),
    };

    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| BrokerError::unauthorized(format!("token payload undecodable: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| BrokerError::unauthorized(format!("token claims unreadable: {e}")))?;

    claims
        .get("kubernetes.io")
        .and_then(|k| k.get("serviceaccount"))
        .and_then(|sa| sa.get("name"))
        .and_then(serde_json::Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BrokerError::unauthorized("token has no ServiceAccount claim"))
}

/// ServiceAccount a component must run as: `<name>-<shortHash>` for app
/// components, `<platform>-<name>` for platform components.
pub fn expected_service_account(platform: &str, component: &Component) -> String {
    match component.component_type {
        ComponentType::Kubefox => component.group_key(),
        _ => format!("{platform}-{}", component.name),
    }
}
