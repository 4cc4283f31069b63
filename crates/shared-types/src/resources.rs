//! # Resource Model
//!
//! The subset of platform resources the broker reads to build routes. Every
//! resource carries a `generation` that changes on each edit; caches key on
//! it so an edit naturally misses the old entry.

use crate::component::{Component, ComponentType};
use crate::errors::{BrokerError, BrokerResult};
use crate::val::Val;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolved Vars and Secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnvData {
    #[serde(default)]
    pub vars: BTreeMap<String, Val>,
    #[serde(default)]
    pub secrets: BTreeMap<String, Val>,
}

impl EnvData {
    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: &EnvData) {
        for (k, v) in &other.vars {
            self.vars.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.secrets {
            self.secrets.insert(k.clone(), v.clone());
        }
    }

    #[must_use]
    pub fn with_var(mut self, key: &str, val: impl Into<Val>) -> Self {
        self.vars.insert(key.to_string(), val.into());
        self
    }

    #[must_use]
    pub fn with_secret(mut self, key: &str, val: impl Into<Val>) -> Self {
        self.secrets.insert(key.to_string(), val.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub id: i64,
    pub rule: String,
    /// Explicit priority; derived from the rule when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
}

/// Declared shape of one component within an app deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    #[serde(rename = "type", default)]
    pub component_type: ComponentType,
    pub hash: String,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    #[serde(default)]
    pub default_handler: bool,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
    /// Vars handed to the component with every event it receives.
    #[serde(default)]
    pub env_vars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppDeployment {
    pub name: String,
    pub generation: i64,
    pub app_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentDefinition>,
}

impl AppDeployment {
    /// Definition of `comp`, which must be declared with the same version.
    pub fn definition(&self, comp: &Component) -> BrokerResult<&ComponentDefinition> {
        let def = self.components.get(&comp.name).ok_or_else(|| {
            BrokerError::component_mismatch(format!(
                "component '{}' not part of app deployment '{}'",
                comp.name, self.name
            ))
        })?;
        if !comp.hash.is_empty() && comp.hash != def.hash {
            return Err(BrokerError::component_mismatch(format!(
                "component '{}' version '{}' does not match app deployment '{}'",
                comp.name, comp.hash, self.name
            )));
        }
        Ok(def)
    }

    pub fn has_dependency(&self, name: &str, component_type: ComponentType) -> bool {
        self.components.values().any(|def| {
            def.dependencies
                .get(name)
                .is_some_and(|d| d.component_type == component_type)
        })
    }

    /// Every declared component with its version filled in.
    pub fn declared_components(&self) -> impl Iterator<Item = (Component, &ComponentDefinition)> {
        self.components.iter().map(|(name, def)| {
            let comp = Component::new(name.clone(), def.hash.clone())
                .with_type(def.component_type)
                .with_app(self.app_name.clone());
            (comp, def)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Environment {
    pub name: String,
    pub generation: i64,
    #[serde(default)]
    pub data: EnvData,
}

/// Release currently active in a virtual environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRelease {
    pub app_deployment: String,
    #[serde(default)]
    pub release_manifest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualEnvironment {
    pub name: String,
    pub generation: i64,
    /// Parent environment whose data this one overlays.
    pub environment: String,
    #[serde(default)]
    pub data: EnvData,
    #[serde(default)]
    pub release: Option<ActiveRelease>,
    /// Release passed its availability checks.
    #[serde(default)]
    pub available: bool,
}

/// Immutable copy of a virtual environment's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    pub name: String,
    pub generation: i64,
    pub virtual_env: String,
    #[serde(default)]
    pub data: EnvData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    pub name: String,
    pub generation: i64,
    pub virtual_env: String,
    #[serde(default)]
    pub data: EnvData,
}

/// Outbound adapter a component may declare as a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Adapter {
    pub name: String,
    pub generation: i64,
    #[serde(rename = "type", default)]
    pub component_type: ComponentType,
    /// Templated target URL.
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Platform {
    pub name: String,
    /// Platform components reported ready.
    #[serde(default)]
    pub components: Vec<Component>,
}
