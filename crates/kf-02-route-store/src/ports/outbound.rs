//! Outbound ports (SPI) for the route store.

use crate::error::StoreResult;
use async_trait::async_trait;
use shared_types::{
    Adapter, AppDeployment, DataSnapshot, EnvData, Environment, EventContext, Platform,
    ReleaseManifest, VirtualEnvironment,
};
use std::fmt;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    AppDeployment,
    Environment,
    VirtualEnvironment,
    DataSnapshot,
    ReleaseManifest,
    Adapter,
    Platform,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Added,
    Updated,
    Deleted,
}

/// Notification that a watched resource changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub kind: ResourceKind,
    pub name: String,
    pub op: ChangeOp,
}

/// Watched cache of platform resources.
#[async_trait]
pub trait ResourceCache: Send + Sync {
    async fn platform(&self) -> StoreResult<Platform>;

    async fn app_deployment(&self, name: &str) -> StoreResult<AppDeployment>;

    async fn app_deployments(&self) -> StoreResult<Vec<AppDeployment>>;

    async fn environment(&self, name: &str) -> StoreResult<Environment>;

    async fn virtual_environment(&self, name: &str) -> StoreResult<VirtualEnvironment>;

    async fn virtual_environments(&self) -> StoreResult<Vec<VirtualEnvironment>>;

    async fn data_snapshot(&self, name: &str) -> StoreResult<DataSnapshot>;

    async fn release_manifest(&self, name: &str) -> StoreResult<ReleaseManifest>;

    async fn adapters(&self) -> StoreResult<Vec<Adapter>>;

    /// Change notifications from now on.
    fn subscribe(&self) -> broadcast::Receiver<ResourceChange>;
}

/// Configuration values for one event context.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedData {
    pub data: EnvData,
    /// Identifies this exact data set; part of the matcher cache key.
    pub version: String,
}

/// Resolves the merged Vars and Secrets an event context routes with.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self, ctx: &EventContext) -> StoreResult<ResolvedData>;
}
