//! In-memory resource cache.
//!
//! Holds a full copy of the watched resources. Loadable from a JSON
//! snapshot for standalone brokers and used directly by tests; every write
//! emits a change notification like a live watch would.

use crate::error::{StoreError, StoreResult};
use crate::ports::outbound::{ChangeOp, ResourceCache, ResourceChange, ResourceKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{
    Adapter, AppDeployment, DataSnapshot, Environment, Platform, ReleaseManifest,
    VirtualEnvironment,
};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::debug;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Serialized form of every resource the broker reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub app_deployments: Vec<AppDeployment>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub virtual_environments: Vec<VirtualEnvironment>,
    #[serde(default)]
    pub data_snapshots: Vec<DataSnapshot>,
    #[serde(default)]
    pub release_manifests: Vec<ReleaseManifest>,
    #[serde(default)]
    pub adapters: Vec<Adapter>,
}

#[derive(Default)]
struct State {
    platform: Platform,
    app_deployments: BTreeMap<String, AppDeployment>,
    environments: BTreeMap<String, Environment>,
    virtual_environments: BTreeMap<String, VirtualEnvironment>,
    data_snapshots: BTreeMap<String, DataSnapshot>,
    release_manifests: BTreeMap<String, ReleaseManifest>,
    adapters: BTreeMap<String, Adapter>,
}

pub struct InMemoryResourceCache {
    state: RwLock<State>,
    changes: broadcast::Sender<ResourceChange>,
}

impl InMemoryResourceCache {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(State::default()),
            changes,
        }
    }

    pub fn from_snapshot(snapshot: ResourceSnapshot) -> Self {
        let cache = Self::new();
        *cache.state.write() = State {
            platform: snapshot.platform,
            app_deployments: by_name(snapshot.app_deployments, |d| &d.name),
            environments: by_name(snapshot.environments, |e| &e.name),
            virtual_environments: by_name(snapshot.virtual_environments, |v| &v.name),
            data_snapshots: by_name(snapshot.data_snapshots, |s| &s.name),
            release_manifests: by_name(snapshot.release_manifests, |m| &m.name),
            adapters: by_name(snapshot.adapters, |a| &a.name),
        };
        cache
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        let snapshot: ResourceSnapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn load_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    fn notify(&self, kind: ResourceKind, name: &str, op: ChangeOp) {
        debug!(kind = %kind, name, op = ?op, "Resource changed");
        // No receivers is fine; nothing is watching yet.
        let _ = self.changes.send(ResourceChange {
            kind,
            name: name.to_string(),
            op,
        });
    }

    fn op(existed: bool) -> ChangeOp {
        if existed {
            ChangeOp::Updated
        } else {
            ChangeOp::Added
        }
    }

    pub fn set_platform(&self, platform: Platform) {
        let name = platform.name.clone();
        self.state.write().platform = platform;
        self.notify(ResourceKind::Platform, &name, ChangeOp::Updated);
    }

    pub fn put_app_deployment(&self, dep: AppDeployment) {
        let name = dep.name.clone();
        let existed = self
            .state
            .write()
            .app_deployments
            .insert(name.clone(), dep)
            .is_some();
        self.notify(ResourceKind::AppDeployment, &name, Self::op(existed));
    }

    pub fn delete_app_deployment(&self, name: &str) {
        if self.state.write().app_deployments.remove(name).is_some() {
            self.notify(ResourceKind::AppDeployment, name, ChangeOp::Deleted);
        }
    }

    pub fn put_environment(&self, env: Environment) {
        let name = env.name.clone();
        let existed = self
            .state
            .write()
            .environments
            .insert(name.clone(), env)
            .is_some();
        self.notify(ResourceKind::Environment, &name, Self::op(existed));
    }

    pub fn put_virtual_environment(&self, ve: VirtualEnvironment) {
        let name = ve.name.clone();
        let existed = self
            .state
            .write()
            .virtual_environments
            .insert(name.clone(), ve)
            .is_some();
        self.notify(ResourceKind::VirtualEnvironment, &name, Self::op(existed));
    }

    pub fn put_data_snapshot(&self, snapshot: DataSnapshot) {
        let name = snapshot.name.clone();
        let existed = self
            .state
            .write()
            .data_snapshots
            .insert(name.clone(), snapshot)
            .is_some();
        self.notify(ResourceKind::DataSnapshot, &name, Self::op(existed));
    }

    pub fn put_release_manifest(&self, manifest: ReleaseManifest) {
        let name = manifest.name.clone();
        let existed = self
            .state
            .write()
            .release_manifests
            .insert(name.clone(), manifest)
            .is_some();
        self.notify(ResourceKind::ReleaseManifest, &name, Self::op(existed));
    }

    pub fn put_adapter(&self, adapter: Adapter) {
        let name = adapter.name.clone();
        let existed = self
            .state
            .write()
            .adapters
            .insert(name.clone(), adapter)
            .is_some();
        self.notify(ResourceKind::Adapter, &name, Self::op(existed));
    }
}

impl Default for InMemoryResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

fn by_name<T>(items: Vec<T>, name: impl Fn(&T) -> &String) -> BTreeMap<String, T> {
    items.into_iter().map(|i| (name(&i).clone(), i)).collect()
}

fn lookup<T: Clone>(
    map: &BTreeMap<String, T>,
    kind: ResourceKind,
    name: &str,
) -> StoreResult<T> {
    map.get(name)
        .cloned()
        .ok_or_else(|| StoreError::not_found(kind, name))
}

#[async_trait]
impl ResourceCache for InMemoryResourceCache {
    async fn platform(&self) -> StoreResult<Platform> {
        Ok(self.state.read().platform.clone())
    }

    async fn app_deployment(&self, name: &str) -> StoreResult<AppDeployment> {
        lookup(&self.state.read().app_deployments, ResourceKind::AppDeployment, name)
    }

    async fn app_deployments(&self) -> StoreResult<Vec<AppDeployment>> {
        Ok(self.state.read().app_deployments.values().cloned().collect())
    }

    async fn environment(&self, name: &str) -> StoreResult<Environment> {
        lookup(&self.state.read().environments, ResourceKind::Environment, name)
    }

    async fn virtual_environment(&self, name: &str) -> StoreResult<VirtualEnvironment> {
        lookup(
            &self.state.read().virtual_environments,
            ResourceKind::VirtualEnvironment,
            name,
        )
    }

    async fn virtual_environments(&self) -> StoreResult<Vec<VirtualEnvironment>> {
        Ok(self
            .state
            .read()
            .virtual_environments
            .values()
            .cloned()
            .collect())
    }

    async fn data_snapshot(&self, name: &str) -> StoreResult<DataSnapshot> {
        lookup(&self.state.read().data_snapshots, ResourceKind::DataSnapshot, name)
    }

    async fn release_manifest(&self, name: &str) -> StoreResult<ReleaseManifest> {
        lookup(
            &self.state.read().release_manifests,
            ResourceKind::ReleaseManifest,
            name,
        )
    }

    async fn adapters(&self) -> StoreResult<Vec<Adapter>> {
        Ok(self.state.read().adapters.values().cloned().collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceChange> {
        self.changes.subscribe()
    }
}
