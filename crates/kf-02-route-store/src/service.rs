//! # Route Store Service
//!
//! Implements `RouteLookup` over a watched `ResourceCache` and a
//! `ConfigResolver`.
//!
//! ## Caches
//!
//! | Cache | Key | Invalidation |
//! |-------|-----|--------------|
//! | deployment matchers | `context_key` | key change, TTL |
//! | context validation | `context_key` | adapter change, TTL |
//! | release matcher | - | change counter, rebuilt by the watcher |
//! | component registry | `group_key` | rebuilt on deployment/platform change, TTL |
//! | adapters | name | cleared on adapter change |
//!
//! Every cached value is immutable. Writers build a replacement and swap
//! it in; readers holding the old `Arc` keep a consistent view.

use crate::adapters::MergingConfigResolver;
use crate::domain::{build_routes, context_key, expand, ResolvedContext, TtlCache};
use crate::error::{StoreError, StoreResult};
use crate::ports::inbound::RouteLookup;
use crate::ports::outbound::{ConfigResolver, ResourceCache, ResourceChange, ResourceKind};
use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use kf_01_rule_matcher::Matcher;
use shared_types::{
    Adapter, Component, ComponentDefinition, ComponentType, EventContext,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Platform this broker serves; contexts naming another are rejected.
    pub platform: String,
    pub deployment_ttl: Duration,
    pub component_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            platform: "dev".to_string(),
            deployment_ttl: Duration::from_secs(15 * 60),
            component_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What a burst of change notifications invalidated.
#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    components: bool,
    adapters: bool,
}

impl Dirty {
    fn note(&mut self, change: &ResourceChange) {
        match change.kind {
            ResourceKind::AppDeployment | ResourceKind::Platform => self.components = true,
            ResourceKind::Adapter => self.adapters = true,
            _ => {}
        }
    }

    fn all() -> Self {
        Self {
            components: true,
            adapters: true,
        }
    }
}

pub struct RouteStore {
    config: StoreConfig,
    resources: Arc<dyn ResourceCache>,
    resolver: Arc<dyn ConfigResolver>,

    deployment_matchers: TtlCache<Matcher>,
    validated: TtlCache<StoreResult<()>>,

    release_matcher: ArcSwapOption<Matcher>,
    /// Bumped on every resource change.
    changes: AtomicU64,
    /// Value of `changes` the current release matcher was built for.
    built_for: AtomicU64,
    rebuild_lock: Mutex<()>,

    components: TtlCache<ComponentDefinition>,
    genesis: ArcSwap<HashSet<String>>,
    adapters: ArcSwapOption<HashMap<String, Adapter>>,
}

impl RouteStore {
    pub fn new(
        config: StoreConfig,
        resources: Arc<dyn ResourceCache>,
        resolver: Arc<dyn ConfigResolver>,
    ) -> Self {
        Self {
            deployment_matchers: TtlCache::new(config.deployment_ttl),
            validated: TtlCache::new(config.deployment_ttl),
            release_matcher: ArcSwapOption::empty(),
            changes: AtomicU64::new(1),
            built_for: AtomicU64::new(0),
            rebuild_lock: Mutex::new(()),
            components: TtlCache::new(config.component_ttl),
            genesis: ArcSwap::from_pointee(HashSet::new()),
            adapters: ArcSwapOption::empty(),
            config,
            resources,
            resolver,
        }
    }

    /// Store resolving configuration with `MergingConfigResolver`.
    pub fn with_resources(config: StoreConfig, resources: Arc<dyn ResourceCache>) -> Self {
        let resolver = Arc::new(MergingConfigResolver::new(resources.clone()));
        Self::new(config, resources, resolver)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn resources(&self) -> &Arc<dyn ResourceCache> {
        &self.resources
    }

    /// Build the component registry and the first release matcher. Errors
    /// here mean the resource cache is unusable.
    pub async fn open(&self) -> StoreResult<()> {
        self.rebuild_components().await?;
        let matcher = self.release_matcher().await?;
        info!(
            platform = %self.config.platform,
            components = self.components.len(),
            released_routes = matcher.len(),
            "Route store opened"
        );
        Ok(())
    }

    /// Mark everything derived from resources as stale. The next
    /// `release_matcher` call rebuilds.
    pub fn invalidate(&self) {
        self.adapters.store(None);
        self.validated.clear();
        self.changes.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop expired cache entries. The component registry is rebuilt if
    /// any of its entries expired.
    pub async fn purge_expired(&self) -> usize {
        let mut purged = self.deployment_matchers.purge_expired();
        purged += self.validated.purge_expired();

        let expired_components = self.components.purge_expired();
        if expired_components > 0 {
            if let Err(e) = self.rebuild_components().await {
                warn!(error = %e, "Component registry refresh failed");
            }
        }
        purged += expired_components;

        if purged > 0 {
            debug!(purged, "Expired route store entries purged");
        }
        purged
    }

    /// Follow resource changes until `shutdown`. A burst of notifications
    /// is coalesced into one rebuild.
    pub fn spawn_watcher(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut rx = self.resources.subscribe();

        tokio::spawn(async move {
            loop {
                let first = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    change = rx.recv() => change,
                };

                let mut dirty = Dirty::default();
                match first {
                    Ok(change) => dirty.note(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Resource watcher lagged, rebuilding everything");
                        dirty = Dirty::all();
                    }
                    Err(RecvError::Closed) => break,
                }

                loop {
                    match rx.try_recv() {
                        Ok(change) => dirty.note(&change),
                        Err(TryRecvError::Lagged(_)) => dirty = Dirty::all(),
                        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    }
                }

                store.apply(dirty).await;
            }
            debug!("Resource watcher stopped");
        })
    }

    async fn apply(&self, dirty: Dirty) {
        self.invalidate();
        if dirty.components {
            if let Err(e) = self.rebuild_components().await {
                warn!(error = %e, "Component registry rebuild failed");
            }
        }
        if let Err(e) = self.release_matcher().await {
            warn!(error = %e, "Release matcher rebuild failed");
        }
    }

    async fn rebuild_components(&self) -> StoreResult<()> {
        let platform = self.resources.platform().await?;
        let deployments = self.resources.app_deployments().await?;

        let mut entries = Vec::new();
        for dep in &deployments {
            for (comp, def) in dep.declared_components() {
                entries.push((comp.group_key(), def.clone()));
            }
        }

        let mut genesis = HashSet::new();
        for comp in &platform.components {
            if comp.component_type == ComponentType::HttpAdapter {
                genesis.insert(comp.group_key());
            }
            let def = ComponentDefinition {
                component_type: comp.component_type,
                hash: comp.hash.clone(),
                ..Default::default()
            };
            entries.push((comp.group_key(), def));
        }

        let count = entries.len();
        self.components.replace_all(entries);
        self.genesis.store(Arc::new(genesis));
        debug!(components = count, "Component registry rebuilt");
        Ok(())
    }

    async fn build_release_matcher(&self) -> StoreResult<Matcher> {
        let mut routes = Vec::new();
        for ve in self.resources.virtual_environments().await? {
            let Some(release) = ve.release.as_ref().filter(|_| ve.available) else {
                continue;
            };
            let ctx = EventContext {
                platform: self.config.platform.clone(),
                app_deployment: release.app_deployment.clone(),
                virtual_env: ve.name.clone(),
                virtual_env_snapshot: String::new(),
                release_manifest: release.release_manifest.clone(),
            };
            let dep = match self.resources.app_deployment(&release.app_deployment).await {
                Ok(dep) => dep,
                Err(e) => {
                    warn!(virtual_env = %ve.name, error = %e, "Skipping release");
                    continue;
                }
            };
            let resolved = match self.resolver.resolve(&ctx).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(virtual_env = %ve.name, error = %e, "Skipping release");
                    continue;
                }
            };
            routes.extend(build_routes(&dep, &resolved.data, &ctx));
        }
        Ok(Matcher::new(routes))
    }

    /// App deployment of the release a pinned manifest belongs to.
    async fn release_deployment(&self, ctx: &EventContext) -> StoreResult<String> {
        let ve = self.resources.virtual_environment(&ctx.virtual_env).await?;
        match ve.release {
            Some(release) if release.release_manifest == ctx.release_manifest => {
                Ok(release.app_deployment)
            }
            _ => Err(StoreError::InvalidContext(format!(
                "release manifest '{}' is not active in virtual environment '{}'",
                ctx.release_manifest, ctx.virtual_env
            ))),
        }
    }

    async fn adapter_index(&self) -> StoreResult<Arc<HashMap<String, Adapter>>> {
        if let Some(index) = self.adapters.load_full() {
            return Ok(index);
        }
        let index: HashMap<String, Adapter> = self
            .resources
            .adapters()
            .await?
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
        let index = Arc::new(index);
        self.adapters.store(Some(index.clone()));
        Ok(index)
    }

    /// Every adapter the deployment depends on must exist with the
    /// declared type.
    async fn check_dependencies(&self, resolved: &ResolvedContext) -> StoreResult<()> {
        let adapters = self.adapter_index().await?;
        let dep = &resolved.app_deployment;
        for (comp_name, def) in &dep.components {
            for (name, dependency) in &def.dependencies {
                if !dependency.component_type.is_adapter() {
                    continue;
                }
                let present = adapters
                    .get(name)
                    .is_some_and(|a| a.component_type == dependency.component_type);
                if !present {
                    return Err(StoreError::InvalidContext(format!(
                        "component '{comp_name}' of app deployment '{}' depends on missing {} '{name}'",
                        dep.name, dependency.component_type
                    )));
                }
            }
        }
        Ok(())
    }

    async fn validate(&self, resolved: &ResolvedContext) -> StoreResult<()> {
        if let Some(result) = self.validated.get(&resolved.key) {
            return (*result).clone();
        }
        let result = self.check_dependencies(resolved).await;
        if !matches!(result, Err(StoreError::Unavailable(_))) {
            self.validated.insert(resolved.key.clone(), result.clone());
        }
        result
    }
}

#[async_trait]
impl RouteLookup for RouteStore {
    async fn attach_event_context(&self, ctx: &EventContext) -> StoreResult<ResolvedContext> {
        if !ctx.is_resolvable() {
            return Err(StoreError::InvalidContext(
                "platform, virtual environment and app deployment or release manifest are required"
                    .to_string(),
            ));
        }
        if ctx.platform != self.config.platform {
            return Err(StoreError::InvalidContext(format!(
                "platform '{}' is not served here",
                ctx.platform
            )));
        }

        let mut ctx = ctx.clone();
        if ctx.app_deployment.is_empty() {
            ctx.app_deployment = self.release_deployment(&ctx).await?;
        }

        let resolved = self.resolver.resolve(&ctx).await?;
        let dep = self.resources.app_deployment(&ctx.app_deployment).await?;
        let key = context_key(&dep, &ctx.virtual_env, &resolved.version);

        let out = ResolvedContext {
            context: ctx,
            app_deployment: Arc::new(dep),
            data: Arc::new(resolved.data),
            key,
        };
        self.validate(&out).await?;
        Ok(out)
    }

    async fn deployment_matcher(&self, resolved: &ResolvedContext) -> StoreResult<Arc<Matcher>> {
        if let Some(matcher) = self.deployment_matchers.get(&resolved.key) {
            return Ok(matcher);
        }
        let routes = build_routes(&resolved.app_deployment, &resolved.data, &resolved.context);
        let matcher = Matcher::new(routes);
        debug!(
            key = %resolved.key,
            routes = matcher.len(),
            invalid = matcher.invalid_routes().len(),
            "Deployment matcher built"
        );
        Ok(self.deployment_matchers.insert(resolved.key.clone(), matcher))
    }

    async fn release_matcher(&self) -> StoreResult<Arc<Matcher>> {
        let current = |wanted: u64| {
            if self.built_for.load(Ordering::Acquire) == wanted {
                self.release_matcher.load_full()
            } else {
                None
            }
        };

        if let Some(matcher) = current(self.changes.load(Ordering::Acquire)) {
            return Ok(matcher);
        }

        let _guard = self.rebuild_lock.lock().await;
        let wanted = self.changes.load(Ordering::Acquire);
        if let Some(matcher) = current(wanted) {
            return Ok(matcher);
        }

        match self.build_release_matcher().await {
            Ok(matcher) => {
                let matcher = Arc::new(matcher);
                self.release_matcher.store(Some(matcher.clone()));
                self.built_for.store(wanted, Ordering::Release);
                debug!(routes = matcher.len(), "Release matcher rebuilt");
                Ok(matcher)
            }
            Err(e) => match self.release_matcher.load_full() {
                Some(previous) => {
                    warn!(error = %e, "Release matcher rebuild failed, serving previous");
                    Ok(previous)
                }
                None => Err(e),
            },
        }
    }

    async fn adapter(
        &self,
        resolved: &ResolvedContext,
        name: &str,
        component_type: ComponentType,
    ) -> StoreResult<Adapter> {
        if !component_type.is_adapter() {
            return Err(StoreError::UnsupportedAdapter(component_type.to_string()));
        }
        if !resolved.app_deployment.has_dependency(name, component_type) {
            return Err(StoreError::UndeclaredDependency {
                app_deployment: resolved.app_deployment.name.clone(),
                name: name.to_string(),
                component_type: component_type.to_string(),
            });
        }

        let adapters = self.adapter_index().await?;
        let mut adapter = adapters
            .get(name)
            .filter(|a| a.component_type == component_type)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::Adapter, name))?;

        adapter.url = expand(&adapter.url, &resolved.data, true)?;
        for value in adapter.headers.values_mut() {
            *value = expand(value, &resolved.data, true)?;
        }
        Ok(adapter)
    }

    fn component_def(&self, component: &Component) -> Option<Arc<ComponentDefinition>> {
        self.components.get(&component.group_key())
    }

    fn is_genesis_adapter(&self, component: &Component) -> bool {
        self.genesis.load().contains(&component.group_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryResourceCache;
    use shared_types::{
        event_type, ActiveRelease, AppDeployment, Category, DataSnapshot, Dependency, EnvData,
        Environment, Event, Platform, ReleaseManifest, RouteSpec, Val, VirtualEnvironment,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::broadcast;

    const CART_HASH: &str = "0123456789abc";
    const HTTP_SRV_HASH: &str = "fedcba9876543";

    fn shop(generation: i64) -> AppDeployment {
        AppDeployment {
            name: "shop".into(),
            generation,
            app_name: "shop-app".into(),
            components: BTreeMap::from([(
                "cart".to_string(),
                ComponentDefinition {
                    hash: CART_HASH.into(),
                    routes: vec![RouteSpec {
                        id: 0,
                        rule: r#"Method("GET") && Path("/{{.Vars.base}}/{id}")"#.into(),
                        priority: None,
                    }],
                    dependencies: BTreeMap::from([(
                        "payments".to_string(),
                        Dependency {
                            component_type: ComponentType::HttpAdapter,
                        },
                    )]),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        }
    }

    fn environment(generation: i64, base: &str) -> Environment {
        Environment {
            name: "prod".into(),
            generation,
            data: EnvData::default()
                .with_var("base", base)
                .with_var("payHost", "pay.internal")
                .with_secret("payToken", "s3cret"),
        }
    }

    fn fixture() -> Arc<InMemoryResourceCache> {
        let cache = Arc::new(InMemoryResourceCache::new());
        cache.set_platform(Platform {
            name: "dev".into(),
            components: vec![Component::new("http-srv", HTTP_SRV_HASH)
                .with_type(ComponentType::HttpAdapter)],
        });
        cache.put_app_deployment(shop(1));
        cache.put_environment(environment(1, "cart"));
        cache.put_virtual_environment(VirtualEnvironment {
            name: "prod".into(),
            generation: 1,
            environment: "prod".into(),
            release: Some(ActiveRelease {
                app_deployment: "shop".into(),
                release_manifest: "rel-1".into(),
            }),
            available: true,
            ..Default::default()
        });
        cache.put_release_manifest(ReleaseManifest {
            name: "rel-1".into(),
            generation: 1,
            virtual_env: "prod".into(),
            data: EnvData::default().with_var("base", "basket"),
        });
        cache.put_adapter(Adapter {
            name: "payments".into(),
            generation: 1,
            component_type: ComponentType::HttpAdapter,
            url: "https://{{.Vars.payHost}}/v1".into(),
            headers: BTreeMap::from([(
                "Authorization".to_string(),
                "Bearer {{.Secrets.payToken}}".to_string(),
            )]),
            insecure_skip_verify: false,
        });
        cache
    }

    fn store(cache: Arc<InMemoryResourceCache>) -> RouteStore {
        RouteStore::with_resources(StoreConfig::default(), cache)
    }

    /// In-memory cache whose list reads can be made to fail.
    struct ListFailingCache {
        inner: Arc<InMemoryResourceCache>,
        fail_lists: AtomicBool,
    }

    impl ListFailingCache {
        fn new(inner: Arc<InMemoryResourceCache>) -> Self {
            Self {
                inner,
                fail_lists: AtomicBool::new(false),
            }
        }

        fn check(&self) -> StoreResult<()> {
            if self.fail_lists.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("list failed".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ResourceCache for ListFailingCache {
        async fn platform(&self) -> StoreResult<Platform> {
            self.inner.platform().await
        }

        async fn app_deployment(&self, name: &str) -> StoreResult<AppDeployment> {
            self.inner.app_deployment(name).await
        }

        async fn app_deployments(&self) -> StoreResult<Vec<AppDeployment>> {
            self.check()?;
            self.inner.app_deployments().await
        }

        async fn environment(&self, name: &str) -> StoreResult<Environment> {
            self.inner.environment(name).await
        }

        async fn virtual_environment(&self, name: &str) -> StoreResult<VirtualEnvironment> {
            self.inner.virtual_environment(name).await
        }

        async fn virtual_environments(&self) -> StoreResult<Vec<VirtualEnvironment>> {
            self.check()?;
            self.inner.virtual_environments().await
        }

        async fn data_snapshot(&self, name: &str) -> StoreResult<DataSnapshot> {
            self.inner.data_snapshot(name).await
        }

        async fn release_manifest(&self, name: &str) -> StoreResult<ReleaseManifest> {
            self.inner.release_manifest(name).await
        }

        async fn adapters(&self) -> StoreResult<Vec<Adapter>> {
            self.inner.adapters().await
        }

        fn subscribe(&self) -> broadcast::Receiver<ResourceChange> {
            self.inner.subscribe()
        }
    }

    fn get(path: &str) -> Event {
        let mut evt = Event::new(Category::Request, event_type::HTTP, Duration::from_secs(5));
        evt.set_method("GET");
        evt.set_path(path);
        evt
    }

    #[tokio::test]
    async fn test_attach_and_match() {
        let store = store(fixture());
        let resolved = store
            .attach_event_context(&EventContext::new("dev", "shop", "prod"))
            .await
            .unwrap();
        assert_eq!(resolved.key, "shop-1_prod-1.1");

        let matcher = store.deployment_matcher(&resolved).await.unwrap();
        let mut evt = get("/cart/99");
        let route = matcher.match_event(&mut evt).unwrap();
        assert_eq!(route.component.name, "cart");
        assert_eq!(route.component.hash, CART_HASH);
        assert_eq!(evt.param("id"), Some(&Val::from("99")));
    }

    #[tokio::test]
    async fn test_deployment_matcher_cached_by_key() {
        let cache = fixture();
        let store = store(cache.clone());
        let ctx = EventContext::new("dev", "shop", "prod");

        let v1 = store.attach_event_context(&ctx).await.unwrap();
        let m1 = store.deployment_matcher(&v1).await.unwrap();

        cache.put_environment(environment(2, "basket"));
        let v2 = store.attach_event_context(&ctx).await.unwrap();
        assert_ne!(v1.key, v2.key);
        let m2 = store.deployment_matcher(&v2).await.unwrap();
        assert!(!Arc::ptr_eq(&m1, &m2));

        assert!(m2.match_event(&mut get("/cart/1")).is_none());
        assert!(m2.match_event(&mut get("/basket/1")).is_some());

        // The older entry is untouched while both are cached.
        let again = store.deployment_matcher(&v1).await.unwrap();
        assert!(Arc::ptr_eq(&m1, &again));
        assert!(again.match_event(&mut get("/cart/1")).is_some());
    }

    #[tokio::test]
    async fn test_context_errors() {
        let store = store(fixture());

        let err = store
            .attach_event_context(&EventContext::new("other", "shop", "prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidContext(_)));

        let err = store
            .attach_event_context(&EventContext::new("dev", "", "prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidContext(_)));

        let err = store
            .attach_event_context(&EventContext::new("dev", "missing", "prod"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_adapter_invalidates_context() {
        let cache = Arc::new(InMemoryResourceCache::new());
        cache.put_app_deployment(shop(1));
        cache.put_environment(environment(1, "cart"));
        cache.put_virtual_environment(VirtualEnvironment {
            name: "prod".into(),
            generation: 1,
            environment: "prod".into(),
            ..Default::default()
        });
        let store = store(cache);
        let err = store
            .attach_event_context(&EventContext::new("dev", "shop", "prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidContext(ref m) if m.contains("payments")));
    }

    #[tokio::test]
    async fn test_manifest_context_finds_release_deployment() {
        let store = store(fixture());
        let ctx = EventContext {
            platform: "dev".into(),
            virtual_env: "prod".into(),
            release_manifest: "rel-1".into(),
            ..Default::default()
        };
        let resolved = store.attach_event_context(&ctx).await.unwrap();
        assert_eq!(resolved.context.app_deployment, "shop");
        assert_eq!(resolved.key, "shop-1_prod-m1");

        let matcher = store.deployment_matcher(&resolved).await.unwrap();
        assert!(matcher.match_event(&mut get("/basket/7")).is_some());

        let stale = EventContext {
            release_manifest: "rel-0".into(),
            ..ctx
        };
        assert!(matches!(
            store.attach_event_context(&stale).await,
            Err(StoreError::InvalidContext(_))
        ));
    }

    #[tokio::test]
    async fn test_adapter_expansion() {
        let store = store(fixture());
        let resolved = store
            .attach_event_context(&EventContext::new("dev", "shop", "prod"))
            .await
            .unwrap();

        let adapter = store
            .adapter(&resolved, "payments", ComponentType::HttpAdapter)
            .await
            .unwrap();
        assert_eq!(adapter.url, "https://pay.internal/v1");
        assert_eq!(adapter.headers["Authorization"], "Bearer s3cret");

        let err = store
            .adapter(&resolved, "ledger", ComponentType::HttpAdapter)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UndeclaredDependency { .. }));

        let err = store
            .adapter(&resolved, "payments", ComponentType::Kubefox)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedAdapter(_)));
    }

    #[tokio::test]
    async fn test_component_registry() {
        let store = store(fixture());
        store.open().await.unwrap();

        let cart = Component::new("cart", CART_HASH).with_id("r1");
        let def = store.component_def(&cart).unwrap();
        assert_eq!(def.component_type, ComponentType::Kubefox);
        assert!(store
            .component_def(&Component::new("cart", "ffffffffff"))
            .is_none());

        let http_srv = Component::new("http-srv", HTTP_SRV_HASH).with_id("h1");
        assert!(store.is_genesis_adapter(&http_srv));
        assert!(!store.is_genesis_adapter(&cart));
    }

    #[tokio::test]
    async fn test_release_matcher_uses_manifest_data() {
        let store = store(fixture());
        store.open().await.unwrap();

        let matcher = store.release_matcher().await.unwrap();
        assert_eq!(matcher.len(), 1);
        let mut evt = get("/basket/5");
        let route = matcher.match_event(&mut evt).unwrap();
        let ctx = route.event_context.as_ref().unwrap();
        assert_eq!(ctx.release_manifest, "rel-1");
        assert_eq!(ctx.app_deployment, "shop");

        // No rebuild without a change.
        assert!(Arc::ptr_eq(&matcher, &store.release_matcher().await.unwrap()));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_matcher() {
        let cache = Arc::new(ListFailingCache::new(fixture()));
        let store = RouteStore::with_resources(StoreConfig::default(), cache.clone());
        let before = store.release_matcher().await.unwrap();

        cache.fail_lists.store(true, Ordering::SeqCst);
        store.invalidate();
        let after = store.release_matcher().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        cache.fail_lists.store(false, Ordering::SeqCst);
        cache.inner.put_app_deployment(shop(2));
        store.invalidate();
        let rebuilt = store.release_matcher().await.unwrap();
        assert!(!Arc::ptr_eq(&before, &rebuilt));
    }

    #[tokio::test]
    async fn test_first_build_failure_is_reported() {
        let cache = Arc::new(ListFailingCache::new(fixture()));
        cache.fail_lists.store(true, Ordering::SeqCst);
        let store = RouteStore::with_resources(StoreConfig::default(), cache);
        assert!(matches!(
            store.release_matcher().await.unwrap_err(),
            StoreError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_release_is_skipped() {
        let cache = fixture();
        cache.put_environment(Environment {
            name: "staging".into(),
            generation: 1,
            data: EnvData::default(),
        });
        cache.put_virtual_environment(VirtualEnvironment {
            name: "staging".into(),
            generation: 1,
            environment: "staging".into(),
            release: Some(ActiveRelease {
                app_deployment: "ghost".into(),
                release_manifest: "rel-ghost".into(),
            }),
            available: true,
            ..Default::default()
        });
        let store = store(cache);

        store.open().await.unwrap();
        let matcher = store.release_matcher().await.unwrap();
        assert_eq!(matcher.len(), 1);

        let mut evt = get("/basket/7");
        let route = matcher.match_event(&mut evt).unwrap();
        assert_eq!(route.component.name, "cart");
    }

    #[tokio::test]
    async fn test_watcher_rebuilds_on_change() {
        let cache = fixture();
        let store = Arc::new(store(cache.clone()));
        store.open().await.unwrap();
        let shutdown = CancellationToken::new();
        let handle = store.spawn_watcher(shutdown.clone());

        let mut dep = shop(2);
        dep.components.insert(
            "search".to_string(),
            ComponentDefinition {
                hash: "5555555555555".into(),
                routes: vec![RouteSpec {
                    id: 0,
                    rule: r#"PathPrefix("/search")"#.into(),
                    priority: None,
                }],
                ..Default::default()
            },
        );
        cache.put_app_deployment(dep);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if store
                .component_def(&Component::new("search", "5555555555555"))
                .is_some()
            {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "watcher never rebuilt");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.release_matcher().await.unwrap().len(), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let config = StoreConfig {
            deployment_ttl: Duration::from_millis(10),
            ..Default::default()
        };
        let store = RouteStore::with_resources(config, fixture());
        let resolved = store
            .attach_event_context(&EventContext::new("dev", "shop", "prod"))
            .await
            .unwrap();
        store.deployment_matcher(&resolved).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        // matcher + validation entry
        assert_eq!(store.purge_expired().await, 2);
    }
}
