//! Shared fixtures: a `dev` platform running the `shop` app, ServiceAccount
//! tokens, and brokers wired over a shared transport.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use kf_02_route_store::{InMemoryResourceCache, RouteStore, StoreConfig};
use kf_03_subscriptions::{ChannelSink, SubscriptionRegistry};
use kf_04_orchestrator::{
    BrokerService, ComponentMeta, RouterConfig, ServiceDeps, ServiceOptions, StaticTokenVerifier,
};
use kf_05_durable_transport::DurableTransport;
use shared_types::{
    event_type, ActiveRelease, AppDeployment, Category, Component, ComponentDefinition,
    ComponentType, EnvData, Environment, Event, EventContext, MatchedEvent, Platform,
    ReleaseManifest, RouteSpec, VirtualEnvironment,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub const PLATFORM: &str = "dev";
pub const CART_HASH: &str = "0123456789abc";
pub const CHECKOUT_HASH: &str = "abcdef0123456";
pub const HTTP_SRV_HASH: &str = "fedcba9876543";

pub fn shop_deployment(generation: i64) -> AppDeployment {
    AppDeployment {
        name: "shop".into(),
        generation,
        app_name: "shop-app".into(),
        components: BTreeMap::from([
            (
                "cart".to_string(),
                ComponentDefinition {
                    hash: CART_HASH.into(),
                    routes: vec![RouteSpec {
                        id: 0,
                        rule: r#"Method("GET") && Path("/{{.Vars.base}}/{id}")"#.into(),
                        priority: None,
                    }],
                    env_vars: vec!["region".into()],
                    ..Default::default()
                },
            ),
            (
                "checkout".to_string(),
                ComponentDefinition {
                    hash: CHECKOUT_HASH.into(),
                    routes: vec![RouteSpec {
                        id: 0,
                        rule: r#"Method("POST") && PathPrefix("/{{.Vars.base}}")"#.into(),
                        priority: None,
                    }],
                    ..Default::default()
                },
            ),
        ]),
        ..Default::default()
    }
}

pub fn environment(generation: i64, base: &str) -> Environment {
    Environment {
        name: "prod".into(),
        generation,
        data: EnvData::default()
            .with_var("base", base)
            .with_var("region", "eu"),
    }
}

pub fn release_manifest(generation: i64, base: &str) -> ReleaseManifest {
    ReleaseManifest {
        name: "rel-1".into(),
        generation,
        virtual_env: "prod".into(),
        data: EnvData::default()
            .with_var("base", base)
            .with_var("region", "us"),
    }
}

/// Platform with an HTTP ingress, the `shop` app deployed to `prod`, and
/// release `rel-1` active there.
pub fn resources() -> Arc<InMemoryResourceCache> {
    let cache = Arc::new(InMemoryResourceCache::new());
    cache.set_platform(Platform {
        name: PLATFORM.into(),
        components: vec![http_srv_version()],
    });
    cache.put_app_deployment(shop_deployment(1));
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
    cache.put_release_manifest(release_manifest(1, "cart"));
    cache
}

fn http_srv_version() -> Component {
    Component::new("http-srv", HTTP_SRV_HASH).with_type(ComponentType::HttpAdapter)
}

/// Ingress replica `h1` connected to `broker_id`.
pub fn http_srv(broker_id: &str) -> Component {
    http_srv_version().with_id("h1").with_broker(broker_id)
}

pub fn shop_context() -> EventContext {
    EventContext::new(PLATFORM, "shop", "prod")
}

/// HTTP request as the ingress adapter on `broker_id` hands it over.
pub fn ingress(broker_id: &str, method: &str, path: &str) -> Event {
    let mut evt = Event::new(Category::Request, event_type::HTTP, Duration::from_secs(5));
    evt.set_method(method);
    evt.set_path(path);
    evt.source = Some(http_srv(broker_id));
    evt
}

/// Unsigned token carrying `sa` as its ServiceAccount name.
pub fn token_for(sa: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "kubernetes.io": { "serviceaccount": { "name": sa } }
    });
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{claims}.c2ln")
}

/// Credentials a correctly deployed replica presents.
pub fn meta_for(component: Component) -> ComponentMeta {
    let sa = component.group_key();
    ComponentMeta {
        platform: PLATFORM.into(),
        component,
        pod: "shop-pod-0".into(),
        token: token_for(&sa),
    }
}

/// A broker with one worker, consuming its own subject.
pub struct TestBroker {
    pub service: Arc<BrokerService>,
    pub scope: CancellationToken,
    _shutdown: watch::Sender<bool>,
}

impl TestBroker {
    pub async fn start(
        id: &str,
        resources: Arc<InMemoryResourceCache>,
        transport: Arc<dyn DurableTransport>,
    ) -> Self {
        let store = Arc::new(RouteStore::with_resources(
            StoreConfig {
                platform: PLATFORM.into(),
                ..Default::default()
            },
            resources,
        ));
        store.open().await.expect("route store opens");
        let scope = CancellationToken::new();
        store.spawn_watcher(scope.child_token());

        let service = Arc::new(BrokerService::new(
            RouterConfig::new(PLATFORM, id, "4444444444444"),
            ServiceDeps {
                store,
                registry: SubscriptionRegistry::new(),
                transport,
                verifier: Arc::new(StaticTokenVerifier::accepting()),
            },
            ServiceOptions::default(),
        ));
        service
            .start(scope.child_token())
            .await
            .expect("broker consumes its subject");

        let (shutdown, rx) = watch::channel(false);
        tokio::spawn(Arc::clone(&service).run_worker(0, rx));
        Self {
            service,
            scope,
            _shutdown: shutdown,
        }
    }

    /// Connect replica `id` of `name`, optionally as a group member.
    pub async fn connect(
        &self,
        name: &str,
        hash: &str,
        id: &str,
        enable_group: bool,
    ) -> mpsc::Receiver<MatchedEvent> {
        let (sink, rx) = ChannelSink::new(16);
        self.service
            .subscribe(
                &meta_for(Component::new(name, hash).with_id(id)),
                Arc::new(sink),
                enable_group,
                &self.scope,
            )
            .await
            .expect("replica subscribes");
        rx
    }
}

/// Next delivery, failing the test after one second.
pub async fn next_delivery(rx: &mut mpsc::Receiver<MatchedEvent>) -> MatchedEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("delivery within 1s")
        .expect("sink open")
}
