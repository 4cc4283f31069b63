//! # Broker Wiring
//!
//! Builds the broker from its configuration and runs its tasks.
//!
//! ```text
//!  DurableTransport ──→ BrokerService ──→ IntakeQueue ──→ workers × N
//!         ▲                  │                               │
//!         │                  └── archive queue ──→ archiver ─┤ record_event
//!         │                                                   │
//!         └──── registrar (presence, cache purge) ◄── tick ───┘
//! ```
//!
//! Shutdown: stop intake, end subscriptions, signal every task, wait up
//! to `shutdown_timeout`, then close the transport.

use crate::container::{BrokerConfig, TransportConfig, TransportKind};
use crate::error::RuntimeError;
use kf_02_route_store::{InMemoryResourceCache, ResourceCache, RouteStore};
use kf_03_subscriptions::SubscriptionRegistry;
use kf_04_orchestrator::{
    BrokerService, Receiver, RouterConfig, ServiceDeps, ServiceOptions, StaticTokenVerifier,
    TokenVerifier,
};
#[cfg(feature = "jetstream")]
use kf_05_durable_transport::JetStreamTransport;
use kf_05_durable_transport::{DurableTransport, InMemoryTransport};
use kf_telemetry::BrokerMetrics;
use shared_types::event::duration_to_micros;
use shared_types::{BrokerResult, Event, Platform};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Routed events waiting to be archived.
pub const ARCHIVE_QUEUE_CAPACITY: usize = 1024;

/// Presence refresh and cache purge period.
pub const REGISTRAR_INTERVAL: Duration = Duration::from_secs(30);

/// Externally provided collaborators.
pub struct RuntimeParts {
    pub transport: Arc<dyn DurableTransport>,
    pub resources: Arc<dyn ResourceCache>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// A running broker.
pub struct BrokerRuntime {
    config: BrokerConfig,
    service: Arc<BrokerService>,
    store: Arc<RouteStore>,
    transport: Arc<dyn DurableTransport>,
    metrics: Arc<BrokerMetrics>,
    /// Parent of every consumer and watcher the runtime starts.
    scope: CancellationToken,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    archive_rx: Option<mpsc::Receiver<Event>>,
    registrar_interval: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl BrokerRuntime {
    /// Connect the configured transport, load resources and build the
    /// broker.
    pub async fn build(
        config: BrokerConfig,
        metrics: Arc<BrokerMetrics>,
    ) -> Result<Self, RuntimeError> {
        let transport = connect_transport(&config.transport).await?;
        let resources = load_resources(&config)?;
        // TODO: swap for a TokenReview client once a Kubernetes API client is wired in.
        let verifier = Arc::new(StaticTokenVerifier::accepting());
        Self::assemble(
            config,
            RuntimeParts {
                transport,
                resources,
                verifier,
            },
            metrics,
        )
        .await
    }

    pub async fn assemble(
        config: BrokerConfig,
        parts: RuntimeParts,
        metrics: Arc<BrokerMetrics>,
    ) -> Result<Self, RuntimeError> {
        let store = Arc::new(RouteStore::with_resources(
            config.store_config(),
            parts.resources,
        ));
        store.open().await?;

        let (archiver, archive_rx) = mpsc::channel(ARCHIVE_QUEUE_CAPACITY);
        let service = Arc::new(BrokerService::new(
            RouterConfig::new(
                config.broker.platform.clone(),
                &config.broker.id,
                &config.broker.hash,
            ),
            ServiceDeps {
                store: store.clone(),
                registry: SubscriptionRegistry::with_metrics(Arc::clone(&metrics)),
                transport: Arc::clone(&parts.transport),
                verifier: parts.verifier,
            },
            ServiceOptions {
                intake_capacity: config.workers.intake_capacity,
                metrics: Some(Arc::clone(&metrics)),
                archiver: Some(archiver),
                adapter_client: None,
            },
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            service,
            store,
            transport: parts.transport,
            metrics,
            scope: CancellationToken::new(),
            shutdown_tx,
            shutdown_rx,
            archive_rx: Some(archive_rx),
            registrar_interval: REGISTRAR_INTERVAL,
            tasks: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_registrar_interval(mut self, interval: Duration) -> Self {
        self.registrar_interval = interval;
        self
    }

    /// Start consuming, then spawn the workers and background tasks.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        self.service.start(self.scope.child_token()).await?;
        self.tasks
            .push(self.store.spawn_watcher(self.scope.child_token()));

        for id in 0..self.config.workers.count {
            let worker = Arc::clone(&self.service).run_worker(id, self.shutdown_rx.clone());
            self.tasks.push(tokio::spawn(worker));
        }

        if let Some(rx) = self.archive_rx.take() {
            self.tasks.push(tokio::spawn(run_archiver(
                rx,
                Arc::clone(&self.transport),
                self.shutdown_rx.clone(),
            )));
        }
        self.tasks.push(tokio::spawn(run_registrar(
            Arc::clone(&self.service),
            Arc::clone(&self.store),
            self.registrar_interval,
            self.shutdown_rx.clone(),
        )));

        info!(
            platform = %self.config.broker.platform,
            broker_id = %self.config.broker.id,
            workers = self.config.workers.count,
            transport = %self.config.transport.kind,
            "Broker started"
        );
        Ok(())
    }

    /// Hand an ingress event to the broker and wait for its outcome. HTTP
    /// requests without a TTL get the configured default.
    pub async fn accept(&self, mut event: Event, receiver: Receiver) -> BrokerResult<()> {
        if receiver == Receiver::HttpServer && event.ttl <= 0 {
            event.ttl = duration_to_micros(self.config.workers.default_ttl);
        }
        self.service.send_and_wait(event, receiver).await
    }

    pub fn service(&self) -> &Arc<BrokerService> {
        &self.service
    }

    pub fn transport(&self) -> &Arc<dyn DurableTransport> {
        &self.transport
    }

    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Stop the broker. Tasks still running after `shutdown_timeout` are
    /// aborted.
    pub async fn shutdown(mut self) {
        info!("Initiating graceful shutdown...");
        self.service.shutdown();
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        self.scope.cancel();

        let tasks = std::mem::take(&mut self.tasks);
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let count = tasks.len();
        match tokio::time::timeout(self.config.shutdown_timeout, futures::future::join_all(tasks))
            .await
        {
            Ok(_) => debug!(tasks = count, "Tasks stopped"),
            Err(_) => {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "Tasks still running at shutdown timeout, aborting"
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        self.transport.close().await;
        info!("Shutdown complete");
    }
}

async fn connect_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn DurableTransport>, RuntimeError> {
    match config.kind {
        TransportKind::Memory => Ok(Arc::new(InMemoryTransport::new())),
        #[cfg(feature = "jetstream")]
        TransportKind::JetStream => {
            let transport = JetStreamTransport::connect(&config.nats_addr).await?;
            Ok(Arc::new(transport))
        }
        #[cfg(not(feature = "jetstream"))]
        TransportKind::JetStream => Err(crate::container::ConfigError::Invalid(
            "jetstream transport is not compiled in".into(),
        )
        .into()),
    }
}

fn load_resources(config: &BrokerConfig) -> Result<Arc<InMemoryResourceCache>, RuntimeError> {
    let cache = match &config.store.resources_file {
        Some(path) => {
            let cache = InMemoryResourceCache::load_file(path)?;
            info!(path = %path.display(), "Loaded resource snapshot");
            cache
        }
        None => {
            let cache = InMemoryResourceCache::new();
            cache.set_platform(Platform {
                name: config.broker.platform.clone(),
                components: Vec::new(),
            });
            warn!("No resource snapshot configured, starting with an empty platform");
            cache
        }
    };
    Ok(Arc::new(cache))
}

/// Record routed events with the transport until shutdown, then drain
/// what is already queued.
async fn run_archiver(
    mut rx: mpsc::Receiver<Event>,
    transport: Arc<dyn DurableTransport>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let evt = tokio::select! {
            _ = shutdown.changed() => break,
            evt = rx.recv() => match evt {
                Some(evt) => evt,
                None => break,
            },
        };
        archive(transport.as_ref(), &evt).await;
    }
    while let Ok(evt) = rx.try_recv() {
        archive(transport.as_ref(), &evt).await;
    }
    debug!("Archiver stopped");
}

async fn archive(transport: &dyn DurableTransport, evt: &Event) {
    if let Err(e) = transport.record_event(evt).await {
        warn!(event_id = %evt.id, error = %e, "Failed to archive event");
    }
}

/// Refresh component presence and purge expired store entries every
/// `period`, starting immediately.
async fn run_registrar(
    service: Arc<BrokerService>,
    store: Arc<RouteStore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        let written = service.register_components().await;
        let purged = store.purge_expired().await;
        debug!(written, purged, "Registrar pass");
    }
    debug!("Registrar stopped");
}
