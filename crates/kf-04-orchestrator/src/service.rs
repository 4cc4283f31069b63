//! # Broker Service
//!
//! Owns the intake queue and everything a worker needs to route an event.
//!
//! ```text
//! receivers ──recv_event──→ IntakeQueue ──→ run_worker × N ──→ Router
//!     ▲                                           │
//!     │ EventToken (outcome)                      ├─ ok  ──→ archiver
//!     └───────────────────────────────────────────┴─ err ──→ log at kind's level
//! ```
//!
//! Every event carries an `EventToken` whose deadline is its TTL at
//! receipt. Routing races the deadline; whichever finishes first resolves
//! the token and the other is dropped.

use crate::adapters::TransportPublisher;
use crate::domain::{
    expected_service_account, service_account_name, ComponentMeta, EventToken, LiveEvent,
    Receiver,
};
use crate::ports::{AdapterClient, EventRouter, TokenVerifier};
use crate::router::{Router, RouterConfig};
use async_trait::async_trait;
use kf_02_route_store::RouteLookup;
use kf_03_subscriptions::{EventSink, ReplicaSubscription, SubscriptionConf, SubscriptionRegistry};
use kf_05_durable_transport::{consumer_name, DurableTransport, ReceivedEvent, TransportListener};
use kf_telemetry::BrokerMetrics;
use shared_bus::{EventIntake, IntakeError, IntakeQueue, DEFAULT_INTAKE_CAPACITY};
use shared_types::{BrokerError, BrokerResult, Component, Event};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

/// Collaborators the service routes with.
pub struct ServiceDeps {
    pub store: Arc<dyn RouteLookup>,
    pub registry: SubscriptionRegistry,
    pub transport: Arc<dyn DurableTransport>,
    pub verifier: Arc<dyn TokenVerifier>,
}

pub struct ServiceOptions {
    pub intake_capacity: usize,
    pub metrics: Option<Arc<BrokerMetrics>>,
    /// Routed events are offered here without waiting.
    pub archiver: Option<mpsc::Sender<Event>>,
    pub adapter_client: Option<Arc<dyn AdapterClient>>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            metrics: None,
            archiver: None,
            adapter_client: None,
        }
    }
}

pub struct BrokerService {
    config: RouterConfig,
    router: Router,
    store: Arc<dyn RouteLookup>,
    registry: SubscriptionRegistry,
    transport: Arc<dyn DurableTransport>,
    verifier: Arc<dyn TokenVerifier>,
    intake: IntakeQueue<LiveEvent>,
    metrics: Option<Arc<BrokerMetrics>>,
    archiver: Option<mpsc::Sender<Event>>,
}

impl BrokerService {
    pub fn new(config: RouterConfig, deps: ServiceDeps, opts: ServiceOptions) -> Self {
        let publisher = Arc::new(TransportPublisher::new(Arc::clone(&deps.transport)));
        let mut router = Router::new(
            config.clone(),
            Arc::clone(&deps.store),
            deps.registry.clone(),
            publisher,
        );
        if let Some(client) = opts.adapter_client {
            router = router.with_adapter_client(client);
        }
        if let Some(metrics) = &opts.metrics {
            router = router.with_metrics(Arc::clone(metrics));
        }

        Self {
            config,
            router,
            store: deps.store,
            registry: deps.registry,
            transport: deps.transport,
            verifier: deps.verifier,
            intake: IntakeQueue::with_capacity(opts.intake_capacity),
            metrics: opts.metrics,
            archiver: opts.archiver,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn intake_depth(&self) -> usize {
        self.intake.depth()
    }

    /// Queue an event for routing. The returned token resolves with the
    /// routing outcome, or with a timeout once the TTL runs out.
    pub async fn recv_event(&self, mut live: LiveEvent) -> BrokerResult<EventToken> {
        if let Some(metrics) = &self.metrics {
            metrics.record_received(live.receiver.as_str());
        }
        live.checkpoint()?;

        let token = live.token.clone();
        let pushed = tokio::time::timeout_at(token.deadline(), self.intake.push(live)).await;
        match pushed {
            Ok(Ok(())) => {}
            Ok(Err(IntakeError::Closed)) => {
                return Err(BrokerError::broker_unavailable("broker shutting down"));
            }
            Ok(Err(IntakeError::Full { .. })) | Err(_) => return Err(BrokerError::timeout()),
        }
        self.update_depth();
        Ok(token)
    }

    /// Queue an event and wait for its routing outcome.
    pub async fn send_and_wait(&self, event: Event, receiver: Receiver) -> BrokerResult<()> {
        let token = self.recv_event(LiveEvent::new(event, receiver)).await?;
        token.wait().await
    }

    /// Route events from the intake queue until shutdown.
    pub async fn run_worker(self: Arc<Self>, id: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker = id, "Worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.intake.pop() => next,
            };
            let Some(live) = next else {
                break;
            };
            self.update_depth();
            self.process(live).await;
        }
        info!(worker = id, "Worker stopped");
    }

    async fn process(&self, mut live: LiveEvent) {
        let token = live.token.clone();
        let result = tokio::select! {
            result = self.router.route(&mut live) => result,
            _ = token.cancelled() => Err(BrokerError::timeout()),
            _ = tokio::time::sleep_until(token.deadline()) => Err(BrokerError::timeout()),
        };

        match &result {
            Ok(()) => self.archive(&live.event),
            Err(e) => {
                let event_id = live.event.id.as_str();
                let receiver = live.receiver.as_str();
                let level = e.kind().log_level();
                if level == Level::ERROR {
                    error!(event_id, receiver, error = %e, "Routing failed");
                } else if level == Level::WARN {
                    warn!(event_id, receiver, error = %e, "Routing failed");
                } else {
                    debug!(event_id, receiver, error = %e, "Routing failed");
                }
            }
        }
        token.resolve(result);
    }

    fn archive(&self, event: &Event) {
        let Some(archiver) = &self.archiver else {
            return;
        };
        match archiver.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(evt)) => {
                warn!(event_id = %evt.id, "Archive queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn update_depth(&self) {
        if let Some(metrics) = &self.metrics {
            metrics
                .intake_queue_depth
                .set(i64::try_from(self.intake.depth()).unwrap_or(i64::MAX));
        }
    }

    /// Check that the presented token belongs to the component it claims
    /// to be, and that the component is deployed.
    pub async fn authorize_component(&self, meta: &ComponentMeta) -> BrokerResult<()> {
        if meta.platform != self.config.platform {
            return Err(BrokerError::unauthorized(format!(
                "component provided incorrect platform '{}'",
                meta.platform
            )));
        }

        let service_account = service_account_name(&meta.token)?;
        let expected = expected_service_account(&self.config.platform, &meta.component);
        if service_account != expected {
            return Err(BrokerError::unauthorized(format!(
                "ServiceAccount '{service_account}' does not match component '{}'",
                meta.component.name
            )));
        }

        let known = self.store.component_def(&meta.component).is_some_and(|def| {
            def.component_type == meta.component.component_type && def.hash == meta.component.hash
        });
        if !known {
            return Err(BrokerError::unauthorized(format!(
                "component '{}' not found",
                meta.component.group_key()
            )));
        }

        self.verifier.verify(&service_account, &meta.token).await
    }

    /// Authorize a replica and register its subscription. The replica is
    /// also reachable through the durable transport until `scope` or the
    /// subscription is canceled.
    pub async fn subscribe(
        self: &Arc<Self>,
        meta: &ComponentMeta,
        sink: Arc<dyn EventSink>,
        enable_group: bool,
        scope: &CancellationToken,
    ) -> BrokerResult<Arc<ReplicaSubscription>> {
        if let Err(e) = self.authorize_component(meta).await {
            warn!(component = %meta.component, pod = %meta.pod, error = %e, "Subscription refused");
            return Err(e);
        }

        let component = meta
            .component
            .clone()
            .with_broker(self.config.broker_id());
        let conf = SubscriptionConf {
            definition: self.store.component_def(&component),
            component: component.clone(),
            send: sink,
            enable_group,
        };
        let (sub, group) = self.registry.create(scope, conf)?;

        let listener: Arc<dyn TransportListener> = self.clone();
        let replica_subject = Component {
            broker_id: String::new(),
            ..component.clone()
        }
        .subject();
        let mut consumers = vec![(sub.child_token(), replica_subject)];
        if let Some(group) = &group {
            consumers.push((group.child_token(), component.group_subject()));
        }

        for (token, subject) in consumers {
            let name = consumer_name(&subject);
            if let Err(e) = self
                .transport
                .consume_events(token, &name, &subject, Arc::clone(&listener))
                .await
            {
                let err = BrokerError::from(e);
                self.registry.cancel(&component, Some(err.clone()));
                return Err(err);
            }
        }

        info!(component = %component, group = enable_group, "Component subscribed");
        Ok(sub)
    }

    /// Consume events addressed to this broker until `scope` is canceled.
    pub async fn start(self: &Arc<Self>, scope: CancellationToken) -> BrokerResult<()> {
        let subject = self.config.broker.broker_subject();
        let listener: Arc<dyn TransportListener> = self.clone();
        self.transport
            .consume_events(scope, &consumer_name(&subject), &subject, listener)
            .await?;
        info!(broker_id = %self.config.broker_id(), subject = %subject, "Broker consuming");
        Ok(())
    }

    /// Record every local replica, and this broker, in the components
    /// bucket.
    pub async fn register_components(&self) -> usize {
        let mut written = 0;
        let broker = std::iter::once(self.config.broker.clone());
        let replicas = self
            .registry
            .replicas()
            .into_iter()
            .map(|sub| sub.component().clone());
        for component in broker.chain(replicas) {
            match self.transport.put_component(&component).await {
                Ok(()) => written += 1,
                Err(e) => warn!(component = %component, error = %e, "Presence write failed"),
            }
        }
        written
    }

    /// Stop accepting events and end every subscription. Queued events
    /// are still routed by the workers.
    pub fn shutdown(&self) {
        self.intake.close();
        self.registry.close();
        info!(broker_id = %self.config.broker_id(), "Broker service shut down");
    }
}

#[async_trait]
impl TransportListener for BrokerService {
    async fn on_event(&self, received: ReceivedEvent) {
        let event_id = received.event.id.clone();
        let live = LiveEvent::new(received.event, Receiver::DurableTransport)
            .with_redelivery(received.redelivery);
        if let Err(e) = self.recv_event(live).await {
            debug!(event_id = %event_id, subject = %received.subject, error = %e, "Dropping transport event");
        }
    }
}
