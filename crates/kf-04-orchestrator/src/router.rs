//! # Routing pipeline
//!
//! ```text
//! LiveEvent ──→ validate ──→ find target ──→ select path ──→ deliver
//!    │              │             │                │
//!    └ checkpoint   └ TTL > 0     └ checkpoint     └ checkpoint
//! ```
//!
//! ## Finding the target
//!
//! | Event | Resolution |
//! |-------|------------|
//! | complete target | direct address, no matching |
//! | context + adapter target | declared dependency adapter, url expanded |
//! | context | deployment matcher; name-only target falls back to the default route |
//! | no context | genesis event from an ingress adapter; release matcher |
//!
//! Afterwards the target and the source must both belong to the resolved
//! deployment, or be a platform ingress adapter.
//!
//! ## Delivery
//!
//! | Condition | Path |
//! |-----------|------|
//! | adapter target | `AdapterClient` |
//! | local replica subscription | replica |
//! | local group subscription | group |
//! | not from the transport, target on another broker | publish to `target.subject()` |
//! | from the transport, first delivery, not pinned to a replica | republish to the group subject once |
//! | otherwise | `ComponentGone` |

use crate::domain::{LiveEvent, Receiver};
use crate::ports::{AdapterClient, DurablePublisher, EventRouter};
use async_trait::async_trait;
use kf_01_rule_matcher::Route;
use kf_02_route_store::{ResolvedContext, RouteLookup};
use kf_03_subscriptions::SubscriptionRegistry;
use kf_telemetry::{BrokerMetrics, PropagatedContext, TraceContext, OUTCOME_OK};
use shared_types::{
    BrokerError, BrokerResult, Category, Component, ComponentType, ErrorKind, DEFAULT_ROUTE_ID,
};
use std::sync::Arc;
use tracing::{debug, field, info_span, trace, Instrument, Span};

/// Identity of the broker doing the routing.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub platform: String,
    /// This broker; its `id` is the local broker id.
    pub broker: Component,
}

impl RouterConfig {
    pub fn new(platform: impl Into<String>, broker_id: &str, broker_hash: &str) -> Self {
        Self {
            platform: platform.into(),
            broker: Component::new("broker", broker_hash)
                .with_type(ComponentType::Broker)
                .with_id(broker_id)
                .with_broker(broker_id),
        }
    }

    pub fn broker_id(&self) -> &str {
        &self.broker.id
    }
}

pub struct Router {
    config: RouterConfig,
    store: Arc<dyn RouteLookup>,
    registry: SubscriptionRegistry,
    publisher: Arc<dyn DurablePublisher>,
    adapters: Option<Arc<dyn AdapterClient>>,
    metrics: Option<Arc<BrokerMetrics>>,
}

impl Router {
    pub fn new(
        config: RouterConfig,
        store: Arc<dyn RouteLookup>,
        registry: SubscriptionRegistry,
        publisher: Arc<dyn DurablePublisher>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            publisher,
            adapters: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_adapter_client(mut self, client: Arc<dyn AdapterClient>) -> Self {
        self.adapters = Some(client);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<BrokerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn broker_id(&self) -> &str {
        self.config.broker_id()
    }

    async fn run(&self, live: &mut LiveEvent) -> BrokerResult<()> {
        live.checkpoint()?;
        self.validate(live)?;

        self.find_target(live)
            .instrument(info_span!("find_target"))
            .await?;
        live.checkpoint()?;

        let span = Span::current();
        if let Some(target) = &live.event.target {
            span.record("target", field::display(target));
        }
        debug!(route_id = ?live.route_id, "Matched event to target");

        let send_span = info_span!("send");
        self.deliver(live).instrument(send_span).await
    }

    fn validate(&self, live: &mut LiveEvent) -> BrokerResult<()> {
        if live.ttl().is_zero() {
            return Err(BrokerError::timeout());
        }

        let evt = &live.event;
        if !evt.source.as_ref().is_some_and(Component::is_complete) {
            return Err(BrokerError::invalid("event source is invalid"));
        }
        if evt.category == Category::Response
            && !evt.target.as_ref().is_some_and(Component::is_complete)
        {
            return Err(BrokerError::invalid(
                "response target is missing required attribute",
            ));
        }

        match live.receiver {
            Receiver::DurableTransport => {
                if let Some(target) = &evt.target {
                    if !target.broker_id.is_empty() && target.broker_id != self.broker_id() {
                        return Err(BrokerError::broker_mismatch(format!(
                            "event target broker id is {}",
                            target.broker_id
                        )));
                    }
                }
            }
            Receiver::GrpcServer => {
                if let Some(target) = &evt.target {
                    if !target.is_complete() && !target.is_name_only() {
                        return Err(BrokerError::invalid("event target is invalid"));
                    }
                }
                let valid_ctx = evt.context.as_ref().is_some_and(|ctx| {
                    ctx.platform == self.config.platform && ctx.is_well_formed()
                });
                if !valid_ctx {
                    return Err(BrokerError::invalid("event context is invalid"));
                }
            }
            Receiver::HttpServer | Receiver::HttpClient => {}
        }
        Ok(())
    }

    async fn find_target(&self, live: &mut LiveEvent) -> BrokerResult<()> {
        let direct = live
            .event
            .target
            .as_ref()
            .is_some_and(Component::is_complete);

        if live.event.has_context() {
            let resolved = self.attach(live).await?;

            if let Some(target) = live.event.target.clone() {
                if direct {
                    trace!(target = %target, "Direct address");
                    self.check_member(&resolved, &target)?;
                    if let Some(source) = &live.event.source {
                        self.check_member(&resolved, source)?;
                    }
                    return Ok(());
                }
                if target.component_type.is_adapter() {
                    let adapter = self
                        .store
                        .adapter(&resolved, &target.name, target.component_type)
                        .await?;
                    live.target_adapter = Some(adapter);
                    return Ok(());
                }
            }

            let matcher = self.store.deployment_matcher(&resolved).await?;
            match matcher.match_event(&mut live.event) {
                Some(route) => set_route(live, &route),
                None => self.default_route(live, &resolved)?,
            }
        } else {
            if live.event.target.is_some() {
                return Err(BrokerError::invalid("genesis event target is set"));
            }
            let from_ingress = live
                .event
                .source
                .as_ref()
                .is_some_and(|s| self.store.is_genesis_adapter(s));
            if !from_ingress {
                return Err(BrokerError::invalid(
                    "genesis event source is not a genesis adapter",
                ));
            }

            let matcher = self.store.release_matcher().await?;
            let route = matcher
                .match_event(&mut live.event)
                .ok_or_else(BrokerError::route_not_found)?;
            set_route(live, &route);
            self.attach(live).await?;
        }

        let resolved = live
            .resolved
            .clone()
            .ok_or_else(|| BrokerError::unexpected("routed event has no resolved context"))?;
        if let Some(target) = &live.event.target {
            self.check_member(&resolved, target)?;
        }
        if let Some(source) = &live.event.source {
            self.check_member(&resolved, source)?;
        }
        Ok(())
    }

    async fn attach(&self, live: &mut LiveEvent) -> BrokerResult<ResolvedContext> {
        let ctx = live
            .event
            .context
            .clone()
            .ok_or_else(|| BrokerError::invalid("event context is missing"))?;
        let resolved = self.store.attach_event_context(&ctx).await?;
        live.resolved = Some(resolved.clone());
        Ok(resolved)
    }

    /// No route matched. A kubefox target named directly still gets the
    /// event, with its version taken from the deployment.
    fn default_route(&self, live: &mut LiveEvent, resolved: &ResolvedContext) -> BrokerResult<()> {
        let Some(target) = live.event.target.as_mut() else {
            return Err(BrokerError::route_not_found());
        };
        if target.component_type != ComponentType::Kubefox {
            return Err(BrokerError::route_not_found());
        }

        if target.hash.is_empty() || target.app.is_empty() {
            let def = resolved.app_deployment.definition(target)?;
            target.hash = def.hash.clone();
            target.app = resolved.app_deployment.app_name.clone();
        }
        live.route_id = Some(DEFAULT_ROUTE_ID);
        Ok(())
    }

    /// `component` is declared by the deployment, or is an ingress adapter.
    fn check_member(&self, resolved: &ResolvedContext, component: &Component) -> BrokerResult<()> {
        match resolved.app_deployment.definition(component) {
            Ok(_) => Ok(()),
            Err(_) if self.store.is_genesis_adapter(component) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn deliver(&self, live: &mut LiveEvent) -> BrokerResult<()> {
        if let Some(adapter) = live.target_adapter.clone() {
            let client = self.adapters.as_ref().ok_or_else(|| {
                BrokerError::new(
                    ErrorKind::UnsupportedAdapter,
                    format!("no client for {} adapters", adapter.component_type.as_str()),
                )
            })?;
            live.checkpoint()?;
            stamp_span(live);
            debug!(adapter = %adapter.name, "Sending event to adapter");
            return client.send(&adapter, live).await;
        }

        let target = live
            .event
            .target
            .clone()
            .ok_or_else(|| BrokerError::invalid("event target is missing"))?;

        if let Some(sub) = self.registry.replica(&target) {
            live.subscription = Some(Arc::clone(&sub));
            let declared = sub
                .definition()
                .map(|def| def.env_vars.clone())
                .unwrap_or_default();
            live.checkpoint()?;
            stamp_span(live);
            debug!("Subscription found, sending event to replica");
            return Ok(sub.send_event(live.matched_event(&declared)).await?);
        }

        if let Some(group) = self.registry.group(&target) {
            let declared = self
                .store
                .component_def(&target)
                .map(|def| def.env_vars.clone())
                .unwrap_or_default();
            live.checkpoint()?;
            stamp_span(live);
            debug!(group = %group.key(), "Sending event to group");
            return Ok(group.send_event(live.matched_event(&declared)).await?);
        }

        if live.receiver != Receiver::DurableTransport && target.broker_id != self.broker_id() {
            live.checkpoint()?;
            stamp_span(live);
            let subject = target.subject();
            debug!(subject = %subject, "Subscription not found, publishing to durable transport");
            return self.publisher.publish(&subject, &live.event).await;
        }

        if live.receiver == Receiver::DurableTransport && !live.redelivery && target.id.is_empty() {
            live.checkpoint()?;
            let subject = target.group_subject();
            debug!(subject = %subject, "Group gone locally, republishing once");
            return self.publisher.republish(&subject, &live.event).await;
        }

        Err(BrokerError::component_gone(format!(
            "no delivery path to {target}"
        )))
    }
}

fn set_route(live: &mut LiveEvent, route: &Route) {
    live.route_id = Some(route.id);
    live.event.target = Some(route.component.clone());
    if let Some(ctx) = &route.event_context {
        live.event.context = Some(ctx.clone());
    }
}

/// Carry the current span on the event so the next hop joins the trace.
fn stamp_span(live: &mut LiveEvent) {
    let current = TraceContext::from_span(&Span::current());
    if current.is_valid() {
        live.event.span = Some(current.to_propagated().into());
    }
}

#[async_trait]
impl EventRouter for Router {
    async fn route(&self, live: &mut LiveEvent) -> BrokerResult<()> {
        let span = info_span!(
            "route_event",
            event_id = %live.event.id,
            event_type = %live.event.event_type,
            receiver = %live.receiver,
            source = field::Empty,
            target = field::Empty,
            outcome = field::Empty,
        );
        if let Some(source) = &live.event.source {
            span.record("source", field::display(source));
        }
        let parent = PropagatedContext::from_event(&live.event);
        if parent.is_valid() {
            parent.to_context().attach_to(&span);
        }

        let _timer = self.metrics.as_ref().map(|m| m.routing_timer());
        let result = self.run(live).instrument(span.clone()).await;

        let outcome = match &result {
            Ok(()) => OUTCOME_OK,
            Err(e) => e.kind().code(),
        };
        span.record("outcome", outcome);
        if let Some(metrics) = &self.metrics {
            metrics.record_routed(outcome);
        }
        result
    }
}
