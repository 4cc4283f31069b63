//! An event in flight through the broker.
//!
//! Wraps the wire event with everything routing learns about it. The TTL
//! clock lives here: every checkpoint charges the time since the previous
//! one, so the budget only ever shrinks.

use super::token::EventToken;
use kf_02_route_store::ResolvedContext;
use kf_03_subscriptions::ReplicaSubscription;
use kf_telemetry::receiver;
use shared_types::{Adapter, BrokerError, BrokerResult, Event, MatchedEvent, Val, DEFAULT_ROUTE_ID};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where an event entered the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    DurableTransport,
    GrpcServer,
    HttpServer,
    HttpClient,
}

impl Receiver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DurableTransport => receiver::DURABLE_TRANSPORT,
            Self::GrpcServer => receiver::GRPC_SERVER,
            Self::HttpServer => receiver::HTTP_SERVER,
            Self::HttpClient => receiver::HTTP_CLIENT,
        }
    }
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct LiveEvent {
    pub event: Event,
    pub receiver: Receiver,
    pub received_at: Instant,
    /// Last TTL checkpoint.
    tick: Instant,
    pub token: EventToken,
    pub route_id: Option<i64>,
    pub resolved: Option<ResolvedContext>,
    pub target_adapter: Option<Adapter>,
    pub subscription: Option<Arc<ReplicaSubscription>>,
    /// Second delivery from the durable transport.
    pub redelivery: bool,
}

impl LiveEvent {
    pub fn new(event: Event, receiver: Receiver) -> Self {
        let now = Instant::now();
        let token = EventToken::new(event.ttl());
        Self {
            event,
            receiver,
            received_at: now,
            tick: now,
            token,
            route_id: None,
            resolved: None,
            target_adapter: None,
            subscription: None,
            redelivery: false,
        }
    }

    #[must_use]
    pub fn with_redelivery(mut self, redelivery: bool) -> Self {
        self.redelivery = redelivery;
        self
    }

    /// Remaining budget after charging the time since the last checkpoint.
    pub fn ttl(&mut self) -> Duration {
        let now = Instant::now();
        self.event.charge(now.saturating_duration_since(self.tick));
        self.tick = now;
        self.event.ttl()
    }

    /// Charge elapsed time and fail once the budget is spent.
    pub fn checkpoint(&mut self) -> BrokerResult<()> {
        self.ttl();
        if self.event.is_expired() {
            Err(BrokerError::timeout())
        } else {
            Ok(())
        }
    }

    /// Remaining budget in microseconds, without charging.
    pub fn remaining_micros(&self) -> i64 {
        self.event.ttl
    }

    /// Event as handed to the target, with the subset of resolved Vars
    /// named in `declared`.
    pub fn matched_event(&self, declared: &[String]) -> MatchedEvent {
        let env: BTreeMap<String, Val> = match &self.resolved {
            Some(resolved) => declared
                .iter()
                .filter_map(|name| {
                    resolved
                        .data
                        .vars
                        .get(name)
                        .map(|v| (name.clone(), v.clone()))
                })
                .collect(),
            None => BTreeMap::new(),
        };

        MatchedEvent {
            event: self.event.clone(),
            route_id: self.route_id.unwrap_or(DEFAULT_ROUTE_ID),
            env,
        }
    }
}

impl fmt::Debug for LiveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveEvent")
            .field("event_id", &self.event.id)
            .field("receiver", &self.receiver)
            .field("ttl", &self.event.ttl)
            .field("route_id", &self.route_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::{event_type, AppDeployment, Category, EnvData, ErrorKind, EventContext};

    fn request(ttl: Duration) -> Event {
        Event::new(Category::Request, event_type::HTTP, ttl)
    }

    #[test]
    fn test_checkpoint_fails_once_expired() {
        let mut live = LiveEvent::new(request(Duration::from_micros(1)), Receiver::GrpcServer);
        std::thread::sleep(Duration::from_millis(2));
        let err = live.checkpoint().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(live.remaining_micros() <= 0);
    }

    #[test]
    fn test_matched_event_carries_declared_vars_only() {
        let mut live = LiveEvent::new(request(Duration::from_secs(5)), Receiver::GrpcServer);
        live.route_id = Some(3);
        live.resolved = Some(ResolvedContext {
            context: EventContext::new("dev", "shop", "prod"),
            app_deployment: Arc::new(AppDeployment::default()),
            data: Arc::new(
                EnvData::default()
                    .with_var("region", "eu")
                    .with_var("dbPass", "hidden"),
            ),
            key: "shop-1_prod-1.1".into(),
        });

        let matched = live.matched_event(&["region".to_string(), "missing".to_string()]);
        assert_eq!(matched.route_id, 3);
        assert_eq!(matched.env.len(), 1);
        assert_eq!(matched.env.get("region"), Some(&Val::from("eu")));
    }

    #[test]
    fn test_unmatched_event_uses_default_route() {
        let live = LiveEvent::new(request(Duration::from_secs(5)), Receiver::DurableTransport);
        assert_eq!(live.matched_event(&[]).route_id, DEFAULT_ROUTE_ID);
        assert_eq!(live.receiver.to_string(), "durable-transport");
    }

    proptest! {
        #[test]
        fn prop_ttl_never_grows(
            ttl_micros in 1i64..50_000,
            pauses in proptest::collection::vec(0u64..300, 1..6),
        ) {
            let mut live = LiveEvent::new(
                request(Duration::from_micros(ttl_micros as u64)),
                Receiver::GrpcServer,
            );
            let mut before = live.remaining_micros();
            for pause in pauses {
                std::thread::sleep(Duration::from_micros(pause));
                let outcome = live.checkpoint();
                let after = live.remaining_micros();
                prop_assert!(after <= before);
                if after <= 0 {
                    prop_assert!(outcome.is_err());
                    break;
                }
                before = after;
            }
        }
    }
}
