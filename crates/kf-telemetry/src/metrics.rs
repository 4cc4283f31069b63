//! Prometheus metrics for the broker.
//!
//! All metrics follow the naming convention `kf_broker_<metric>_<unit>` and
//! live in a registry owned by `BrokerMetrics`; nothing is registered
//! globally, so tests can build as many instances as they like.

use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Instant;

use crate::TelemetryError;

/// Receiver label values.
pub mod receiver {
    pub const DURABLE_TRANSPORT: &str = "durable-transport";
    pub const GRPC_SERVER: &str = "grpc-server";
    pub const HTTP_SERVER: &str = "http-server";
    pub const HTTP_CLIENT: &str = "http-client";
}

/// Outcome label for a successfully routed event. Failures use the error
/// code.
pub const OUTCOME_OK: &str = "ok";

pub struct BrokerMetrics {
    registry: Registry,
    /// Events accepted from a receiver, by receiver kind.
    pub events_received: IntCounterVec,
    /// Routing outcomes, `ok` or the error code.
    pub events_routed: IntCounterVec,
    /// Time from dequeue to delivery outcome.
    pub routing_duration: Histogram,
    pub subscriptions_active: IntGauge,
    pub intake_queue_depth: IntGauge,
}

impl BrokerMetrics {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let init = |e: prometheus::Error| TelemetryError::MetricsInit(e.to_string());

        let events_received = IntCounterVec::new(
            Opts::new(
                "kf_broker_events_received_total",
                "Events accepted from a receiver",
            ),
            &["receiver"],
        )
        .map_err(init)?;

        let events_routed = IntCounterVec::new(
            Opts::new("kf_broker_events_routed_total", "Routing outcomes"),
            &["outcome"],
        )
        .map_err(init)?;

        let routing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "kf_broker_event_routing_duration_seconds",
                "Time spent routing one event",
            )
            .buckets(exponential_buckets(0.0001, 2.0, 16).map_err(init)?),
        )
        .map_err(init)?;

        let subscriptions_active = IntGauge::new(
            "kf_broker_subscriptions_active",
            "Live replica subscriptions",
        )
        .map_err(init)?;

        let intake_queue_depth = IntGauge::new(
            "kf_broker_intake_queue_depth",
            "Events waiting for a routing worker",
        )
        .map_err(init)?;

        registry
            .register(Box::new(events_received.clone()))
            .map_err(init)?;
        registry
            .register(Box::new(events_routed.clone()))
            .map_err(init)?;
        registry
            .register(Box::new(routing_duration.clone()))
            .map_err(init)?;
        registry
            .register(Box::new(subscriptions_active.clone()))
            .map_err(init)?;
        registry
            .register(Box::new(intake_queue_depth.clone()))
            .map_err(init)?;

        Ok(Self {
            registry,
            events_received,
            events_routed,
            routing_duration,
            subscriptions_active,
            intake_queue_depth,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_received(&self, receiver: &str) {
        self.events_received.with_label_values(&[receiver]).inc();
    }

    pub fn record_routed(&self, outcome: &str) {
        self.events_routed.with_label_values(&[outcome]).inc();
    }

    /// Start timing one routing pass; observed when the timer drops.
    pub fn routing_timer(&self) -> HistogramTimer {
        HistogramTimer::new(&self.routing_duration)
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instances_are_independent() {
        let a = BrokerMetrics::new().unwrap();
        let b = BrokerMetrics::new().unwrap();
        a.record_received(receiver::GRPC_SERVER);
        assert_eq!(
            a.events_received
                .with_label_values(&[receiver::GRPC_SERVER])
                .get(),
            1
        );
        assert_eq!(
            b.events_received
                .with_label_values(&[receiver::GRPC_SERVER])
                .get(),
            0
        );
    }

    #[test]
    fn test_gauges() {
        let m = BrokerMetrics::new().unwrap();
        m.subscriptions_active.inc();
        m.subscriptions_active.inc();
        m.subscriptions_active.dec();
        m.intake_queue_depth.set(12);
        assert_eq!(m.subscriptions_active.get(), 1);
        assert_eq!(m.intake_queue_depth.get(), 12);
    }

    #[test]
    fn test_histogram_timer() {
        let m = BrokerMetrics::new().unwrap();
        {
            let _timer = m.routing_timer();
        }
        assert_eq!(m.routing_duration.get_sample_count(), 1);
    }

    #[test]
    fn test_encode() {
        let m = BrokerMetrics::new().unwrap();
        m.record_routed(OUTCOME_OK);
        m.record_routed("route-not-found");
        let text = m.encode().unwrap();
        assert!(text.contains("kf_broker_events_routed_total{outcome=\"ok\"} 1"));
        assert!(text.contains("kf_broker_events_routed_total{outcome=\"route-not-found\"} 1"));
        assert!(text.contains("kf_broker_subscriptions_active 0"));
    }
}
