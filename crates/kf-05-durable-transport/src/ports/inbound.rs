//! Inbound ports (API) for the durable transport.

use crate::domain::{encode, WireMessage};
use crate::error::TransportResult;
use crate::ports::outbound::TransportListener;
use async_trait::async_trait;
use shared_types::{Component, Event};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Persistent message bus for cross-broker delivery.
///
/// Delivery is at-most-once from this layer: a publish that fails is
/// reported, but a lost acknowledgement after publishing is only logged.
#[async_trait]
pub trait DurableTransport: Send + Sync {
    /// Send one encoded message.
    async fn send(&self, msg: WireMessage) -> TransportResult<()>;

    async fn publish(&self, subject: &str, evt: &Event) -> TransportResult<()> {
        self.send(encode(subject, evt, false)?).await
    }

    /// Publish a second time after the first delivery found no
    /// subscriber. Marked so it is not republished again.
    async fn republish(&self, subject: &str, evt: &Event) -> TransportResult<()> {
        self.send(encode(subject, evt, true)?).await
    }

    /// Start delivering messages on `subject` to `listener` until `scope`
    /// is canceled. Starting a consumer name that is already running is a
    /// no-op.
    async fn consume_events(
        &self,
        scope: CancellationToken,
        consumer: &str,
        subject: &str,
        listener: Arc<dyn TransportListener>,
    ) -> TransportResult<()>;

    /// Record that `component` is reachable through this broker.
    async fn put_component(&self, component: &Component) -> TransportResult<()>;

    /// Archive a routed event.
    async fn record_event(&self, evt: &Event) -> TransportResult<()>;

    async fn close(&self);

    fn is_healthy(&self) -> bool;
}
