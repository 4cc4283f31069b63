//! Outbound ports (SPI) for the durable transport.

use async_trait::async_trait;
use shared_types::Event;

/// An event taken off the bus. Its TTL already has the time spent queued
/// charged against it.
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    pub event: Event,
    pub subject: String,
    /// Second delivery attempt; must not be republished again.
    pub redelivery: bool,
}

/// Receives decoded events from a running consumer.
#[async_trait]
pub trait TransportListener: Send + Sync {
    async fn on_event(&self, received: ReceivedEvent);
}
