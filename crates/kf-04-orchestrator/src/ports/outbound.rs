//! Outbound ports (SPI) for the orchestrator.

use crate::domain::LiveEvent;
use async_trait::async_trait;
use shared_types::{Adapter, BrokerResult, Event};

/// Confirms a ServiceAccount token is currently valid (TokenReview).
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, service_account: &str, token: &str) -> BrokerResult<()>;
}

/// Publish-only view of the durable transport.
#[async_trait]
pub trait DurablePublisher: Send + Sync {
    async fn publish(&self, subject: &str, evt: &Event) -> BrokerResult<()>;

    /// Second attempt after the first delivery found no subscriber.
    async fn republish(&self, subject: &str, evt: &Event) -> BrokerResult<()>;
}

/// Sends events addressed to an outbound adapter (HTTP client).
#[async_trait]
pub trait AdapterClient: Send + Sync {
    async fn send(&self, adapter: &Adapter, live: &LiveEvent) -> BrokerResult<()>;
}
