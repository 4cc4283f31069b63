//! Outbound ports (SPI) for subscriptions.

use async_trait::async_trait;
use shared_types::{BrokerResult, MatchedEvent};

/// Delivery function of one connected replica, usually its event stream.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, evt: MatchedEvent) -> BrokerResult<()>;
}
