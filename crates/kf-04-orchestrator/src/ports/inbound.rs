//! Inbound ports (API) for the orchestrator.

use crate::domain::LiveEvent;
use async_trait::async_trait;
use shared_types::BrokerResult;

/// Route one event to its target. The only capability receivers and the
/// worker pool depend on.
#[async_trait]
pub trait EventRouter: Send + Sync {
    async fn route(&self, live: &mut LiveEvent) -> BrokerResult<()>;
}
