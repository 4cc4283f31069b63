//! Per-event cancellation scope.
//!
//! Resolved exactly once, either by the pipeline with its outcome or by the
//! deadline passing. Whoever holds a clone can wait for the outcome; any
//! downstream call selecting on `cancelled()` is aborted when it resolves.

use shared_types::{BrokerError, BrokerResult};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct EventToken {
    token: CancellationToken,
    outcome: Arc<OnceLock<BrokerResult<()>>>,
    deadline: Instant,
}

impl EventToken {
    /// Scope whose deadline is `ttl` from now.
    pub fn new(ttl: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            outcome: Arc::new(OnceLock::new()),
            deadline: Instant::now() + ttl,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Record the outcome and cancel the scope. Only the first call has any
    /// effect; returns whether this call won.
    pub fn resolve(&self, result: BrokerResult<()>) -> bool {
        let first = self.outcome.set(result).is_ok();
        self.token.cancel();
        first
    }

    pub fn outcome(&self) -> Option<&BrokerResult<()>> {
        self.outcome.get()
    }

    /// Resolves when the scope is canceled, without waiting for the
    /// deadline.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Wait for the outcome. Passing the deadline first resolves the scope
    /// with a timeout.
    pub async fn wait(&self) -> BrokerResult<()> {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {
                self.resolve(Err(BrokerError::timeout()));
            }
        }
        self.outcome
            .get()
            .cloned()
            .unwrap_or_else(|| Err(BrokerError::unexpected("event scope canceled without outcome")))
    }
}
