//! Token verifier that accepts or rejects every token.
//!
//! Stands in for TokenReview where the broker runs outside a cluster.

use crate::ports::TokenVerifier;
use async_trait::async_trait;
use shared_types::{BrokerError, BrokerResult};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct StaticTokenVerifier {
    accept: bool,
}

impl StaticTokenVerifier {
    pub fn accepting() -> Self {
        Self { accept: true }
    }

    pub fn rejecting() -> Self {
        Self { accept: false }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, service_account: &str, _token: &str) -> BrokerResult<()> {
        debug!(service_account, accept = self.accept, "Static token review");
        if self.accept {
            Ok(())
        } else {
            Err(BrokerError::unauthorized(format!(
                "token for '{service_account}' is not valid"
            )))
        }
    }
}
