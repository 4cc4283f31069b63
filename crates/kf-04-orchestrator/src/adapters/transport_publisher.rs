//! Durable publisher backed by a `DurableTransport`.

use crate::ports::DurablePublisher;
use async_trait::async_trait;
use kf_05_durable_transport::DurableTransport;
use shared_types::{BrokerResult, Event};
use std::sync::Arc;

pub struct TransportPublisher {
    transport: Arc<dyn DurableTransport>,
}

impl TransportPublisher {
    pub fn new(transport: Arc<dyn DurableTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DurablePublisher for TransportPublisher {
    async fn publish(&self, subject: &str, evt: &Event) -> BrokerResult<()> {
        Ok(self.transport.publish(subject, evt).await?)
    }

    async fn republish(&self, subject: &str, evt: &Event) -> BrokerResult<()> {
        Ok(self.transport.republish(subject, evt).await?)
    }
}
