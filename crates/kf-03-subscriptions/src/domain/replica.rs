//! Delivery handle for one connected replica.
//!
//! Active until canceled; cancellation is terminal and idempotent. The
//! first cancel may record the error that ended the subscription.

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::ports::EventSink;
use shared_types::{BrokerError, Component, ComponentDefinition, MatchedEvent};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything needed to register a replica.
#[derive(Clone)]
pub struct SubscriptionConf {
    pub component: Component,
    /// Definition from the deployment the replica belongs to, when known.
    pub definition: Option<Arc<ComponentDefinition>>,
    pub send: Arc<dyn EventSink>,
    /// Also join the group of all replicas with the same name and version.
    pub enable_group: bool,
}

impl fmt::Debug for SubscriptionConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConf")
            .field("component", &self.component)
            .field("enable_group", &self.enable_group)
            .finish_non_exhaustive()
    }
}

pub struct ReplicaSubscription {
    component: Component,
    definition: Option<Arc<ComponentDefinition>>,
    sink: Arc<dyn EventSink>,
    group_enabled: bool,
    token: CancellationToken,
    /// Set exactly once, by the first cancel.
    end: OnceLock<Option<BrokerError>>,
}

impl ReplicaSubscription {
    pub fn new(conf: SubscriptionConf, token: CancellationToken) -> Self {
        Self {
            component: conf.component,
            definition: conf.definition,
            sink: conf.send,
            group_enabled: conf.enable_group,
            token,
            end: OnceLock::new(),
        }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn definition(&self) -> Option<&Arc<ComponentDefinition>> {
        self.definition.as_ref()
    }

    pub fn is_group_enabled(&self) -> bool {
        self.group_enabled
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Error the subscription was canceled with, if any.
    pub fn err(&self) -> Option<&BrokerError> {
        self.end.get().and_then(Option::as_ref)
    }

    /// Token canceled together with this subscription, for work that
    /// must not outlive it.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Resolves once the subscription is canceled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Deliver one event. Events already handed to the sink are not
    /// interrupted by a later cancel.
    pub async fn send_event(&self, evt: MatchedEvent) -> SubscriptionResult<()> {
        if !self.is_active() {
            return Err(SubscriptionError::Canceled(self.component.key()));
        }
        self.sink.send(evt).await.map_err(SubscriptionError::Sink)
    }

    /// Cancel with an optional cause. Returns false if it was already
    /// canceled.
    pub fn cancel(&self, err: Option<BrokerError>) -> bool {
        let first = self.end.set(err).is_ok();
        self.token.cancel();
        if first {
            debug!(component = %self.component.key(), error = ?self.err(), "Replica subscription canceled");
        }
        first
    }
}

impl fmt::Debug for ReplicaSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaSubscription")
            .field("component", &self.component)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
