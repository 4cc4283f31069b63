//! # Subscription Registry
//!
//! Tracks live replica subscriptions by `key()` and groups by
//! `group_key()`. Lookups take the read lock; writers only insert or
//! remove whole entries.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──→ Active ──cancel──→ Canceled (terminal)
//!               │                   │
//!               └─ joins group      └─ leaves group; last member closes it
//! ```

use crate::domain::{
    GroupSubscription, ReplicaSubscription, SubscriptionConf, DEFAULT_GROUP_CAPACITY,
};
use crate::error::{SubscriptionError, SubscriptionResult};
use kf_telemetry::BrokerMetrics;
use parking_lot::RwLock;
use shared_types::{BrokerError, Component};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct GroupEntry {
    group: Arc<GroupSubscription>,
    members: HashSet<String>,
}

#[derive(Default)]
struct State {
    replicas: HashMap<String, Arc<ReplicaSubscription>>,
    groups: HashMap<String, GroupEntry>,
}

struct Inner {
    state: RwLock<State>,
    token: CancellationToken,
    group_capacity: usize,
    metrics: Option<Arc<BrokerMetrics>>,
}

impl Inner {
    /// Remove `sub` if it is still the registered subscription for its
    /// replica. Returns the group to close if `sub` was its last member.
    fn remove(&self, sub: &Arc<ReplicaSubscription>) -> Option<Arc<GroupSubscription>> {
        let key = sub.component().key();
        let mut state = self.state.write();

        match state.replicas.get(&key) {
            Some(current) if Arc::ptr_eq(current, sub) => {}
            _ => return None,
        }
        state.replicas.remove(&key);
        self.update_gauge(state.replicas.len());

        let group_key = sub.component().group_key();
        let emptied = match state.groups.get_mut(&group_key) {
            Some(entry) => {
                entry.members.remove(&key);
                entry.members.is_empty()
            }
            None => false,
        };
        if emptied {
            state.groups.remove(&group_key).map(|e| e.group)
        } else {
            None
        }
    }

    fn update_gauge(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics
                .subscriptions_active
                .set(i64::try_from(count).unwrap_or(i64::MAX));
        }
    }
}

#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<Inner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_GROUP_CAPACITY, None)
    }

    pub fn with_metrics(metrics: Arc<BrokerMetrics>) -> Self {
        Self::with_options(DEFAULT_GROUP_CAPACITY, Some(metrics))
    }

    pub fn with_options(group_capacity: usize, metrics: Option<Arc<BrokerMetrics>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                token: CancellationToken::new(),
                group_capacity,
                metrics,
            }),
        }
    }

    /// Register a replica. An existing subscription for the same replica
    /// is canceled and replaced. The subscription also ends when `scope`
    /// is canceled.
    pub fn create(
        &self,
        scope: &CancellationToken,
        conf: SubscriptionConf,
    ) -> SubscriptionResult<(Arc<ReplicaSubscription>, Option<Arc<GroupSubscription>>)> {
        let comp = &conf.component;
        if comp.name.is_empty() {
            return Err(SubscriptionError::Incomplete("name"));
        }
        if comp.hash.is_empty() {
            return Err(SubscriptionError::Incomplete("hash"));
        }
        if comp.id.is_empty() {
            return Err(SubscriptionError::Incomplete("id"));
        }
        if self.inner.token.is_cancelled() {
            return Err(SubscriptionError::RegistryClosed);
        }

        let key = comp.key();
        let group_key = comp.group_key();
        let enable_group = conf.enable_group;
        let sub = Arc::new(ReplicaSubscription::new(conf, scope.child_token()));

        let (replaced, group, left) = {
            let mut state = self.inner.state.write();
            let replaced = state.replicas.insert(key.clone(), sub.clone());

            let group = if enable_group {
                let capacity = self.inner.group_capacity;
                let entry = state
                    .groups
                    .entry(group_key.clone())
                    .or_insert_with(|| GroupEntry {
                        group: Arc::new(GroupSubscription::new(group_key.clone(), capacity)),
                        members: HashSet::new(),
                    });
                entry.members.insert(key.clone());
                Some(entry.group.clone())
            } else {
                None
            };

            // A replacement that does not join the group leaves it.
            let mut left = None;
            if !enable_group {
                let emptied = state.groups.get_mut(&group_key).is_some_and(|entry| {
                    entry.members.remove(&key);
                    entry.members.is_empty()
                });
                if emptied {
                    left = state.groups.remove(&group_key).map(|e| e.group);
                }
            }

            self.inner.update_gauge(state.replicas.len());
            (replaced, group, left)
        };

        if let Some(old) = replaced {
            debug!(component = %key, "Replacing existing subscription");
            old.cancel(None);
        }
        if let Some(group) = left {
            group.close();
        }
        if let Some(group) = &group {
            group.spawn_dispatcher(sub.clone());
        }
        self.spawn_cleanup(sub.clone());

        info!(component = %key, group = enable_group, "Subscription created");
        Ok((sub, group))
    }

    /// Deregister the subscription once it ends by any path.
    fn spawn_cleanup(&self, sub: Arc<ReplicaSubscription>) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            sub.cancelled().await;
            if let Some(inner) = inner.upgrade() {
                if let Some(group) = inner.remove(&sub) {
                    group.close();
                }
            }
        });
    }

    /// Subscription of exactly this replica.
    pub fn replica(&self, component: &Component) -> Option<Arc<ReplicaSubscription>> {
        self.inner
            .state
            .read()
            .replicas
            .get(&component.key())
            .filter(|s| s.is_active())
            .cloned()
    }

    /// Group of any active replica of this name and version.
    pub fn group(&self, component: &Component) -> Option<Arc<GroupSubscription>> {
        self.inner
            .state
            .read()
            .groups
            .get(&component.group_key())
            .map(|e| e.group.clone())
            .filter(|g| g.is_active())
    }

    /// Cancel the replica's subscription. Unknown replicas are ignored.
    pub fn cancel(&self, component: &Component, err: Option<BrokerError>) -> bool {
        let sub = self
            .inner
            .state
            .read()
            .replicas
            .get(&component.key())
            .cloned();
        let Some(sub) = sub else {
            return false;
        };

        if let Some(group) = self.inner.remove(&sub) {
            group.close();
        }
        sub.cancel(err)
    }

    /// Cancel every subscription and refuse new ones.
    pub fn close(&self) {
        self.inner.token.cancel();
        let state = std::mem::take(&mut *self.inner.state.write());
        self.inner.update_gauge(0);

        let count = state.replicas.len();
        for sub in state.replicas.into_values() {
            sub.cancel(Some(BrokerError::component_gone("broker shutting down")));
        }
        for entry in state.groups.into_values() {
            entry.group.close();
        }
        info!(subscriptions = count, "Subscription registry closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Snapshot of the active replica subscriptions.
    pub fn replicas(&self) -> Vec<Arc<ReplicaSubscription>> {
        self.inner
            .state
            .read()
            .replicas
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.state.read().replicas.len()
    }

    pub fn group_count(&self) -> usize {
        self.inner.state.read().groups.len()
    }

    /// Members currently in the group of `component`.
    pub fn group_members(&self, component: &Component) -> usize {
        self.inner
            .state
            .read()
            .groups
            .get(&component.group_key())
            .map_or(0, |e| e.members.len())
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
