//! Domain module for subscriptions
//!
//! - replica: one connected replica, cancel-once semantics
//! - group: shared ordered queue over every replica of one version

pub mod group;
pub mod replica;

pub use group::{GroupSubscription, DEFAULT_GROUP_CAPACITY};
pub use replica::{ReplicaSubscription, SubscriptionConf};
