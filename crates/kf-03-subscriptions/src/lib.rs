//! # kf-03-subscriptions
//!
//! Live delivery channels for connected component replicas.
//!
//! ```text
//! ┌───────────────────────── SubscriptionRegistry ─────────────────────────┐
//! │ replicas: key() ──→ ReplicaSubscription ──→ EventSink (replica stream) │
//! │ groups:   group_key() ──→ GroupSubscription ──→ one dispatcher/member  │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - A replica subscription is Active until canceled; cancel is terminal,
//!   idempotent, and may carry the error that ended it.
//! - Registering a replica id that is already registered replaces the old
//!   subscription.
//! - A group exists while it has at least one member and closes when the
//!   last one leaves.
//! - Canceling a subscription stops new deliveries; events already handed
//!   to a sink finish.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::ChannelSink;
pub use domain::{GroupSubscription, ReplicaSubscription, SubscriptionConf, DEFAULT_GROUP_CAPACITY};
pub use error::{SubscriptionError, SubscriptionResult};
pub use ports::EventSink;
pub use service::SubscriptionRegistry;
