//! # kf-02-route-store
//!
//! Builds and caches the matchers events are routed with, and answers
//! which components and adapters belong to a deployment.
//!
//! ```text
//!                 ┌────────────────┐
//! EventContext ──→│ ConfigResolver │──→ EnvData + version
//!                 └────────────────┘            │
//!                 ┌────────────────┐            ▼
//!                 │ ResourceCache  │──→ AppDeployment ──→ context key
//!                 └───────┬────────┘            │
//!                         │ changes             ▼
//!                         ▼            templates expanded, routes compiled
//!                   watcher task                │
//!                         │                     ▼
//!                         └──→ release matcher  deployment matcher (TTL)
//! ```
//!
//! A context key is `<appDep>-<gen>_<ve>-<dataVersion>`. Editing the
//! deployment or its data changes the key, so stale matchers are never
//! served; the TTL only reclaims memory.
//!
//! Context-free events from ingress adapters match against the release
//! matcher: the union of the routes of every virtual environment with an
//! available release.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryResourceCache, MergingConfigResolver, ResourceSnapshot};
pub use domain::{build_routes, context_key, expand, EnvTemplate, ResolvedContext, TtlCache};
pub use error::{StoreError, StoreResult};
pub use ports::{
    ChangeOp, ConfigResolver, ResolvedData, ResourceCache, ResourceChange, ResourceKind,
    RouteLookup,
};
pub use service::{RouteStore, StoreConfig};
