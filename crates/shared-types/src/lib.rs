//! # Shared Types Crate
//!
//! Event, Component and resource types shared by every broker subsystem,
//! plus the error taxonomy the routing pipeline reports with.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the wire model is defined here once.
//! - **Closed Values**: configuration values are the `Val` sum type, never
//!   untyped maps.
//! - **Monotonic Budget**: an event's TTL only shrinks; helpers never add
//!   time back.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod component;
pub mod errors;
pub mod event;
pub mod resources;
pub mod val;

pub use component::{Component, ComponentType, SHORT_HASH_LEN};
pub use errors::{BrokerError, BrokerResult, ErrorKind, GrpcCode};
pub use event::{
    canonical_header_key, event_type, value_key, Category, Event, EventContext, MatchedEvent,
    SpanContext, DEFAULT_ROUTE_ID,
};
pub use resources::{
    ActiveRelease, Adapter, AppDeployment, ComponentDefinition, DataSnapshot, Dependency,
    EnvData, Environment, Platform, ReleaseManifest, RouteSpec, VirtualEnvironment,
};
pub use val::Val;
