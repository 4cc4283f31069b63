//! Domain module for the orchestrator
//!
//! - token: per-event cancellation scope with its outcome
//! - live_event: event in flight and its TTL clock
//! - auth: ServiceAccount identity of connecting components

pub mod auth;
pub mod live_event;
pub mod token;

pub use auth::{expected_service_account, service_account_name, ComponentMeta};
pub use live_event::{LiveEvent, Receiver};
pub use token::EventToken;
