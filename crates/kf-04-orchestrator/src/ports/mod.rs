//! Ports for the orchestrator.

pub mod inbound;
pub mod outbound;

pub use inbound::EventRouter;
pub use outbound::{AdapterClient, DurablePublisher, TokenVerifier};
