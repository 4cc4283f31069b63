//! Ports for the durable transport.

pub mod inbound;
pub mod outbound;

pub use inbound::DurableTransport;
pub use outbound::{ReceivedEvent, TransportListener};
