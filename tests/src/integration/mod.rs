//! Cross-crate flows, each driving real brokers over the in-memory
//! transport.

pub mod multi_broker;
pub mod resource_updates;
pub mod routing_flows;
