//! Ports for the subscription registry.

pub mod outbound;

pub use outbound::EventSink;
