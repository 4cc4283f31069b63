//! Adapters for the subscription ports.

pub mod channel_sink;

pub use channel_sink::ChannelSink;
