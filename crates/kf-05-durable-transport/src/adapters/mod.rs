//! Transport adapters.

#[cfg(feature = "jetstream")]
pub mod jetstream;
pub mod memory;

#[cfg(feature = "jetstream")]
pub use jetstream::JetStreamTransport;
pub use memory::InMemoryTransport;
