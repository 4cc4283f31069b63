//! Adapters for the route store ports.

pub mod config_resolver;
pub mod memory_cache;

pub use config_resolver::MergingConfigResolver;
pub use memory_cache::{InMemoryResourceCache, ResourceSnapshot};
