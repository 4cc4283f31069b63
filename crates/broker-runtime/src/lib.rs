//! # Broker Runtime Library
//!
//! Configuration, wiring and lifecycle of the broker process. The entry
//! point is the `main.rs` binary; the library exists so the runtime can be
//! driven from tests.
//!
//! ## Startup Sequence
//!
//! 1. Install logging and trace export
//! 2. Load and validate configuration from the environment
//! 3. Connect the durable transport
//! 4. Load resources and open the route store
//! 5. Build the registry and orchestrator, start consuming
//! 6. Spawn workers, the archiver and the registrar

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod container;
pub mod error;
pub mod wiring;

pub use container::{load_config, BrokerConfig, ConfigError};
pub use error::{RuntimeError, EXIT_INTERRUPTED};
pub use wiring::{BrokerRuntime, RuntimeParts};
