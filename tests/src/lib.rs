//! # Event Broker Test Suite
//!
//! Flows that cross crate boundaries, and routing benchmarks.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs          # shared platform, tokens, broker builders
//! │   └── integration/
//! │       ├── routing_flows.rs     # one broker, ingress to replica
//! │       ├── multi_broker.rs      # brokers sharing a durable transport
//! │       └── resource_updates.rs  # routes follow resource changes
//! └── benches/
//!     └── routing_benchmarks.rs    # rule compilation and matching
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p kf-tests
//! cargo test -p kf-tests integration::multi_broker
//! cargo bench -p kf-tests
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod fixtures;
pub mod integration;
