//! # Shared Bus - Event Intake Queue
//!
//! The single hand-off point between receivers (gRPC streams, the durable
//! transport, internal retries) and the routing worker pool.
//!
//! ```text
//! ┌──────────────┐  push()   ┌──────────────┐  pop()   ┌──────────────┐
//! │  Receivers   │ ────────→ │ IntakeQueue  │ ───────→ │ Worker 1..N  │
//! └──────────────┘           │  (bounded)   │          └──────────────┘
//!                            └──────────────┘
//! ```
//!
//! Producers wait when the queue is full; each item is taken by exactly one
//! worker. No ordering is promised across workers.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod intake;
pub mod queue;

pub use intake::{EventIntake, IntakeError};
pub use queue::IntakeQueue;

/// Default number of events buffered ahead of the worker pool.
pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;
