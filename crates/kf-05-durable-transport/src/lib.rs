//! # kf-05-durable-transport
//!
//! Cross-broker delivery over a persistent message bus.
//!
//! ## Subjects
//!
//! | Subject | Reaches |
//! |---------|---------|
//! | `evt.brk.<brokerId>` | one broker |
//! | `evt.js.<name>.<shortHash>` | any replica of one component version |
//! | `evt.js.<name>.<shortHash>.<id>` | one replica, wherever it is connected |
//! | `evt.arc.<eventId>` | archive |
//!
//! ## Receipt
//!
//! ```text
//! bus ──→ decode ──→ charge time spent queued to TTL ──→ TransportListener
//! ```
//!
//! The JetStream adapter is behind the `jetstream` feature; the in-memory
//! adapter needs nothing outside the process.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::time::Duration;

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;

#[cfg(feature = "jetstream")]
pub use adapters::JetStreamTransport;
pub use adapters::InMemoryTransport;
pub use domain::{consumer_name, consumer_subject, subject_matches, WireMessage};
pub use error::{TransportError, TransportResult};
pub use ports::{DurableTransport, ReceivedEvent, TransportListener};

pub const EVENT_STREAM: &str = "EVENTS";
pub const EVENT_SUBJECTS: &str = "evt.>";
pub const MAX_MESSAGE_SIZE: usize = 5 * 1024 * 1024;
pub const EVENT_RETENTION: Duration = Duration::from_secs(3 * 24 * 60 * 60);

pub const COMPONENTS_BUCKET: &str = "COMPONENTS";
pub const COMPONENTS_TTL: Duration = Duration::from_secs(12 * 60 * 60);

pub const ARCHIVE_SUBJECT_PREFIX: &str = "evt.arc";

pub const HEADER_MSG_ID: &str = "Nats-Msg-Id";
pub const HEADER_REDELIVERY: &str = "Kf-Redelivery";
