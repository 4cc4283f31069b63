//! # kf-04-orchestrator
//!
//! Takes every event the broker receives through validation, target
//! lookup and delivery, all inside the event's TTL.
//!
//! ```text
//!  receiver ─→ BrokerService::recv_event ─→ IntakeQueue ─→ worker
//!                                                           │
//!         ┌─────────────────────────────────────────────────┘
//!         ▼
//!     Router::route
//!       ├─ validate      per-receiver checks, TTL
//!       ├─ find_target   direct address │ deployment routes │ release routes
//!       └─ deliver       adapter │ replica │ group │ durable publish
//! ```
//!
//! | Outcome            | Token resolves with         |
//! |--------------------|-----------------------------|
//! | delivered          | `Ok(())`                    |
//! | TTL ran out        | `ErrorKind::Timeout`        |
//! | nobody to send to  | `ErrorKind::ComponentGone`  |
//! | any other failure  | the failing stage's error   |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod router;
pub mod service;

pub use adapters::{StaticTokenVerifier, TransportPublisher};
pub use domain::{
    expected_service_account, service_account_name, ComponentMeta, EventToken, LiveEvent,
    Receiver,
};
pub use ports::{AdapterClient, DurablePublisher, EventRouter, TokenVerifier};
pub use router::{Router, RouterConfig};
pub use service::{BrokerService, ServiceDeps, ServiceOptions};
