//! Ports for the route store.

pub mod inbound;
pub mod outbound;

pub use inbound::RouteLookup;
pub use outbound::{ChangeOp, ConfigResolver, ResolvedData, ResourceCache, ResourceChange, ResourceKind};
