//! Domain module for the route store
//!
//! - template: `{{.Vars.X}}` expansion
//! - cache: TTL cache of immutable values
//! - routes: route construction and context keys

pub mod cache;
pub mod routes;
pub mod template;

pub use cache::TtlCache;
pub use routes::{build_routes, context_key, ResolvedContext};
pub use template::{expand, EnvTemplate};
