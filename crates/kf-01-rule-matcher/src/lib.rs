//! # kf-01-rule-matcher
//!
//! Route rule DSL. Compiles rule text into predicates over events and picks
//! the highest-priority route that accepts an event.
//!
//! ## Rule Language
//!
//! | Function | Arguments | Matches |
//! |----------|-----------|---------|
//! | `All()` | none | every event |
//! | `Method(m...)` | one or more | HTTP method, case-insensitive |
//! | `Path(p)` | segment pattern | path with exactly as many segments |
//! | `PathPrefix(p)` | segment pattern | path starting with the pattern |
//! | `Host(p)` | segment pattern (`.`) | host with exactly as many labels |
//! | `Header(k, v)` | key, literal or `{regex}` | any value of header `k` |
//! | `Query(k, v)` | key, literal or `{regex}` | any value of query param `k` |
//! | `Type(t)` | type | event type, exact or case-insensitive suffix |
//!
//! Combined with `&&`/`AND`, `||`/`OR`, `!`/`NOT` and parentheses.
//!
//! ## Selection
//!
//! ```text
//! routes ──compile──→ [valid, sorted by (explicit?, priority) desc] ──first match──→ Route
//!                  └─→ [invalid] (kept for reporting, never matched)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use kf_01_rule_matcher::{Matcher, Route};
//!
//! let route = Route::new(0, r#"Method("GET") && Path("/cart/{id}")"#)
//!     .resolved(r#"Method("GET") && Path("/cart/{id}")"#, None);
//! let matcher = Matcher::new(vec![route]);
//! if let Some(route) = matcher.match_event(&mut event) {
//!     // event.params now holds id
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod error;

pub use domain::{compile, derived_priority, Captures, Matcher, Predicate, Route};
pub use error::{MatcherError, MatcherResult};

use shared_types::{BrokerError, ErrorKind};

impl From<MatcherError> for BrokerError {
    fn from(err: MatcherError) -> Self {
        BrokerError::new(ErrorKind::RouteInvalid, err.to_string())
    }
}
