//! Domain module for the rule matcher
//!
//! - lexer: rule text to tokens
//! - parser: tokens to `Predicate`
//! - pattern: segment and value patterns
//! - predicate: evaluation with deferred capture commit
//! - route / matcher: priority-ordered route selection

pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod pattern;
pub mod predicate;
pub mod route;

pub use matcher::Matcher;
pub use parser::compile;
pub use pattern::{SegmentPattern, ValuePattern};
pub use predicate::{Captures, Predicate};
pub use route::{derived_priority, Route};
