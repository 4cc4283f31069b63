//! Error types for rule compilation

use thiserror::Error;

/// Rule compilation errors. Matching itself never fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatcherError {
    #[error("unexpected character '{ch}' at index {index}")]
    UnexpectedChar { index: usize, ch: char },

    #[error("unterminated string starting at index {index}")]
    UnterminatedString { index: usize },

    #[error("expected {expected} at index {index}, found {found}")]
    UnexpectedToken {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of rule, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' takes {expected} argument(s), got {got}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("{function} key must be provided")]
    EmptyKey { function: &'static str },

    #[error("unclosed bracket started at index {index} of pattern {pattern}")]
    UnclosedBrace { index: usize, pattern: String },

    #[error("found mix of literal and capture in same segment at index {index} of pattern {pattern}")]
    MixedSegment { index: usize, pattern: String },

    #[error("invalid regex '{regex}': {reason}")]
    InvalidRegex { regex: String, reason: String },

    #[error("rule of route {0} has not been resolved")]
    Unresolved(i64),
}

/// Result type for rule compilation
pub type MatcherResult<T> = Result<T, MatcherError>;
