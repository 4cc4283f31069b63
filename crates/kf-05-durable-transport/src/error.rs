//! Durable transport errors.

use shared_types::{BrokerError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("publish to '{subject}' failed: {reason}")]
    Publish { subject: String, reason: String },

    #[error("consumer '{consumer}' failed: {reason}")]
    Consume { consumer: String, reason: String },

    #[error("message codec error: {0}")]
    Codec(String),

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("components bucket error: {0}")]
    Bucket(String),

    #[error("transport is closed")]
    Closed,
}

pub type TransportResult<T> = Result<T, TransportError>;

impl From<TransportError> for BrokerError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::Connect { .. } | TransportError::Closed => ErrorKind::BrokerUnavailable,
            TransportError::TooLarge { .. } => ErrorKind::ContentTooLarge,
            TransportError::Codec(_) => ErrorKind::Invalid,
            TransportError::Publish { .. }
            | TransportError::Consume { .. }
            | TransportError::Bucket(_) => ErrorKind::Unexpected,
        };
        BrokerError::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err: BrokerError = TransportError::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(err.kind(), ErrorKind::ContentTooLarge);
        let err: BrokerError = TransportError::Closed.into();
        assert_eq!(err.kind(), ErrorKind::BrokerUnavailable);
    }
}
