//! Subscription errors.

use shared_types::{BrokerError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("subscribing component is incomplete: {0} is required")]
    Incomplete(&'static str),

    #[error("subscription '{0}' is canceled")]
    Canceled(String),

    #[error("group '{0}' is closed")]
    GroupClosed(String),

    #[error("subscription registry is closed")]
    RegistryClosed,

    /// The replica's sink rejected the event.
    #[error(transparent)]
    Sink(#[from] BrokerError),
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

impl From<SubscriptionError> for BrokerError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::Sink(e) => e,
            SubscriptionError::Incomplete(_) => BrokerError::new(ErrorKind::Invalid, err.to_string()),
            SubscriptionError::Canceled(_)
            | SubscriptionError::GroupClosed(_)
            | SubscriptionError::RegistryClosed => {
                BrokerError::new(ErrorKind::ComponentGone, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_kinds() {
        let gone: BrokerError = SubscriptionError::Canceled("cart-0123456-r1".into()).into();
        assert_eq!(gone.kind(), ErrorKind::ComponentGone);

        let invalid: BrokerError = SubscriptionError::Incomplete("id").into();
        assert_eq!(invalid.kind(), ErrorKind::Invalid);

        let sink = BrokerError::timeout();
        let passed: BrokerError = SubscriptionError::Sink(sink.clone()).into();
        assert_eq!(passed, sink);
    }
}
