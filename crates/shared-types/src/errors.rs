//! # Error Types
//!
//! One taxonomy shared by every subsystem. Each kind carries the status codes
//! used when the error is reported back to a component and the severity it
//! is logged at. Severity affects logging only; every kind is returned to the
//! caller as a failed routing outcome.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::Level;

/// Classification of a routing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Unexpected,
    BrokerMismatch,
    BrokerUnavailable,
    ComponentGone,
    ComponentMismatch,
    ContentTooLarge,
    Invalid,
    NotFound,
    PortUnavailable,
    RouteInvalid,
    RouteNotFound,
    Timeout,
    Unauthorized,
    UnknownContentType,
    UnsupportedAdapter,
}

/// gRPC status codes reported to components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrpcCode {
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    PermissionDenied = 7,
    FailedPrecondition = 9,
    Unavailable = 14,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "unexpected",
            ErrorKind::BrokerMismatch => "broker-mismatch",
            ErrorKind::BrokerUnavailable => "broker-unavailable",
            ErrorKind::ComponentGone => "component-gone",
            ErrorKind::ComponentMismatch => "component-mismatch",
            ErrorKind::ContentTooLarge => "content-too-large",
            ErrorKind::Invalid => "invalid",
            ErrorKind::NotFound => "not-found",
            ErrorKind::PortUnavailable => "port-unavailable",
            ErrorKind::RouteInvalid => "route-invalid",
            ErrorKind::RouteNotFound => "route-not-found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::UnknownContentType => "unknown-content-type",
            ErrorKind::UnsupportedAdapter => "unsupported-adapter",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Unexpected => 500,
            ErrorKind::BrokerMismatch | ErrorKind::BrokerUnavailable => 502,
            ErrorKind::ComponentGone => 502,
            ErrorKind::ContentTooLarge => 413,
            ErrorKind::NotFound | ErrorKind::RouteNotFound => 404,
            ErrorKind::PortUnavailable => 409,
            ErrorKind::Timeout => 504,
            ErrorKind::Unauthorized => 403,
            ErrorKind::ComponentMismatch
            | ErrorKind::Invalid
            | ErrorKind::RouteInvalid
            | ErrorKind::UnknownContentType
            | ErrorKind::UnsupportedAdapter => 400,
        }
    }

    pub fn grpc_code(&self) -> GrpcCode {
        match self {
            ErrorKind::Unexpected => GrpcCode::Unknown,
            ErrorKind::BrokerMismatch
            | ErrorKind::BrokerUnavailable
            | ErrorKind::PortUnavailable => GrpcCode::Unavailable,
            ErrorKind::ComponentGone | ErrorKind::ComponentMismatch => {
                GrpcCode::FailedPrecondition
            }
            ErrorKind::NotFound | ErrorKind::RouteNotFound => GrpcCode::NotFound,
            ErrorKind::Timeout => GrpcCode::DeadlineExceeded,
            ErrorKind::Unauthorized => GrpcCode::PermissionDenied,
            ErrorKind::ContentTooLarge
            | ErrorKind::Invalid
            | ErrorKind::RouteInvalid
            | ErrorKind::UnknownContentType
            | ErrorKind::UnsupportedAdapter => GrpcCode::InvalidArgument,
        }
    }

    pub fn log_level(&self) -> Level {
        match self {
            ErrorKind::Unexpected => Level::ERROR,
            ErrorKind::BrokerMismatch | ErrorKind::ComponentMismatch | ErrorKind::Unauthorized => {
                Level::WARN
            }
            _ => Level::DEBUG,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Classified routing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BrokerError {
    kind: ErrorKind,
    message: String,
}

impl BrokerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "event timed out")
    }

    pub fn route_not_found() -> Self {
        Self::new(ErrorKind::RouteNotFound, "route not found")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn component_gone(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ComponentGone, message)
    }

    pub fn component_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ComponentMismatch, message)
    }

    pub fn broker_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BrokerMismatch, message)
    }

    pub fn broker_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BrokerUnavailable, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Result alias used across the routing pipeline.
pub type BrokerResult<T> = Result<T, BrokerError>;
