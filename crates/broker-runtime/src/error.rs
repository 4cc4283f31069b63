//! Startup failures and the exit code each one maps to.

use crate::container::ConfigError;
use kf_02_route_store::StoreError;
use kf_05_durable_transport::TransportError;
use kf_telemetry::TelemetryError;
use shared_types::BrokerError;
use thiserror::Error;

pub const EXIT_CONFIG: u8 = 10;
pub const EXIT_TRANSPORT: u8 = 11;
pub const EXIT_TELEMETRY: u8 = 14;
pub const EXIT_STORE: u8 = 15;
/// Stopped by ctrl-c after a clean shutdown.
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("durable transport: {0}")]
    Transport(#[from] TransportError),

    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("resource store: {0}")]
    Store(#[from] StoreError),

    /// The broker could not start consuming its own subject.
    #[error("broker: {0}")]
    Broker(#[from] BrokerError),
}

impl RuntimeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Transport(_) | Self::Broker(_) => EXIT_TRANSPORT,
            Self::Telemetry(_) => EXIT_TELEMETRY,
            Self::Store(_) => EXIT_STORE,
        }
    }
}
