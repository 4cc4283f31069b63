//! # KubeFox Broker Telemetry
//!
//! Logging, tracing and metrics for the broker.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an env filter and pretty or JSON output
//! - **Traces**: OpenTelemetry spans exported over OTLP when enabled
//! - **Context**: trace ids carried on events across brokers and components
//! - **Metrics**: `BrokerMetrics`, a Prometheus registry owned by the caller
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kf_telemetry::{init_telemetry, BrokerMetrics, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     let metrics = std::sync::Arc::new(BrokerMetrics::new()?);
//!     // hand `metrics` to the components that record into it
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `http://localhost:4317` | OTLP endpoint |
//! | `OTEL_SERVICE_NAME` | `kubefox-broker` | Service name in traces |
//! | `KF_OTLP_ENABLED` | `false` | Export spans |
//! | `KF_LOG_LEVEL` | `info` | Log level filter |
//! | `KF_JSON_LOGS` | `true` in cluster | JSON log lines |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod context;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use context::{PropagatedContext, TraceContext};
pub use metrics::{receiver, BrokerMetrics, HistogramTimer, OUTCOME_OK};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and, when enabled, trace export.
///
/// Returns a guard that must be held for the lifetime of the process.
/// Dropping it flushes pending spans.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let tracing = tracing_setup::init_tracing(&config)?;
    Ok(TelemetryGuard { _tracing: tracing })
}

/// Guard that keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}
