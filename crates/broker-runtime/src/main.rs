//! # KubeFox Broker
//!
//! Runs one broker until ctrl-c. Exit codes:
//!
//! | Code | Cause |
//! |------|-------|
//! | 10 | configuration |
//! | 11 | durable transport |
//! | 14 | telemetry |
//! | 15 | resource store |
//! | 130 | interrupted |

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use broker_runtime::{load_config, BrokerRuntime, RuntimeError, EXIT_INTERRUPTED};
use kf_telemetry::{init_telemetry, BrokerMetrics, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let _telemetry = match init_telemetry(TelemetryConfig::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize telemetry: {e}");
            return ExitCode::from(RuntimeError::from(e).exit_code());
        }
    };

    match run().await {
        Ok(()) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Broker failed");
            let code = e
                .downcast_ref::<RuntimeError>()
                .map_or(1, RuntimeError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run() -> Result<()> {
    let config = load_config().map_err(RuntimeError::from)?;
    config.validate().map_err(RuntimeError::from)?;

    let metrics = Arc::new(
        BrokerMetrics::new()
            .map_err(RuntimeError::from)
            .context("creating metrics")?,
    );
    let mut runtime = BrokerRuntime::build(config, metrics)
        .await
        .context("building broker")?;
    runtime.start().await.context("starting broker")?;

    info!("Broker is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;

    runtime.shutdown().await;
    Ok(())
}
