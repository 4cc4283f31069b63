//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and trace export.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// Platform the broker serves; recorded as the deployment environment.
    pub platform: String,

    /// OpenTelemetry OTLP gRPC endpoint
    pub otlp_endpoint: String,

    /// Export spans over OTLP. Off means logs only.
    pub otlp_enabled: bool,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "kubefox-broker".to_string(),
            platform: "dev".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            otlp_enabled: false,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: kubefox-broker)
    /// - `KF_PLATFORM`: Platform name (default: dev)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)
    /// - `KF_OTLP_ENABLED`: Export traces (default: false)
    /// - `KF_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `KF_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `KF_JSON_LOGS`: Enable JSON logs (default: true inside Kubernetes)
    pub fn from_env() -> Self {
        let in_cluster = env::var("KUBERNETES_SERVICE_HOST").is_ok();
        let defaults = Self::default();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),

            platform: env::var("KF_PLATFORM").unwrap_or(defaults.platform),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otlp_endpoint),

            otlp_enabled: env::var("KF_OTLP_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.otlp_enabled),

            log_level: env::var("KF_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: env::var("KF_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.console_output),

            json_logs: env::var("KF_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(in_cluster),
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
