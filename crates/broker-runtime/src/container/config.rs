//! # Broker Configuration
//!
//! Every setting comes from the environment. Unset variables take the
//! defaults below; set but unparsable ones are a `ConfigError`.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `KF_PLATFORM` | `dev` |
//! | `KF_NAMESPACE` | `kubefox-system` |
//! | `KF_BROKER_ID` | random UUID |
//! | `KF_BROKER_HASH` | `0000000` |
//! | `KF_NUM_WORKERS` | CPU count |
//! | `KF_INTAKE_CAPACITY` | `1024` |
//! | `KF_EVENT_TTL_SECS` | `30` |
//! | `KF_TRANSPORT` | `memory` |
//! | `KF_NATS_ADDR` | `127.0.0.1:4222` |
//! | `KF_DEPLOYMENT_CACHE_TTL_SECS` | `900` |
//! | `KF_COMPONENT_CACHE_TTL_SECS` | `86400` |
//! | `KF_RESOURCES_FILE` | unset |
//! | `KF_SHUTDOWN_TIMEOUT_SECS` | `5` |

use kf_02_route_store::StoreConfig;
use shared_bus::DEFAULT_INTAKE_CAPACITY;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Complete broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub broker: BrokerIdentity,
    pub workers: WorkerConfig,
    pub transport: TransportConfig,
    pub store: StoreSettings,
    /// How long shutdown waits for workers and background tasks.
    pub shutdown_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            broker: BrokerIdentity::default(),
            workers: WorkerConfig::default(),
            transport: TransportConfig::default(),
            store: StoreSettings::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl BrokerConfig {
    /// Reject settings the broker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_dns_label(&self.broker.platform) {
            return Err(ConfigError::Invalid(format!(
                "platform '{}' is not a valid name",
                self.broker.platform
            )));
        }
        if self.broker.namespace.is_empty() {
            return Err(ConfigError::Invalid("namespace is required".into()));
        }
        if self.broker.id.is_empty() {
            return Err(ConfigError::Invalid("broker id is required".into()));
        }
        if self.broker.hash.is_empty() {
            return Err(ConfigError::Invalid("broker hash is required".into()));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::Invalid("at least one worker is required".into()));
        }
        if self.workers.intake_capacity == 0 {
            return Err(ConfigError::Invalid("intake capacity must be positive".into()));
        }
        if self.workers.default_ttl.is_zero() {
            return Err(ConfigError::Invalid("default event TTL must be positive".into()));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::Invalid("shutdown timeout must be positive".into()));
        }
        if self.transport.kind == TransportKind::JetStream {
            if !cfg!(feature = "jetstream") {
                return Err(ConfigError::Invalid(
                    "jetstream transport is not compiled in".into(),
                ));
            }
            if self.transport.nats_addr.is_empty() {
                return Err(ConfigError::Invalid("NATS address is required".into()));
            }
        }
        Ok(())
    }

    /// Route store settings for this broker's platform.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            platform: self.broker.platform.clone(),
            deployment_ttl: self.store.deployment_ttl,
            component_ttl: self.store.component_ttl,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}='{value}' is invalid: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Who this broker is.
#[derive(Debug, Clone)]
pub struct BrokerIdentity {
    pub platform: String,
    pub namespace: String,
    /// Unique per process; names the broker's own subject.
    pub id: String,
    /// Build hash of the broker image.
    pub hash: String,
}

impl Default for BrokerIdentity {
    fn default() -> Self {
        Self {
            platform: "dev".to_string(),
            namespace: "kubefox-system".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            hash: "0000000".to_string(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub count: usize,
    pub intake_capacity: usize,
    /// TTL given to ingress requests that arrive without one.
    pub default_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: num_cpus::get().max(1),
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            default_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Memory,
    JetStream,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "jetstream" | "nats" => Ok(Self::JetStream),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::JetStream => "jetstream",
        })
    }
}

/// Durable transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub nats_addr: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Memory,
            nats_addr: "127.0.0.1:4222".to_string(),
        }
    }
}

/// Route store cache lifetimes and resource source.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub deployment_ttl: Duration,
    pub component_ttl: Duration,
    /// JSON resource snapshot. Unset starts with an empty platform.
    pub resources_file: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            deployment_ttl: store.deployment_ttl,
            component_ttl: store.component_ttl,
            resources_file: None,
        }
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<BrokerConfig, ConfigError> {
    load_config_from(|var| std::env::var(var).ok())
}

/// Load configuration from `lookup`, which returns a variable's value if
/// it is set.
pub fn load_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BrokerConfig, ConfigError> {
    let mut config = BrokerConfig::default();
    let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(platform) = var("KF_PLATFORM") {
        config.broker.platform = platform;
    }
    if let Some(namespace) = var("KF_NAMESPACE") {
        config.broker.namespace = namespace;
    }
    if let Some(id) = var("KF_BROKER_ID") {
        config.broker.id = id;
    }
    if let Some(hash) = var("KF_BROKER_HASH") {
        config.broker.hash = hash;
    }

    if let Some(v) = var("KF_NUM_WORKERS") {
        config.workers.count = parse("KF_NUM_WORKERS", &v)?;
    }
    if let Some(v) = var("KF_INTAKE_CAPACITY") {
        config.workers.intake_capacity = parse("KF_INTAKE_CAPACITY", &v)?;
    }
    if let Some(v) = var("KF_EVENT_TTL_SECS") {
        config.workers.default_ttl = secs("KF_EVENT_TTL_SECS", &v)?;
    }

    if let Some(v) = var("KF_TRANSPORT") {
        config.transport.kind = parse("KF_TRANSPORT", &v)?;
    }
    if let Some(addr) = var("KF_NATS_ADDR") {
        config.transport.nats_addr = addr;
    }

    if let Some(v) = var("KF_DEPLOYMENT_CACHE_TTL_SECS") {
        config.store.deployment_ttl = secs("KF_DEPLOYMENT_CACHE_TTL_SECS", &v)?;
    }
    if let Some(v) = var("KF_COMPONENT_CACHE_TTL_SECS") {
        config.store.component_ttl = secs("KF_COMPONENT_CACHE_TTL_SECS", &v)?;
    }
    config.store.resources_file = var("KF_RESOURCES_FILE").map(PathBuf::from);

    if let Some(v) = var("KF_SHUTDOWN_TIMEOUT_SECS") {
        config.shutdown_timeout = secs("KF_SHUTDOWN_TIMEOUT_SECS", &v)?;
    }

    Ok(config)
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse::<u64>(var, value).map(Duration::from_secs)
}

/// Lowercase alphanumerics and '-', not starting or ending with '-'.
fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
