//! # Broker Container
//!
//! Configuration and the collaborators built from it.

pub mod config;

pub use config::{
    load_config, load_config_from, BrokerConfig, BrokerIdentity, ConfigError, StoreSettings,
    TransportConfig, TransportKind, WorkerConfig,
};
