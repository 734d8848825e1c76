//! Storage infrastructure: sender configuration file persistence.

pub mod config;

pub use config::{load_config_from, save_config_to, ConfigError, SenderConfig};
