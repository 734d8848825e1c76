//! Storage infrastructure: receiver configuration and frame output.

pub mod config;
pub mod frame_dir;

pub use config::{load_config_from, save_config_to, ConfigError, ReceiverConfig};
pub use frame_dir::DirectorySink;
