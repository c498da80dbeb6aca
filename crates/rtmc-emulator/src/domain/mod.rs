//! Domain layer for rtmc-emulator.
//!
//! Pure configuration types with no I/O beyond reading a config file.

pub mod config;

pub use config::{load_config, ConfigError, EmulatorConfig};
