//! PlasmaKit Settings Crate
//!
//! Handles filter configuration: machine identity, file locations,
//! acknowledgment timing and the signal fallbacks used offline.

pub mod config;
pub mod error;

pub use config::{
    default_config_path, FilterConfig, FilterSettings, MachineSettings, PathSettings,
    SignalSettings,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
