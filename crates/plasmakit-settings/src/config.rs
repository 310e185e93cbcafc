//! Configuration for the PlasmaKit filter
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats.
//!
//! Configuration is organized into logical sections:
//! - Machine identity (name, linear units)
//! - File locations (material file, preferences, temporary material, signals)
//! - Filter tuning (acknowledgment wait, hole velocity, temporary numbering)
//! - Signal fallbacks used when no signal directory is configured

use crate::error::{ConfigError, SettingsError, SettingsResult};
use plasmakit_core::data::{AckPolicy, RegistryPaths, TEMP_MATERIAL_BASE};
use plasmakit_core::{CutType, LinearUnits, StaticSignals};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Machine identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Machine name, used to derive default file names
    pub name: String,
    /// Linear units the machine is configured in
    pub linear_units: LinearUnits,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            name: "plasmac".to_string(),
            linear_units: LinearUnits::Metric,
        }
    }
}

/// File locations
///
/// Unset paths are derived from the machine name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_material_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefs_file: Option<PathBuf>,
    /// Directory of pin files shared with the motion runtime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals_dir: Option<PathBuf>,
}

/// Filter tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// How long to wait for the runtime to acknowledge a material request
    pub ack_timeout_ms: u64,
    /// Interval between acknowledgment polls
    pub poll_interval_ms: u64,
    /// Velocity percentage used for small holes
    pub hole_velocity: f64,
    /// First temporary material number
    pub temp_material_base: u32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 3000,
            poll_interval_ms: 10,
            hole_velocity: 60.0,
            temp_material_base: TEMP_MATERIAL_BASE,
        }
    }
}

/// Signal values used when no runtime is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    pub current_material: u32,
    pub cut_type: CutType,
    /// Distance below the Z max limit, in mm
    pub max_z_offset: f64,
    pub auto_acknowledge: bool,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            current_material: 0,
            cut_type: CutType::Normal,
            max_z_offset: 0.0,
            auto_acknowledge: true,
        }
    }
}

/// Complete filter configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub machine: MachineSettings,
    pub paths: PathSettings,
    pub filter: FilterSettings,
    pub signals: SignalSettings,
}

impl FilterConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match config_format(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match config_format(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.machine.name.trim().is_empty() {
            return Err(SettingsError::invalid("machine.name", "must not be empty"));
        }
        if self.filter.ack_timeout_ms == 0 {
            return Err(SettingsError::invalid("filter.ack_timeout_ms", "must be > 0"));
        }
        if self.filter.poll_interval_ms == 0 {
            return Err(SettingsError::invalid("filter.poll_interval_ms", "must be > 0"));
        }
        if !(self.filter.hole_velocity > 0.0) {
            return Err(SettingsError::invalid("filter.hole_velocity", "must be > 0"));
        }
        if self.filter.temp_material_base == 0 {
            return Err(SettingsError::invalid(
                "filter.temp_material_base",
                "must be > 0",
            ));
        }
        Ok(())
    }

    /// Material file, `<machine>_material.cfg` unless configured
    pub fn material_file(&self) -> PathBuf {
        self.paths
            .material_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_material.cfg", self.machine.name)))
    }

    /// Temporary material file, under `/tmp/qtplasmac` unless configured
    pub fn temp_material_file(&self) -> PathBuf {
        self.paths.temp_material_file.clone().unwrap_or_else(|| {
            PathBuf::from("/tmp/qtplasmac").join(format!("{}_material.gcode", self.machine.name))
        })
    }

    /// Preferences file, `qtplasmac.prefs` unless configured
    pub fn prefs_file(&self) -> PathBuf {
        self.paths
            .prefs_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("qtplasmac.prefs"))
    }

    /// Paths handed to the material registry
    pub fn registry_paths(&self) -> RegistryPaths {
        RegistryPaths {
            material_file: self.material_file(),
            prefs_file: self.prefs_file(),
            temp_material_file: self.temp_material_file(),
        }
    }

    /// Acknowledgment wait handed to the material registry
    pub fn ack_policy(&self) -> AckPolicy {
        AckPolicy {
            timeout: Duration::from_millis(self.filter.ack_timeout_ms),
            poll_interval: Duration::from_millis(self.filter.poll_interval_ms),
        }
    }

    /// In-memory signals built from the fallback values
    pub fn static_signals(&self) -> StaticSignals {
        StaticSignals::new()
            .with_current_material(self.signals.current_material)
            .with_cut_type(self.signals.cut_type)
            .with_max_z_offset(self.signals.max_z_offset)
            .with_auto_acknowledge(self.signals.auto_acknowledge)
    }
}

enum Format {
    Json,
    Toml,
}

fn config_format(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into()),
    }
}

/// Default configuration location: `<config dir>/plasmakit/config.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::UnsupportedPlatform("no configuration directory".to_string())
    })?;
    Ok(dir.join("plasmakit").join("config.toml"))
}
