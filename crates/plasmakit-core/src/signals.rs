//! Live machine signals
//!
//! The motion runtime owns a handful of pins the filter reads and raises:
//! the current material, the cut type selector, the Z offset below the
//! max limit, and two request/acknowledge pairs for temporary materials
//! and material reloads. [`MachineSignals`] is the seam; [`StaticSignals`]
//! serves tests and offline runs, [`FileSignals`] talks to a runtime that
//! mirrors its pins as files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

/// Cut type selector published by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CutType {
    #[default]
    Normal,
    PierceOnly,
}

impl fmt::Display for CutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::PierceOnly => write!(f, "pierce-only"),
        }
    }
}

impl FromStr for CutType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" | "0" => Ok(Self::Normal),
            "pierce-only" | "pierce_only" | "1" => Ok(Self::PierceOnly),
            _ => Err(format!("Unknown cut type: {}", s)),
        }
    }
}

/// Signals exchanged with the motion runtime
pub trait MachineSignals {
    /// Material number the runtime currently has loaded
    fn current_material(&self) -> u32;

    /// Cut type selected on the runtime side
    fn cut_type(&self) -> CutType;

    /// Distance below the Z max limit for the initial safe move, in mm
    fn max_z_offset(&self) -> f64;

    /// Announce a material change
    fn publish_material_change(&mut self, number: u32);

    /// Ask the runtime to pick up a temporary material
    fn request_temp_material(&mut self, number: u32);

    /// Whether the temporary material request is still outstanding
    fn temp_material_pending(&self) -> bool;

    /// Ask the runtime to reload the material file
    fn request_material_reload(&mut self);

    /// Whether the reload request is still outstanding
    fn material_reload_pending(&self) -> bool;
}

/// Poll `pending` until it clears or `timeout` elapses
///
/// Returns `true` when acknowledged.
pub fn wait_for_ack<F>(mut pending: F, timeout: Duration, poll_interval: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if !pending() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

/// In-memory signals
///
/// With `auto_acknowledge` set, requests are acknowledged immediately.
/// Otherwise they stay pending until [`StaticSignals::acknowledge_all`].
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    pub current_material: u32,
    pub cut_type: CutType,
    pub max_z_offset: f64,
    pub auto_acknowledge: bool,
    /// Every material change published, in order
    pub published: Vec<u32>,
    /// Every temporary material requested, in order
    pub temp_requests: Vec<u32>,
    /// Number of reload requests
    pub reload_requests: usize,
    temp_pending: bool,
    reload_pending: bool,
}

impl StaticSignals {
    pub fn new() -> Self {
        Self {
            auto_acknowledge: true,
            ..Self::default()
        }
    }

    pub fn with_cut_type(mut self, cut_type: CutType) -> Self {
        self.cut_type = cut_type;
        self
    }

    pub fn with_current_material(mut self, number: u32) -> Self {
        self.current_material = number;
        self
    }

    pub fn with_max_z_offset(mut self, offset: f64) -> Self {
        self.max_z_offset = offset;
        self
    }

    pub fn with_auto_acknowledge(mut self, enabled: bool) -> Self {
        self.auto_acknowledge = enabled;
        self
    }

    /// Clear every outstanding request
    pub fn acknowledge_all(&mut self) {
        self.temp_pending = false;
        self.reload_pending = false;
    }
}

impl MachineSignals for StaticSignals {
    fn current_material(&self) -> u32 {
        self.current_material
    }

    fn cut_type(&self) -> CutType {
        self.cut_type
    }

    fn max_z_offset(&self) -> f64 {
        self.max_z_offset
    }

    fn publish_material_change(&mut self, number: u32) {
        self.published.push(number);
    }

    fn request_temp_material(&mut self, number: u32) {
        self.temp_requests.push(number);
        self.temp_pending = !self.auto_acknowledge;
    }

    fn temp_material_pending(&self) -> bool {
        self.temp_pending
    }

    fn request_material_reload(&mut self) {
        self.reload_requests += 1;
        self.reload_pending = !self.auto_acknowledge;
    }

    fn material_reload_pending(&self) -> bool {
        self.reload_pending
    }
}

/// Pin file names inside a signal directory
pub mod pins {
    pub const CURRENT_MATERIAL: &str = "material_change_number";
    pub const CUT_TYPE: &str = "cut_type";
    pub const MAX_Z_OFFSET: &str = "max_offset";
    pub const TEMP_MATERIAL: &str = "material_temp";
    pub const MATERIAL_RELOAD: &str = "material_reload";
}

/// Signals mirrored as one text file per pin
///
/// Request pins hold a non-zero value while pending; the runtime writes
/// `0` to acknowledge. Missing or unreadable pins read as their defaults.
#[derive(Debug, Clone)]
pub struct FileSignals {
    dir: PathBuf,
}

impl FileSignals {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_pin(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.join(name))
            .ok()
            .map(|s| s.trim().to_string())
    }

    fn write_pin(&self, name: &str, value: &str) {
        let path = self.dir.join(name);
        if let Err(e) = fs::write(&path, format!("{}\n", value)) {
            tracing::warn!("Failed to write signal {}: {}", path.display(), e);
        }
    }

    fn pin_raised(&self, name: &str) -> bool {
        match self.read_pin(name) {
            Some(value) => value.parse::<f64>().map(|v| v != 0.0).unwrap_or(false),
            None => false,
        }
    }
}

impl MachineSignals for FileSignals {
    fn current_material(&self) -> u32 {
        self.read_pin(pins::CURRENT_MATERIAL)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    fn cut_type(&self) -> CutType {
        self.read_pin(pins::CUT_TYPE)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    fn max_z_offset(&self) -> f64 {
        self.read_pin(pins::MAX_Z_OFFSET)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    fn publish_material_change(&mut self, number: u32) {
        self.write_pin(pins::CURRENT_MATERIAL, &number.to_string());
    }

    fn request_temp_material(&mut self, number: u32) {
        self.write_pin(pins::TEMP_MATERIAL, &number.to_string());
    }

    fn temp_material_pending(&self) -> bool {
        self.pin_raised(pins::TEMP_MATERIAL)
    }

    fn request_material_reload(&mut self) {
        self.write_pin(pins::MATERIAL_RELOAD, "1");
    }

    fn material_reload_pending(&self) -> bool {
        self.pin_raised(pins::MATERIAL_RELOAD)
    }
}
