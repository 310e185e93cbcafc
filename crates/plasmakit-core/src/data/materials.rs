//! Materials module
//!
//! This module provides:
//! - The plasma material record (cut parameters bound by `M190`)
//! - The fixed key set and ordering of a material file section
//! - Serialization of a record as a material file section and as a
//!   temporary material file

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Material number reserved for the preferences default
pub const DEFAULT_MATERIAL: u32 = 0;

/// First number handed out to temporary materials
pub const TEMP_MATERIAL_BASE: u32 = 1_000_000;

/// Header prefix of a material file section
pub const SECTION_PREFIX: &str = "[MATERIAL_NUMBER_";

/// Keys of a material file section, in the order they are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialKey {
    Name,
    KerfWidth,
    Thc,
    PierceHeight,
    PierceDelay,
    PuddleJumpHeight,
    PuddleJumpDelay,
    CutHeight,
    CutSpeed,
    CutAmps,
    CutVolts,
    PauseAtEnd,
    GasPressure,
    CutMode,
}

impl MaterialKey {
    /// All keys in section order
    pub const ALL: [MaterialKey; 14] = [
        Self::Name,
        Self::KerfWidth,
        Self::Thc,
        Self::PierceHeight,
        Self::PierceDelay,
        Self::PuddleJumpHeight,
        Self::PuddleJumpDelay,
        Self::CutHeight,
        Self::CutSpeed,
        Self::CutAmps,
        Self::CutVolts,
        Self::PauseAtEnd,
        Self::GasPressure,
        Self::CutMode,
    ];

    /// Key as it appears in the material file
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::KerfWidth => "KERF_WIDTH",
            Self::Thc => "THC",
            Self::PierceHeight => "PIERCE_HEIGHT",
            Self::PierceDelay => "PIERCE_DELAY",
            Self::PuddleJumpHeight => "PUDDLE_JUMP_HEIGHT",
            Self::PuddleJumpDelay => "PUDDLE_JUMP_DELAY",
            Self::CutHeight => "CUT_HEIGHT",
            Self::CutSpeed => "CUT_SPEED",
            Self::CutAmps => "CUT_AMPS",
            Self::CutVolts => "CUT_VOLTS",
            Self::PauseAtEnd => "PAUSE_AT_END",
            Self::GasPressure => "GAS_PRESSURE",
            Self::CutMode => "CUT_MODE",
        }
    }

    /// Key as it appears in the temporary material file
    pub fn temp_name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::KerfWidth => "kerf-width",
            Self::Thc => "thc-enable",
            Self::PierceHeight => "pierce-height",
            Self::PierceDelay => "pierce-delay",
            Self::PuddleJumpHeight => "puddle-jump-height",
            Self::PuddleJumpDelay => "puddle-jump-delay",
            Self::CutHeight => "cut-height",
            Self::CutSpeed => "cut-feed-rate",
            Self::CutAmps => "cut-amps",
            Self::CutVolts => "cut-volts",
            Self::PauseAtEnd => "pause-at-end",
            Self::GasPressure => "gas-pressure",
            Self::CutMode => "cut-mode",
        }
    }
}

impl fmt::Display for MaterialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MaterialKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| format!("Unknown material key: {}", key))
    }
}

/// Complete plasma material definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material number used by `M190 P<n>`
    pub number: u32,
    /// Display name
    pub name: String,
    /// Width of material removed by the torch
    pub kerf_width: f64,
    /// Torch height control enable flag
    pub thc: i32,
    /// Height above the plate while piercing
    pub pierce_height: f64,
    /// Delay after arc ok before moving, in seconds
    pub pierce_delay: f64,
    /// Puddle jump height as a percentage of pierce height
    pub puddle_jump_height: f64,
    /// Puddle jump delay, in seconds
    pub puddle_jump_delay: f64,
    /// Height above the plate while cutting
    pub cut_height: f64,
    /// Cut feed rate, used by torch height control
    pub cut_feed_rate: f64,
    /// Cutting current
    pub cut_amps: f64,
    /// Arc voltage set point
    pub cut_volts: f64,
    /// Pause at the end of a cut, in seconds
    pub pause_at_end: f64,
    /// Gas pressure for power sources that take it
    pub gas_pressure: f64,
    /// Cut mode for power sources that take it
    pub cut_mode: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            number: DEFAULT_MATERIAL,
            name: String::new(),
            kerf_width: 0.0,
            thc: 0,
            pierce_height: 0.0,
            pierce_delay: 0.0,
            puddle_jump_height: 0.0,
            puddle_jump_delay: 0.0,
            cut_height: 0.0,
            cut_feed_rate: 0.0,
            cut_amps: 15.0,
            cut_volts: 100.0,
            pause_at_end: 0.0,
            gas_pressure: 0.0,
            cut_mode: 0.0,
        }
    }
}

impl Material {
    /// Create a material with default cut parameters
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether `number` lies in the temporary range starting at `base`
    pub fn is_temporary_number(number: u32, base: u32) -> bool {
        number >= base
    }

    /// Value of `key` formatted for a material file
    pub fn value(&self, key: MaterialKey) -> String {
        match key {
            MaterialKey::Name => self.name.clone(),
            MaterialKey::KerfWidth => self.kerf_width.to_string(),
            MaterialKey::Thc => self.thc.to_string(),
            MaterialKey::PierceHeight => self.pierce_height.to_string(),
            MaterialKey::PierceDelay => self.pierce_delay.to_string(),
            MaterialKey::PuddleJumpHeight => self.puddle_jump_height.to_string(),
            MaterialKey::PuddleJumpDelay => self.puddle_jump_delay.to_string(),
            MaterialKey::CutHeight => self.cut_height.to_string(),
            MaterialKey::CutSpeed => self.cut_feed_rate.to_string(),
            MaterialKey::CutAmps => self.cut_amps.to_string(),
            MaterialKey::CutVolts => self.cut_volts.to_string(),
            MaterialKey::PauseAtEnd => self.pause_at_end.to_string(),
            MaterialKey::GasPressure => self.gas_pressure.to_string(),
            MaterialKey::CutMode => self.cut_mode.to_string(),
        }
    }

    /// Set `key` from its text form
    pub fn set_value(&mut self, key: MaterialKey, raw: &str) -> Result<(), String> {
        let raw = raw.trim();
        let slot = match key {
            MaterialKey::Name => {
                self.name = raw.to_string();
                return Ok(());
            }
            MaterialKey::Thc => {
                // THC is written as an integer but older files carry "1.0"
                self.thc = parse_number(key, raw)? as i32;
                return Ok(());
            }
            MaterialKey::KerfWidth => &mut self.kerf_width,
            MaterialKey::PierceHeight => &mut self.pierce_height,
            MaterialKey::PierceDelay => &mut self.pierce_delay,
            MaterialKey::PuddleJumpHeight => &mut self.puddle_jump_height,
            MaterialKey::PuddleJumpDelay => &mut self.puddle_jump_delay,
            MaterialKey::CutHeight => &mut self.cut_height,
            MaterialKey::CutSpeed => &mut self.cut_feed_rate,
            MaterialKey::CutAmps => &mut self.cut_amps,
            MaterialKey::CutVolts => &mut self.cut_volts,
            MaterialKey::PauseAtEnd => &mut self.pause_at_end,
            MaterialKey::GasPressure => &mut self.gas_pressure,
            MaterialKey::CutMode => &mut self.cut_mode,
        };
        *slot = parse_number(key, raw)?;
        Ok(())
    }

    /// Write this material as a material file section
    pub fn write_section<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}{}]", SECTION_PREFIX, self.number)?;
        for key in MaterialKey::ALL {
            writeln!(out, "{:<19}= {}", key.as_str(), self.value(key))?;
        }
        writeln!(out)
    }

    /// Write this material in the temporary material file layout
    pub fn write_temporary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "#plasmac temporary material file")?;
        writeln!(out)?;
        writeln!(out, "number={}", self.number)?;
        for key in MaterialKey::ALL {
            writeln!(out, "{}={}", key.temp_name(), self.value(key))?;
        }
        writeln!(out)
    }
}

fn parse_number(key: MaterialKey, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("Invalid value '{}' for {}", raw, key))
}

/// Parse a `[MATERIAL_NUMBER_<n>]` section header
pub fn parse_section_header(line: &str) -> Option<Result<u32, String>> {
    let line = line.trim();
    let rest = line.strip_prefix(SECTION_PREFIX)?;
    let number = rest.strip_suffix(']')?;
    Some(
        number
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid material number '{}'", number)),
    )
}
