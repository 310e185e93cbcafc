//! Unit and threshold handling
//!
//! Tracks the machine's linear units, the units the G-code file switches
//! to with G20/G21, and the small hole thresholds that depend on both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimetres per inch, as used for the unit multiplier
pub const MM_PER_INCH: f64 = 25.4;

/// Inches per millimetre, with the precision the controller configs use
pub const INCH_PER_MM: f64 = 0.03937;

/// Linear units of the machine or of a G-code file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnits {
    /// Millimetres
    #[default]
    #[serde(alias = "mm")]
    Metric,
    /// Inches
    #[serde(alias = "inch", alias = "in")]
    Imperial,
}

impl LinearUnits {
    /// Decimal places used when synthesizing coordinates
    pub fn precision(self) -> usize {
        match self {
            Self::Metric => 4,
            Self::Imperial => 6,
        }
    }

    /// Decimal places used when quoting feed rates
    pub fn feed_precision(self) -> usize {
        match self {
            Self::Metric => 0,
            Self::Imperial => 1,
        }
    }

    /// Default smallest diameter that still counts as a small hole
    pub fn default_min_diameter(self) -> f64 {
        match self {
            Self::Metric => 32.0,
            Self::Imperial => 1.26,
        }
    }

    /// Default arc length cut past the end of a small hole
    pub fn default_overburn_length(self) -> f64 {
        match self {
            Self::Metric => 4.0,
            Self::Imperial => 0.157,
        }
    }

    /// Machine units per millimetre
    pub fn units_per_mm(self) -> f64 {
        match self {
            Self::Metric => 1.0,
            Self::Imperial => INCH_PER_MM,
        }
    }
}

impl fmt::Display for LinearUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "mm"),
            Self::Imperial => write!(f, "in"),
        }
    }
}

impl FromStr for LinearUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" | "mm" => Ok(Self::Metric),
            "imperial" | "inch" | "in" => Ok(Self::Imperial),
            _ => Err(format!("Unknown linear units: {}", s)),
        }
    }
}

/// Unit and threshold context for one filter pass
///
/// Thresholds start at the machine unit defaults. A G20/G21 that differs
/// from the machine units sets the unit multiplier and, unless the program
/// overrode them, moves the thresholds to the file unit defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitContext {
    machine: LinearUnits,
    active: LinearUnits,
    multiplier: f64,
    min_diameter: f64,
    overburn_length: f64,
    custom_diameter: bool,
    custom_overburn: bool,
}

impl UnitContext {
    /// Create a context for a machine configured in `machine` units
    pub fn new(machine: LinearUnits) -> Self {
        Self {
            machine,
            active: machine,
            multiplier: 1.0,
            min_diameter: machine.default_min_diameter(),
            overburn_length: machine.default_overburn_length(),
            custom_diameter: false,
            custom_overburn: false,
        }
    }

    /// Machine linear units
    pub fn machine_units(&self) -> LinearUnits {
        self.machine
    }

    /// Units the program currently runs in
    pub fn active_units(&self) -> LinearUnits {
        self.active
    }

    /// Factor converting machine units into file units
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Smallest diameter treated as a small hole
    pub fn min_diameter(&self) -> f64 {
        self.min_diameter
    }

    /// Arc length cut past the end of a small hole
    pub fn overburn_length(&self) -> f64 {
        self.overburn_length
    }

    /// Radius at or below which an arc counts as small
    pub fn max_small_radius(&self) -> f64 {
        self.min_diameter / 2.0
    }

    /// Apply a G20/G21 units word
    pub fn select_units(&mut self, units: LinearUnits) {
        self.active = units;
        self.multiplier = match (self.machine, units) {
            (LinearUnits::Imperial, LinearUnits::Metric) => MM_PER_INCH,
            (LinearUnits::Metric, LinearUnits::Imperial) => INCH_PER_MM,
            _ => 1.0,
        };
        if !self.custom_diameter {
            self.min_diameter = units.default_min_diameter();
        }
        if !self.custom_overburn {
            self.overburn_length = units.default_overburn_length();
        }
    }

    /// User override of the small hole diameter
    pub fn override_min_diameter(&mut self, diameter: f64) {
        self.min_diameter = diameter;
        self.custom_diameter = true;
    }

    /// User override of the overburn length
    pub fn override_overburn_length(&mut self, length: f64) {
        self.overburn_length = length;
        self.custom_overburn = true;
    }

    /// Offset below the Z max limit, converted into file units
    pub fn top_z_offset(&self, max_z_offset: f64) -> f64 {
        max_z_offset * self.machine.units_per_mm() * self.multiplier
    }
}

impl Default for UnitContext {
    fn default() -> Self {
        Self::new(LinearUnits::default())
    }
}
