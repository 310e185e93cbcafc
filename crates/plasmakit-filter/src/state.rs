//! Pass state
//!
//! Everything the filter remembers between lines of one program: mode
//! flags, the velocity latch, the tracked X/Y cursor and the pierce-only
//! bookkeeping. Transitions live here as methods so the processor reads
//! as a sequence of rules.

use crate::geometry::Point;
use plasmakit_core::{LinearUnits, UnitContext};

/// Small hole handling selected with `#<holes>=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoleProfile {
    #[default]
    Off,
    /// Velocity reduction for small holes
    Velocity,
    /// Velocity reduction and overcut for small holes
    VelocityOvercut,
    /// Velocity reduction for small holes and arcs
    VelocityArcs,
    /// Velocity reduction for small holes and arcs, overcut for holes
    VelocityArcsOvercut,
}

impl HoleProfile {
    /// Profile for the first character of a `#<holes>=` value
    pub fn from_selector(value: &str) -> Self {
        match value.chars().next() {
            Some('1') => Self::Velocity,
            Some('2') => Self::VelocityOvercut,
            Some('3') => Self::VelocityArcs,
            Some('4') => Self::VelocityArcsOvercut,
            _ => Self::Off,
        }
    }

    pub fn enabled(self) -> bool {
        self != Self::Off
    }

    pub fn arc_assist(self) -> bool {
        matches!(self, Self::VelocityArcs | Self::VelocityArcsOvercut)
    }

    pub fn overcut(self) -> bool {
        matches!(self, Self::VelocityOvercut | Self::VelocityArcsOvercut)
    }

    /// Comments announcing the profile, in output order
    pub fn comments(self) -> &'static [&'static str] {
        match self {
            Self::Off => &["(disable small hole sensing)"],
            Self::Velocity => &["(velocity reduction for small holes)"],
            Self::VelocityOvercut => &[
                "(velocity reduction for small holes)",
                "(overcut for small holes)",
            ],
            Self::VelocityArcs => &["(velocity reduction for small holes and arcs)"],
            Self::VelocityArcsOvercut => &[
                "(velocity reduction for small holes and arcs)",
                "(overcut for small holes)",
            ],
        }
    }
}

/// Pierce-only extraction state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PierceOnly {
    /// Pierces emitted so far
    pub pierces: u32,
    /// Last rapid move, held until the next pierce
    pub rapid: Option<String>,
    /// Inside a spotting block
    pub spotting: bool,
}

impl PierceOnly {
    /// Lines kept outside the pierce sequences
    ///
    /// Everything passes until the first pierce; after that only `o` word
    /// flow control and `#` parameter assignments do.
    pub fn passes(&self, code: &str) -> bool {
        self.pierces == 0 || code.starts_with('o') || code.starts_with('#')
    }
}

/// Mutable state of one filter pass
#[derive(Debug, Clone)]
pub struct PassState {
    pub units: UnitContext,
    pub hole_velocity: f64,
    pub holes: HoleProfile,
    /// A velocity reduction is in effect
    pub velocity_latched: bool,
    pub compensation: bool,
    pub pierce_only: Option<PierceOnly>,
    pub scribing: bool,
    pub torch_enabled: bool,
    pub z_bypass: bool,
    pub z_setup: bool,
    pub feed_warning_issued: bool,
    pub pierce_conflict_reported: bool,
    pub cursor: Point,
}

impl PassState {
    pub fn new(machine_units: LinearUnits, hole_velocity: f64) -> Self {
        Self {
            units: UnitContext::new(machine_units),
            hole_velocity,
            holes: HoleProfile::Off,
            velocity_latched: false,
            compensation: false,
            pierce_only: None,
            scribing: false,
            torch_enabled: true,
            z_bypass: false,
            z_setup: false,
            feed_warning_issued: false,
            pierce_conflict_reported: false,
            cursor: Point::default(),
        }
    }

    pub fn hole_sensing(&self) -> bool {
        self.holes.enabled()
    }

    /// Latch velocity reduction; false if it was already latched
    pub fn latch_velocity(&mut self) -> bool {
        !std::mem::replace(&mut self.velocity_latched, true)
    }

    /// Clear the velocity latch; true if it was set
    pub fn release_velocity(&mut self) -> bool {
        std::mem::replace(&mut self.velocity_latched, false)
    }

    /// Re-enable the torch; true if it was disabled
    pub fn enable_torch(&mut self) -> bool {
        !std::mem::replace(&mut self.torch_enabled, true)
    }

    pub fn disable_torch(&mut self) {
        self.torch_enabled = false;
    }

    /// Turn hole sensing off; true if it was on
    pub fn disable_hole_sensing(&mut self) -> bool {
        std::mem::replace(&mut self.holes, HoleProfile::Off).enabled()
    }

    pub fn start_pierce_only(&mut self) {
        self.pierce_only = Some(PierceOnly::default());
    }

    pub fn pierce_only_active(&self) -> bool {
        self.pierce_only.is_some()
    }

    /// Move the cursor to whichever of `x` and `y` are given
    pub fn move_cursor(&mut self, x: Option<f64>, y: Option<f64>) {
        if let Some(x) = x {
            self.cursor.x = x;
        }
        if let Some(y) = y {
            self.cursor.y = y;
        }
    }
}
