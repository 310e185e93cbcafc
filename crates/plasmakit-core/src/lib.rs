//! # PlasmaKit Core
//!
//! Core types shared by the PlasmaKit filter crates.
//!
//! This crate provides:
//! - The error taxonomy and its severity classification
//! - Linear units and small hole thresholds
//! - Material records, the material file and the material registry
//! - The machine signal seam and its implementations

pub mod data;
pub mod error;
pub mod signals;
pub mod units;

pub use data::{
    AckPolicy, EditMode, EditOutcome, Material, MaterialKey, MaterialRegistry, PreferenceDefaults,
    RegistryPaths, DEFAULT_MATERIAL, TEMP_MATERIAL_BASE,
};
pub use error::{Error, FilterError, MaterialFileError, Result, ScribePierceOrder, Severity};
pub use signals::{wait_for_ack, CutType, FileSignals, MachineSignals, StaticSignals};
pub use units::{LinearUnits, UnitContext, INCH_PER_MM, MM_PER_INCH};
