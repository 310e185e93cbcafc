//! # PlasmaKit Filter
//!
//! Rewrites G-code for a plasma cutting table before it reaches the motion
//! controller.
//!
//! Each line is normalized, split into words and passed through an ordered
//! set of rules:
//! - Z motion is commented out and a single safe Z move is added
//! - Small holes get a velocity reduction and, optionally, an overburn arc
//!   cut with the torch off
//! - Material changes are validated against the material registry and
//!   in-file material edits are written back
//! - Pierce-only mode reduces the program to its pierce sequences
//!
//! Problems are collected as [`Diagnostic`]s; any error replaces the
//! output with [`ERROR_PROGRAM`].

pub mod diagnostics;
pub mod directives;
pub mod emitter;
pub mod geometry;
pub mod normalizer;
pub mod processor;
pub mod state;
pub mod words;

pub use diagnostics::{advisory, Diagnostic, Diagnostics};
pub use directives::{parse_material_directive, MaterialDirective};
pub use emitter::{LineEmitter, ERROR_PROGRAM};
pub use geometry::{continuation_arc, ArcDirection, ArcMove, Point};
pub use normalizer::{normalize, NormalizedLine};
pub use processor::{filter_program, FilterOptions, FilterOutput, PlasmaFilter};
pub use state::{HoleProfile, PassState, PierceOnly};
