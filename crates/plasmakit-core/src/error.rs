//! Error handling for PlasmaKit
//!
//! Provides the error types shared by every layer of the filter:
//! - Filter errors (the validation taxonomy raised while rewriting a program)
//! - Material file errors (reading and rewriting material records)
//!
//! All error types use `thiserror` for ergonomic error handling.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// How a problem affects the transformed program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recorded and reported; the program is still produced.
    Warning,
    /// The whole transformed program is replaced by the error program.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Filter error type
///
/// Represents the conditions the filter refuses to pass silently to the
/// motion controller. Each variant knows its own [`Severity`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A material change references a number that is not in the registry
    #[error("Material #{number} is missing from the material file")]
    MissingMaterial {
        /// The material number that was requested.
        number: u32,
    },

    /// A material change references a temporary material that was not
    /// created earlier in this pass
    #[error("The G-Code file contains a reference to temporary material #{number}")]
    MissingTemporaryMaterial {
        /// The temporary material number that was requested.
        number: u32,
    },

    /// A create-new directive names a material number already in use
    #[error("Cannot add new material #{number}, material number is in use")]
    DuplicateMaterial {
        /// The material number that already exists.
        number: u32,
    },

    /// A material edit directive could not be parsed
    #[error("Cannot add or edit material from G-Code file: {reason}")]
    InvalidMaterialDirective {
        /// Why the directive was rejected.
        reason: String,
    },

    /// An expression was used where hole sensing needs a literal value
    #[error("Hole sensing requires explicit values, found an expression in the {axis} word")]
    NonLiteralCoordinate {
        /// The axis letter carrying the expression.
        axis: char,
    },

    /// Incremental distance or absolute arc distance is in use
    #[error("Unsupported distance mode {mode}, only G90 with arc distance mode G91.1 is supported")]
    UnsupportedDistanceMode {
        /// The offending mode word, e.g. `G91`.
        mode: String,
    },

    /// An operation cannot be performed safely while cutter compensation is active
    #[error("Cannot {action} with cutter compensation active")]
    CutterCompensationConflict {
        /// The operation that was requested.
        action: String,
    },

    /// Scribing and pierce-only mode were both requested
    #[error("{0}")]
    ScribePierceConflict(ScribePierceOrder),

    /// The motion side did not acknowledge a material change in time
    #[error("{what} was not acknowledged within {timeout_ms}ms")]
    AcknowledgmentTimeout {
        /// What was waiting for acknowledgment.
        what: String,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

/// Which of the two mutually exclusive modes was active first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScribePierceOrder {
    /// A scribe start was found while pierce-only mode was active.
    ScribeDuringPierceOnly,
    /// Pierce-only mode was requested while scribing.
    PierceOnlyDuringScribe,
}

impl std::fmt::Display for ScribePierceOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScribeDuringPierceOnly => write!(f, "Scribe is invalid for pierce only mode"),
            Self::PierceOnlyDuringScribe => write!(f, "Pierce only mode is invalid while scribing"),
        }
    }
}

impl FilterError {
    /// Classify the error
    ///
    /// Directive-local material problems and acknowledgment timeouts only
    /// discard their own output; everything else fails the whole pass.
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateMaterial { .. }
            | Self::InvalidMaterialDirective { .. }
            | Self::AcknowledgmentTimeout { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Short stable identifier used by machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingMaterial { .. } | Self::MissingTemporaryMaterial { .. } => {
                "missing_material"
            }
            Self::DuplicateMaterial { .. } => "duplicate_material",
            Self::InvalidMaterialDirective { .. } => "invalid_material_directive",
            Self::NonLiteralCoordinate { .. } => "non_literal_coordinate",
            Self::UnsupportedDistanceMode { .. } => "unsupported_distance_mode",
            Self::CutterCompensationConflict { .. } => "cutter_compensation_conflict",
            Self::ScribePierceConflict(_) => "scribe_pierce_conflict",
            Self::AcknowledgmentTimeout { .. } => "acknowledgment_timeout",
        }
    }

    /// Create an invalid directive error from a message
    pub fn invalid_directive(reason: impl Into<String>) -> Self {
        Self::InvalidMaterialDirective {
            reason: reason.into(),
        }
    }
}

/// Material file error type
///
/// Represents failures reading or rewriting the material file, the
/// preferences file or the temporary material file.
#[derive(Error, Debug)]
pub enum MaterialFileError {
    /// A file could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A line could not be parsed
    #[error("Parse error in {path} at line {line}: {reason}")]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// The 1-based line number.
        line: usize,
        /// Why the line was rejected.
        reason: String,
    },

    /// The rewritten file could not replace the original
    #[error("Failed to replace {path}: {source}")]
    Persist {
        /// The file being replaced.
        path: PathBuf,
        /// The underlying persist error.
        #[source]
        source: tempfile::PersistError,
    },
}

impl MaterialFileError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Main error type for PlasmaKit
///
/// A unified error type used by operations that can fail either on a
/// filter rule or on material file access.
#[derive(Error, Debug)]
pub enum Error {
    /// Filter error
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Material file error
    #[error(transparent)]
    MaterialFile(#[from] MaterialFileError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Severity of this error when surfaced as a diagnostic
    ///
    /// Material file access failures never fail the pass; the material
    /// edit that needed them is dropped instead.
    pub fn severity(&self) -> Severity {
        match self {
            Error::Filter(e) => e.severity(),
            Error::MaterialFile(_) | Error::Io(_) => Severity::Warning,
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Filter(FilterError::AcknowledgmentTimeout { .. })
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
