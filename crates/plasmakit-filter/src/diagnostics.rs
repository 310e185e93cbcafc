//! Diagnostics collected during a pass
//!
//! The filter never presents problems itself. Every rule violation and
//! advisory note becomes a [`Diagnostic`] the caller renders as it sees fit.

use plasmakit_core::{FilterError, Severity};
use serde::Serialize;
use std::fmt;

/// Codes of advisory warnings that are not part of the error taxonomy
pub mod advisory {
    pub const FEED_RATE_MISMATCH: &str = "feed_rate_mismatch";
    pub const CLOCKWISE_HOLE: &str = "clockwise_hole";
    pub const DEPRECATED_DIRECTIVE: &str = "deprecated_directive";
    pub const COMPENSATION_ACTIVE: &str = "compensation_active";
    pub const MATERIAL_FILE: &str = "material_file";
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    /// Program line the problem was found on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn from_error(error: &FilterError, line: Option<u32>) -> Self {
        Self {
            severity: error.severity(),
            code: error.code().to_string(),
            message: error.to_string(),
            line,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            line,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Single line JSON form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} line {}: {}", self.severity, line, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Ordered diagnostics of one pass
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!("{}", diagnostic);
        self.records.push(diagnostic);
    }

    pub fn error(&mut self, error: FilterError, line: Option<u32>) {
        self.push(Diagnostic::from_error(&error, line));
    }

    pub fn warning(&mut self, code: &str, message: impl Into<String>, line: u32) {
        self.push(Diagnostic::warning(code, message, Some(line)));
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(Diagnostic::is_error)
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }
}
