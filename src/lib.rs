//! # PlasmaKit
//!
//! G-code filter for plasma cutting tables running a LinuxCNC style motion
//! controller. The filter reads a program, rewrites it for the plasma
//! runtime and prints the result on stdout.
//!
//! ## Architecture
//!
//! PlasmaKit is organized as a workspace with multiple crates:
//!
//! 1. **plasmakit-core** - Errors, units, material records and the material
//!    registry, machine signals
//! 2. **plasmakit-settings** - Configuration file loading and validation
//! 3. **plasmakit-filter** - Line normalization and the filter rules
//! 4. **plasmakit** - The `plasmakit-filter` binary

pub use plasmakit_core::{
    CutType, Error, FileSignals, FilterError, LinearUnits, Material, MaterialRegistry,
    MachineSignals, Severity, StaticSignals,
};
pub use plasmakit_filter::{
    filter_program, Diagnostic, FilterOptions, FilterOutput, PlasmaFilter, ERROR_PROGRAM,
};
pub use plasmakit_settings::{default_config_path, FilterConfig};

use std::io::{self, Write};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// How diagnostics are written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DiagnosticFormat {
    /// `WARNING line 12: ...`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Initialize logging
///
/// Logs go to stderr so stdout carries only the program. `RUST_LOG`
/// overrides the level picked from `verbosity`.
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Write diagnostics one per line
pub fn render_diagnostics<W: Write>(
    diagnostics: &[Diagnostic],
    format: DiagnosticFormat,
    out: &mut W,
) -> io::Result<()> {
    for diagnostic in diagnostics {
        match format {
            DiagnosticFormat::Text => writeln!(out, "{}", diagnostic)?,
            DiagnosticFormat::Json => {
                let json = diagnostic.to_json().map_err(io::Error::other)?;
                writeln!(out, "{}", json)?;
            }
        }
    }
    Ok(())
}
