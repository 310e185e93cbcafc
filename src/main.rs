use anyhow::{Context, Result};
use clap::Parser;
use plasmakit::{
    default_config_path, init_logging, render_diagnostics, CutType, DiagnosticFormat,
    FileSignals, FilterConfig, FilterOptions, LinearUnits, MachineSignals, MaterialRegistry,
    PlasmaFilter, BUILD_DATE, VERSION,
};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

/// Rewrite a G-code program for a plasma cutting table
#[derive(Parser, Debug)]
#[command(name = "plasmakit-filter", version, about)]
struct Cli {
    /// G-code program to filter
    input: PathBuf,

    /// Configuration file (TOML or JSON)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Machine linear units, overrides the configuration
    #[arg(long)]
    units: Option<LinearUnits>,

    /// Material file, overrides the configuration
    #[arg(long)]
    material_file: Option<PathBuf>,

    /// Preferences file, overrides the configuration
    #[arg(long)]
    prefs_file: Option<PathBuf>,

    /// Temporary material file, overrides the configuration
    #[arg(long)]
    temp_material_file: Option<PathBuf>,

    /// Directory of signal files shared with the motion runtime
    #[arg(long)]
    signals_dir: Option<PathBuf>,

    /// Cut type when no signals directory is used
    #[arg(long)]
    cut_type: Option<CutType>,

    /// Diagnostic output format on stderr
    #[arg(long, value_enum, default_value_t = DiagnosticFormat::Text)]
    diagnostics: DiagnosticFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    tracing::debug!("plasmakit-filter {} built {}", VERSION, BUILD_DATE);

    let config = load_config(&cli)?;
    let mut registry = MaterialRegistry::new(config.registry_paths())
        .with_ack_policy(config.ack_policy())
        .with_temp_base(config.filter.temp_material_base);
    if let Err(e) = registry.load() {
        tracing::warn!("Cannot load materials: {}", e);
    }

    let options = FilterOptions {
        machine_units: config.machine.linear_units,
        hole_velocity: config.filter.hole_velocity,
    };

    match config.paths.signals_dir.clone() {
        Some(dir) => run(&cli, registry, &mut FileSignals::new(dir), options),
        None => run(&cli, registry, &mut config.static_signals(), options),
    }
}

fn load_config(cli: &Cli) -> Result<FilterConfig> {
    let mut config = match &cli.config {
        Some(path) => FilterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => match default_config_path() {
            Ok(path) => FilterConfig::load_or_default(&path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            Err(e) => {
                tracing::debug!("{}, using default configuration", e);
                FilterConfig::default()
            }
        },
    };

    if let Some(units) = cli.units {
        config.machine.linear_units = units;
    }
    if let Some(path) = &cli.material_file {
        config.paths.material_file = Some(path.clone());
    }
    if let Some(path) = &cli.prefs_file {
        config.paths.prefs_file = Some(path.clone());
    }
    if let Some(path) = &cli.temp_material_file {
        config.paths.temp_material_file = Some(path.clone());
    }
    if let Some(dir) = &cli.signals_dir {
        config.paths.signals_dir = Some(dir.clone());
    }
    if let Some(cut_type) = cli.cut_type {
        config.signals.cut_type = cut_type;
    }
    Ok(config)
}

fn run<S: MachineSignals>(
    cli: &Cli,
    registry: MaterialRegistry,
    signals: &mut S,
    options: FilterOptions,
) -> Result<()> {
    let file = File::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;

    let mut filter = PlasmaFilter::new(registry, signals, options);
    filter
        .process_reader(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let output = filter.finish();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    output.write_program(&mut out)?;
    out.flush()?;

    render_diagnostics(&output.diagnostics, cli.diagnostics, &mut io::stderr().lock())?;
    Ok(())
}
