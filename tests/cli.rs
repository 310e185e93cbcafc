//! CLI tests for the `plasmakit-filter` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use assert_cmd::cargo;
use tempfile::TempDir;

const MATERIALS: &str = "\
[MATERIAL_NUMBER_1]
NAME               = Mild Steel 3mm
PIERCE_HEIGHT      = 3.8
PIERCE_DELAY       = 0.2
CUT_HEIGHT         = 1.5
CUT_SPEED          = 2500
";

fn write_config(dir: &Path) -> std::path::PathBuf {
    let material_file = dir.join("plasmac_material.cfg");
    fs::write(&material_file, MATERIALS).unwrap();
    fs::write(
        dir.join("qtplasmac.prefs"),
        "[PLASMA_PARAMETERS]\nCut feed rate = 3000\nKerf width = 1\n",
    )
    .unwrap();
    let config = dir.join("config.toml");
    fs::write(
        &config,
        format!(
            "[machine]\nname = \"plasmac\"\nlinear_units = \"metric\"\n\n\
             [paths]\nmaterial_file = \"{}\"\nprefs_file = \"{}\"\ntemp_material_file = \"{}\"\n",
            material_file.display(),
            dir.join("qtplasmac.prefs").display(),
            dir.join("tmp").join("plasmac_material.gcode").display(),
        ),
    )
    .unwrap();
    config
}

fn filter(dir: &Path, program: &str, extra: &[&str]) -> Output {
    let config = write_config(dir);
    let input = dir.join("part.ngc");
    fs::write(&input, program).unwrap();
    Command::new(cargo::cargo_bin!("plasmakit-filter"))
        .arg("--config")
        .arg(&config)
        .args(extra)
        .arg(&input)
        .output()
        .expect("run plasmakit-filter")
}

#[test]
fn small_hole_program_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let output = filter(
        dir.path(),
        "#<holes>=2\nM190 P1\nM66 P3 L3 Q1\nG0 X0 Y0\nM3 $0 S1\nG3 X0 Y0 I5 J0\nM5 $0\nM2\n",
        &[],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("m67 e3 q60 (diameter:10.000, velocity:60%)"));
    assert!(stdout.contains("m62 p3 (disable torch)"));
    assert!(stdout.trim_end().ends_with("m2"));
}

#[test]
fn missing_material_prints_error_program() {
    let dir = TempDir::new().unwrap();
    let output = filter(dir.path(), "M190 P9\nM66 P3 L3 Q1\nM2\n", &[]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("(The original G-Code file)"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR line 1: Material #9 is missing"), "stderr: {stderr}");
}

#[test]
fn json_diagnostics() {
    let dir = TempDir::new().unwrap();
    let output = filter(
        dir.path(),
        "M190 P1\nG1 X1 F3000\n",
        &["--diagnostics", "json"],
    );

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let json: serde_json::Value = stderr
        .lines()
        .find_map(|line| serde_json::from_str(line).ok())
        .expect("a json diagnostic");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["code"], "feed_rate_mismatch");
}

#[test]
fn cut_type_flag_enables_pierce_only() {
    let dir = TempDir::new().unwrap();
    let output = filter(
        dir.path(),
        "G0 X1 Y1\nM3 $0 S1\nG1 X5\nM5 $0\n",
        &["--cut-type", "pierce-only"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(pierce only mode)"));
    assert!(stdout.contains("(Pierce #1)"));
    assert!(!stdout.contains("g1x5"));
    assert!(stdout.trim_end().ends_with("M2 (END)"));
}

#[test]
fn signals_dir_receives_material_change() {
    let dir = TempDir::new().unwrap();
    let signals = dir.path().join("signals");
    fs::create_dir(&signals).unwrap();
    let output = filter(
        dir.path(),
        "M190 P1\nM66 P3 L3 Q1\nM2\n",
        &["--signals-dir", signals.to_str().unwrap()],
    );

    assert!(output.status.success());
    let pin = fs::read_to_string(signals.join("material_change_number")).unwrap();
    assert_eq!(pin.trim(), "1");
}

#[test]
fn missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let output = Command::new(cargo::cargo_bin!("plasmakit-filter"))
        .arg("--config")
        .arg(&config)
        .arg(dir.path().join("missing.ngc"))
        .output()
        .expect("run plasmakit-filter");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open"));
}
