use plasmakit_core::{
    CutType, Material, MaterialRegistry, RegistryPaths, Severity, StaticSignals, TEMP_MATERIAL_BASE,
};
use plasmakit_filter::{filter_program, normalize, FilterOptions, FilterOutput, ERROR_PROGRAM};
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const TOP_METRIC: &str =
    "g53 g0 z[#<_ini[axis_z]max_limit> * 1 - 0.000] (Z just below max height)";
const PIERCE: [&str; 5] = ["M3 $0 S1", "G91", "G1 X.000001", "G90", "M5 $0"];

fn registry() -> MaterialRegistry {
    MaterialRegistry::new(RegistryPaths {
        material_file: PathBuf::from("/nonexistent/plasmac_material.cfg"),
        prefs_file: PathBuf::from("/nonexistent/qtplasmac.prefs"),
        temp_material_file: PathBuf::from("/nonexistent/tmp/plasmac_material.gcode"),
    })
}

fn material(number: u32, feed: f64) -> Material {
    let mut material = Material::new(number, format!("Material {}", number));
    material.cut_feed_rate = feed;
    material
}

fn run(input: &str) -> FilterOutput {
    run_with(input, registry(), &mut StaticSignals::new())
}

fn run_with(input: &str, registry: MaterialRegistry, signals: &mut StaticSignals) -> FilterOutput {
    filter_program(input, registry, signals, FilterOptions::default())
}

fn codes(output: &FilterOutput) -> Vec<&str> {
    output.diagnostics.iter().map(|d| d.code.as_str()).collect()
}

fn hole_program(direction: u8, x: f64, y: f64, radius: f64) -> String {
    format!(
        "#<holes>=2\nG21\nG0 X{x:.3} Y{y:.3}\nM3 $0 S1\nG{direction} X{x:.3} Y{y:.3} I{radius:.3} J0\nM5 $0\nM2"
    )
}

#[test]
fn test_small_hole_with_overburn() {
    let output = run("#<holes>=2\nG21\nG0 X0 Y0\nM3 $0 S1\nG2 X0 Y0 I10 J0\nM5 $0\nM2");
    assert_eq!(
        output.lines,
        vec![
            "(velocity reduction for small holes)",
            "(overcut for small holes)",
            "g21",
            TOP_METRIC,
            "g0x0y0",
            "m3$0s1",
            "m67 e3 q60 (diameter:20.000, velocity:60%)",
            "g2x0y0i10j0",
            "m62 p3 (disable torch)",
            "g2 x0.7894 y3.8942 i10.0000 j0.0000",
            "m68 e3 q0 (arc complete, velocity 100%)",
            "m65 p3 (enable torch)",
            "m5$0",
            "(disable hole sensing)",
            "m2",
        ]
    );
    assert!(!output.has_errors());
    assert_eq!(codes(&output), vec!["clockwise_hole"]);
    assert_eq!(output.diagnostics[0].line, Some(8));
}

#[test]
fn test_counterclockwise_hole_has_no_warning() {
    let output = run(&hole_program(3, 5.0, 5.0, 8.0));
    assert!(output.diagnostics.is_empty());
    assert!(output
        .lines
        .iter()
        .any(|l| l == "m67 e3 q60 (diameter:16.000, velocity:60%)"));
}

#[test]
fn test_velocity_latch_released_by_next_motion() {
    let output = run("#<holes>=1\nG0 X0 Y0\nG3 X0 Y0 I5 J0\nG0 X50 Y50");
    let lines: Vec<&str> = output.lines.iter().map(String::as_str).collect();
    assert_eq!(
        &lines[lines.len() - 4..],
        &[
            "m67 e3 q60 (diameter:10.000, velocity:60%)",
            "g3x0y0i5j0",
            "m67 e3 q0 (arc complete, velocity 100%)",
            "g0x50y50",
        ]
    );
    assert!(!lines.iter().any(|l| l.starts_with("m62")));
}

#[test]
fn test_arc_assist_slows_open_arcs() {
    let output = run("#<holes>=3\nG0 X0 Y0\nG3 X10 Y10 I10 J0");
    assert!(output.lines.iter().any(|l| l.starts_with("m67 e3 q60")));

    let output = run("#<holes>=1\nG0 X0 Y0\nG3 X10 Y10 I10 J0");
    assert!(!output.lines.iter().any(|l| l.starts_with("m67")));
}

#[test]
fn test_hole_parameters() {
    let output = run(
        "#<holes>=1\n#<h_diameter>=10\n#<h_velocity>=40\nG0 X0 Y0\nG3 X0 Y0 I4 J0\nG3 X0 Y0 I6 J0",
    );
    assert!(output.lines.contains(&"(small hole diameter = 10)".to_string()));
    assert!(output.lines.contains(&"(small hole velocity = 40)".to_string()));
    assert!(output
        .lines
        .contains(&"m67 e3 q40 (diameter:8.000, velocity:40%)".to_string()));
    assert!(output.lines.contains(&"m67 e3 q0 (arc complete, velocity 100%)".to_string()));
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_deprecated_diameter_directive() {
    let output = run("#<m_diameter>=20");
    assert_eq!(output.lines, vec!["(small hole diameter = 20)"]);
    assert_eq!(codes(&output), vec!["deprecated_directive"]);
    assert!(!output.has_errors());
}

#[test]
fn test_overcut_length_directive() {
    let output = run("#<holes>=2\n#<oclength>=2\nG0 X0 Y0\nG3 X0 Y0 I10 J0");
    assert!(output.lines.contains(&"(overcut length = 2)".to_string()));
    let arc = output.lines.last().unwrap();
    assert!(arc.starts_with("g3 x"));
    assert!(arc.ends_with("i10.0000 j0.0000"));
}

#[test]
fn test_imperial_program_on_metric_machine() {
    let output = run("G20\n#<holes>=1\nG0 X0 Y0\nG3 X0 Y0 I0.5 J0");
    assert!(output.lines.contains(
        &"g53 g0 z[#<_ini[axis_z]max_limit> * 0.03937 - 0.000] (Z just below max height)"
            .to_string()
    ));
    assert!(output
        .lines
        .contains(&"m67 e3 q60 (diameter:1.000, velocity:60%)".to_string()));
}

#[test]
fn test_z_motion_commented_out() {
    let output = run("G0 X1 Y1\nG0 Z5 (raise)\nG1 X10 Z-1 (plunge)\nG1 Z-5");
    assert_eq!(
        output.lines,
        vec![
            TOP_METRIC,
            "g0x1y1",
            "(g0z5 raise)",
            "g1x10 (z-1) (plunge)",
            "(g1z-5)",
        ]
    );
}

#[test]
fn test_z_motion_under_hole_sensing_moves_cursor_and_restores_velocity() {
    let output = run("#<holes>=1\nG0 X0 Y0\nG3 X0 Y0 I5 J0\nG0 X20 Y0 Z3\nG3 X20 Y0 I5 J0");
    let reduce = "m67 e3 q60 (diameter:10.000, velocity:60%)";
    let position = |text: &str| output.lines.iter().position(|l| l == text).unwrap();

    let first_arc = position("g3x0y0i5j0");
    let restore = position("m67 e3 q0 (arc complete, velocity 100%)");
    let rapid = position("g0x20y0 (z3)");
    let second_arc = position("g3x20y0i5j0");
    assert_eq!(output.lines[first_arc - 1], reduce);
    assert_eq!(restore + 1, rapid);
    assert!(first_arc < restore);
    assert_eq!(output.lines[second_arc - 1], reduce);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_keep_z_motion() {
    let output = run("#<keep-z-motion>=1\nG0 Z5\n#<keep-z-motion>=0\nG0 Z5");
    assert_eq!(
        output.lines,
        vec![
            "#<keep-z-motion>=1",
            "g0z5",
            "#<keep-z-motion>=0",
            TOP_METRIC,
            "(g0z5)",
        ]
    );
}

#[test]
fn test_max_limit_move_replaced() {
    let output = run("G53 G0 Z[#<_ini[axis_z]max_limit> - 5]\nG0 X1\nG53 G0 Z[#<_ini[axis_z]max_limit> - 5]");
    assert_eq!(output.lines, vec![TOP_METRIC, "g0x1"]);
}

#[test]
fn test_max_z_offset_signal() {
    let mut signals = StaticSignals::new().with_max_z_offset(10.0);
    let output = run_with("G0 X1", registry(), &mut signals);
    assert_eq!(
        output.lines[0],
        "g53 g0 z[#<_ini[axis_z]max_limit> * 1 - 10.000] (Z just below max height)"
    );
}

#[test]
fn test_missing_material_gives_error_program() {
    let output = run("M190 P5\nM66 P3 L3 Q1\nM2");
    assert!(output.has_errors());
    assert_eq!(codes(&output), vec!["missing_material"]);
    assert_eq!(output.diagnostics[0].line, Some(1));
    assert_eq!(output.program(), ERROR_PROGRAM.to_vec());
}

#[test]
fn test_material_change_binds_and_restores() {
    let mut registry = registry();
    registry.insert(material(5, 4000.0));
    registry.insert(material(6, 4000.0));
    let mut signals = StaticSignals::new();
    let output = run_with(
        "M190 P5\nM66 P3 L3 Q1\nG1 X1 F4000\nM190 P6\nM66 P3 L3 Q1\nM2",
        registry,
        &mut signals,
    );
    assert!(output.diagnostics.is_empty());
    assert_eq!(
        output.lines,
        vec![
            "m190p5",
            "m66p3l3q1",
            TOP_METRIC,
            "g1x1f4000",
            "m190p6",
            "m66p3l3q1",
            "m2"
        ]
    );
    assert_eq!(signals.published, vec![5, 6, 5]);
}

#[test]
fn test_material_change_and_wait_on_one_line() {
    let mut registry = registry();
    registry.insert(material(5, 4000.0));
    let mut signals = StaticSignals::new();
    let output = run_with("M190 P5 M66 P3 L3 Q1\nM2", registry, &mut signals);
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.lines, vec!["m190p5m66p3l3q1", "m2"]);
    assert_eq!(signals.published, vec![5, 5]);
}

#[test]
fn test_feed_rate_warning_once() {
    let mut registry = registry();
    registry.insert(material(5, 2500.0));
    let output = run_with(
        "M190 P5\nG1 X1 F3000\nG1 X2 F3500\nG1 X3 F#<_hal[plasmac.cut-feed-rate]>",
        registry,
        &mut StaticSignals::new(),
    );
    assert_eq!(codes(&output), vec!["feed_rate_mismatch"]);
    let message = &output.diagnostics[0].message;
    assert!(message.contains("F3000"));
    assert!(message.contains("material #5 feed rate is F2500"));
    assert!(message.contains("F#<_hal[plasmac.cut-feed-rate]>"));
    assert!(!output.has_errors());
}

#[test]
fn test_feed_rate_uses_runtime_material() {
    let mut registry = registry();
    registry.insert(material(2, 0.0));
    let mut signals = StaticSignals::new().with_current_material(2);
    let output = run_with("G1 X1 F1000", registry, &mut signals);
    assert_eq!(codes(&output), vec!["feed_rate_mismatch"]);
    assert!(output.diagnostics[0]
        .message
        .contains("motion.requested-vel HAL pin"));
}

#[test]
fn test_incremental_mode_rejected_with_hole_sensing() {
    let output = run("G1 X1\n#<holes>=1\nG91");
    assert!(output.has_errors());
    assert_eq!(codes(&output), vec!["unsupported_distance_mode"]);
    assert_eq!(output.diagnostics[0].line, Some(4));

    assert!(!run("#<holes>=1\nG91.1").has_errors());
    assert!(run("#<holes>=1\nG90.1").has_errors());
    assert!(!run("G91\nG1 X1").has_errors());
}

#[test]
fn test_expression_rejected_with_hole_sensing() {
    let output = run("#<holes>=1\nG1 X[#<a>+1] Y0");
    assert!(output.has_errors());
    assert_eq!(codes(&output), vec!["non_literal_coordinate"]);
    assert!(output.diagnostics[0].message.contains("X word"));

    assert!(!run("G1 X[#<a>+1] Y0").has_errors());
}

#[test]
fn test_material_validation_with_compensation() {
    let mut registry = registry();
    registry.insert(material(5, 4000.0));
    let output = run_with("G41\nM190 P5\nM66 P3 L3 Q1", registry, &mut StaticSignals::new());
    assert_eq!(codes(&output), vec!["cutter_compensation_conflict"]);
    assert!(output.has_errors());
}

#[test]
fn test_compensation_disables_hole_commands() {
    let output = run("#<holes>=2\nG0 X0 Y0\nG42\nG3 X0 Y0 I5 J0");
    assert!(output
        .lines
        .contains(&";m67 e3 q0 (inactive due to g41)".to_string()));
    assert!(output.lines.contains(&";m62 p3 (inactive due to g41)".to_string()));
    assert_eq!(
        codes(&output),
        vec!["compensation_active", "compensation_active"]
    );
    assert!(!output.has_errors());
}

#[test]
fn test_pierce_only_directive() {
    let output = run(
        "#<pierce-only>=1\nG0 X10 Y10\nM3 $0 S1\nG1 X20\nM5 $0\nG0 X30 Y30\nM3 $0 S1\nM5 $0\nM2",
    );
    let mut expected = vec!["(pierce only mode)", TOP_METRIC, "", "(Pierce #1)", "g0x10y10"];
    expected.extend(PIERCE);
    expected.extend(["", "(Pierce #2)", "g0x30y30"]);
    expected.extend(PIERCE);
    expected.extend(["", "M2 (END)"]);
    assert_eq!(output.lines, expected);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_pierce_only_from_cut_type() {
    let mut signals = StaticSignals::new().with_cut_type(CutType::PierceOnly);
    let output = run_with("G0 X1 Y1\nM3 $0 S1\nM5 $0\nG0 X9 Y9", registry(), &mut signals);
    let mut expected = vec![TOP_METRIC, "(pierce only mode)", "g0x1y1", "", "(Pierce #1)"];
    expected.extend(PIERCE);
    expected.extend(["", "g0x9y9", "M2 (END)"]);
    assert_eq!(output.lines, expected);
}

#[test]
fn test_cut_type_activation_line_is_still_validated() {
    let mut signals = StaticSignals::new().with_cut_type(CutType::PierceOnly);
    let output = run_with(
        "M190 P5\nG0 X1 Y1\nM3 $0 S1\nM5 $0\nM2",
        registry(),
        &mut signals,
    );
    assert_eq!(codes(&output), vec!["missing_material"]);
    assert_eq!(output.diagnostics[0].line, Some(1));
    assert_eq!(output.program(), ERROR_PROGRAM.to_vec());
}

#[test]
fn test_cut_type_activation_line_applies_directive() {
    let mut registry = registry();
    registry.insert(material(5, 4000.0));
    let mut signals = StaticSignals::new().with_cut_type(CutType::PierceOnly);
    let output = run_with(
        "M190 P5\nG0 X1 Y1\nM3 $0 S1\nM5 $0",
        registry,
        &mut signals,
    );
    assert!(output.diagnostics.is_empty());
    assert_eq!(&output.lines[..2], ["(pierce only mode)", "m190p5"]);
    assert_eq!(signals.published, vec![5]);
}

#[test]
fn test_pierce_only_skips_spotting() {
    let output = run("#<pierce-only>=1\nM3 $2 S1\nG1 X1\nM5 $2\nG0 X1 Y1\nM3 $0 S1");
    assert!(output
        .lines
        .contains(&"(Ignoring spotting operation as pierce-only is active)".to_string()));
    assert!(!output.lines.contains(&"g1x1".to_string()));
    assert!(output.lines.contains(&"(Pierce #1)".to_string()));
}

#[test]
fn test_scribe_and_pierce_only_conflict() {
    let output = run("M3 $1 S1\n#<pierce-only>=1");
    assert_eq!(codes(&output), vec!["scribe_pierce_conflict"]);
    assert!(output.has_errors());

    let output = run("#<pierce-only>=1\nM3 $1 S1");
    assert_eq!(codes(&output), vec!["scribe_pierce_conflict"]);
    assert!(output.has_errors());
}

#[test]
fn test_temporary_material_directive() {
    let dir = TempDir::new().unwrap();
    let temp_file = dir.path().join("tmp").join("plasmac_material.gcode");
    let registry = MaterialRegistry::new(RegistryPaths {
        material_file: dir.path().join("plasmac_material.cfg"),
        prefs_file: dir.path().join("qtplasmac.prefs"),
        temp_material_file: temp_file.clone(),
    });
    let mut signals = StaticSignals::new();
    let output = run_with(
        "(o=0, kw=1.2, ph=3.8, pd=0.4, ch=1.5, fr=2500)\nG1 X1 F2500\nM2",
        registry,
        &mut signals,
    );

    let number = TEMP_MATERIAL_BASE;
    assert_eq!(
        output.lines,
        vec![
            format!("m190 p{} (Temporary {})", number, number),
            "m66 p3 l3 q1".to_string(),
            TOP_METRIC.to_string(),
            "g1x1f2500".to_string(),
            "m2".to_string(),
        ]
    );
    assert!(output.diagnostics.is_empty());
    assert_eq!(signals.temp_requests, vec![number]);
    assert!(signals.published.is_empty());
    assert!(fs::read_to_string(temp_file)
        .unwrap()
        .contains("pierce-height=3.8"));
}

#[test]
fn test_temporary_material_keeps_file_material_for_restore() {
    let dir = TempDir::new().unwrap();
    let mut registry = MaterialRegistry::new(RegistryPaths {
        material_file: dir.path().join("plasmac_material.cfg"),
        prefs_file: dir.path().join("qtplasmac.prefs"),
        temp_material_file: dir.path().join("tmp").join("plasmac_material.gcode"),
    });
    registry.insert(material(2, 2500.0));
    let mut signals = StaticSignals::new();
    let output = run_with(
        "M190 P2\nM66 P3 L3 Q1\n(o=0, kw=1.2, ph=3.8, pd=0.4, ch=1.5, fr=2500)\nG1 X1 F2500\nM2",
        registry,
        &mut signals,
    );

    assert!(output.diagnostics.is_empty());
    assert_eq!(signals.temp_requests, vec![TEMP_MATERIAL_BASE]);
    assert_eq!(signals.published, vec![2, 2]);
}

#[test]
fn test_invalid_directive_is_a_warning() {
    let output = run("(o=0, ph=3)\nG0 X1");
    assert_eq!(codes(&output), vec!["invalid_material_directive"]);
    assert_eq!(output.diagnostics[0].severity, Severity::Warning);
    assert_eq!(output.lines, vec![TOP_METRIC, "g0x1"]);
}

#[test]
fn test_line_numbers_are_stripped() {
    let output = run("N10 G0 X1\nN20 G01 X2 ; feed");
    assert_eq!(output.lines, vec![TOP_METRIC, "g0x1", "g1x2 ( feed)"]);
}

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(raw in "[NGXYZMnxyz0-9 .;()-]{0,30}") {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once.to_string()), once);
    }

    #[test]
    fn prop_small_hole_gets_one_overburn(
        radius in 0.5f64..16.0,
        x in -100.0f64..100.0,
        y in -100.0f64..100.0,
        direction in prop::sample::select(vec![2u8, 3u8]),
    ) {
        let output = run(&hole_program(direction, x, y, radius));
        let torch_off = output.lines.iter().filter(|l| *l == "m62 p3 (disable torch)").count();
        let prefix = format!("g{} x", direction);
        let continuation = output.lines.iter().filter(|l| l.starts_with(&prefix)).count();
        prop_assert_eq!(torch_off, 1);
        prop_assert_eq!(continuation, 1);
        prop_assert!(!output.has_errors());

        // The endpoint lies on the circle, 4mm of arc past the start
        let rounded = |v: f64| format!("{:.3}", v).parse::<f64>().unwrap();
        let (x, y, radius) = (rounded(x), rounded(y), rounded(radius));
        let arc = output.lines.iter().find(|l| l.starts_with(&prefix)).unwrap();
        let coord = |letter: char| -> f64 {
            arc.split_whitespace()
                .find_map(|w| w.strip_prefix(letter))
                .unwrap()
                .parse()
                .unwrap()
        };
        let (cx, cy) = (x + radius, y);
        let (ex, ey) = (coord('x') - cx, coord('y') - cy);
        prop_assert!(((ex * ex + ey * ey).sqrt() - radius).abs() < 1e-3);
        let cos_a = ((x - cx) * ex + (y - cy) * ey) / (radius * radius);
        prop_assert!((cos_a - (4.0 / radius).cos()).abs() < 1e-3);
    }

    #[test]
    fn prop_large_arc_keeps_full_velocity(
        radius in 16.5f64..500.0,
        direction in prop::sample::select(vec![2u8, 3u8]),
    ) {
        let output = run(&hole_program(direction, 0.0, 0.0, radius));
        prop_assert!(!output.lines.iter().any(|l| l.starts_with("m67")));
        prop_assert!(!output.lines.iter().any(|l| l.starts_with("m62")));
    }
}
