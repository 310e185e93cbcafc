//! Plasma G-code filter
//!
//! [`PlasmaFilter`] rewrites a program one line at a time. Each normalized
//! line runs through an ordered list of rules; the first rule that consumes
//! the line ends its processing. Some rules only update state and let the
//! line continue to later rules.

use crate::diagnostics::{advisory, Diagnostic, Diagnostics};
use crate::directives::{leading_number, parameter_assignment, parse_material_directive};
use crate::emitter::{LineEmitter, ERROR_PROGRAM};
use crate::geometry::{continuation_arc, ArcDirection, ArcMove, Point};
use crate::normalizer::{normalize, NormalizedLine};
use crate::state::{HoleProfile, PassState};
use crate::words::{self, Word, WordValue};
use plasmakit_core::data::{EditMode, MaterialRegistry};
use plasmakit_core::error::{Error, FilterError, ScribePierceOrder};
use plasmakit_core::signals::{CutType, MachineSignals};
use plasmakit_core::LinearUnits;
use std::io::{self, BufRead, Write};

const MAX_LIMIT_REF: &str = "[#<_ini[axis_z]max_limit>";
const FEED_RATE_MACRO: &str = "#<_hal[plasmac.cut-feed-rate]>";
const VELOCITY_RESTORE: &str = "m67 e3 q0 (arc complete, velocity 100%)";
const VELOCITY_RESTORE_SYNC: &str = "m68 e3 q0 (arc complete, velocity 100%)";
const TORCH_ENABLE: &str = "m65 p3 (enable torch)";
const TORCH_DISABLE: &str = "m62 p3 (disable torch)";

/// Options fixed for the whole pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOptions {
    /// Linear units the machine is configured in
    pub machine_units: LinearUnits,
    /// Velocity percentage applied to small holes
    pub hole_velocity: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            machine_units: LinearUnits::Metric,
            hole_velocity: 60.0,
        }
    }
}

/// Result of a complete pass
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// Transformed program, valid only when there are no errors
    pub lines: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FilterOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Program to hand to the controller
    ///
    /// The fixed error program replaces the transformed one as soon as a
    /// single error was recorded.
    pub fn program(&self) -> Vec<&str> {
        if self.has_errors() {
            ERROR_PROGRAM.to_vec()
        } else {
            self.lines.iter().map(String::as_str).collect()
        }
    }

    /// Write the program, one line per entry
    pub fn write_program<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in self.program() {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

/// How a line interacted with pierce-only activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    None,
    /// The line was the `#<pierce-only>` directive
    Consumed,
    /// The cut type signal switched the mode on at this line
    Signalled,
}

/// A normalized code line with its words
struct CodeLine {
    code: String,
    comment: Option<String>,
    words: Vec<Word>,
}

impl CodeLine {
    fn new(code: String, comment: Option<String>) -> Self {
        let words = words::tokenize(&code);
        Self {
            code,
            comment,
            words,
        }
    }

    fn text(&self) -> String {
        match &self.comment {
            Some(comment) => format!("{} {}", self.code, comment),
            None => self.code.clone(),
        }
    }

    fn has(&self, letter: char, number: f64) -> bool {
        words::has(&self.words, letter, number)
    }

    fn word(&self, letter: char) -> Option<&Word> {
        words::find(&self.words, letter)
    }

    fn literal(&self, letter: char) -> Option<f64> {
        self.word(letter).and_then(|w| w.value.literal())
    }

    fn first_is(&self, letter: char, number: f64) -> bool {
        self.words.first().is_some_and(|w| w.is(letter, number))
    }
}

/// Single-pass plasma G-code filter
pub struct PlasmaFilter<'a, S: MachineSignals> {
    registry: MaterialRegistry,
    signals: &'a mut S,
    state: PassState,
    emitter: LineEmitter,
    diagnostics: Diagnostics,
}

impl<'a, S: MachineSignals> PlasmaFilter<'a, S> {
    /// Create a filter over a loaded registry
    pub fn new(registry: MaterialRegistry, signals: &'a mut S, options: FilterOptions) -> Self {
        Self {
            registry,
            signals,
            state: PassState::new(options.machine_units, options.hole_velocity),
            emitter: LineEmitter::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn state(&self) -> &PassState {
        &self.state
    }

    pub fn registry(&self) -> &MaterialRegistry {
        &self.registry
    }

    /// Run every line of `input` through the filter
    pub fn process_reader<R: BufRead>(&mut self, input: R) -> io::Result<()> {
        for line in input.lines() {
            self.process_line(&line?);
        }
        Ok(())
    }

    /// Run every line of `text` through the filter
    pub fn process_str(&mut self, text: &str) {
        for line in text.lines() {
            self.process_line(line);
        }
    }

    /// Process one raw input line
    pub fn process_line(&mut self, raw: &str) {
        self.emitter.next_input_line();
        match normalize(raw) {
            NormalizedLine::MaterialEdit(text) => self.material_edit(&text),
            NormalizedLine::Comment(text) => self.emitter.emit(text),
            NormalizedLine::Code { code, comment } => {
                self.process_code(CodeLine::new(code, comment))
            }
        }
    }

    /// End the pass
    pub fn finish(mut self) -> FilterOutput {
        if let Some(pierce) = self.state.pierce_only.take() {
            self.emitter.emit("");
            if let Some(rapid) = pierce.rapid {
                self.emitter.emit(rapid);
            }
            self.emitter.emit("M2 (END)");
        }
        let output = FilterOutput {
            lines: self.emitter.into_lines(),
            diagnostics: self.diagnostics.into_records(),
        };
        if output.has_errors() {
            tracing::warn!("Program has errors, emitting the error program");
        }
        output
    }

    fn line(&self) -> u32 {
        self.emitter.line_number()
    }

    fn error(&mut self, error: FilterError) {
        let line = Some(self.line());
        self.diagnostics.error(error, line);
    }

    fn warning(&mut self, code: &str, message: impl Into<String>) {
        let line = self.line();
        self.diagnostics.warning(code, message, line);
    }

    fn process_code(&mut self, line: CodeLine) {
        let Some(line) = self.z_motion_rules(line) else {
            return;
        };
        self.modal_rules(&line);

        if line.code.starts_with("m3$1s") {
            self.scribe_start(&line);
            return;
        }
        match self.pierce_only_activation(&line) {
            Activation::Consumed => return,
            Activation::Signalled => {}
            Activation::None if self.state.pierce_only_active() => {
                self.pierce_only_line(&line);
                return;
            }
            Activation::None => {}
        }
        if self.parameter_directive(&line) {
            return;
        }
        if line.code.starts_with("m190") {
            self.material_change(&line);
            if !line.has('m', 66.0) {
                self.emitter.emit(line.text());
                return;
            }
        }
        if line.has('m', 66.0) {
            if self.state.compensation {
                self.error(FilterError::CutterCompensationConflict {
                    action: "validate a material change".to_string(),
                });
            }
            self.emitter.emit(line.text());
            return;
        }
        if self.state.hole_sensing() {
            self.check_hole_sensing_input(&line);
        }
        if !self.state.z_bypass && self.suppress_z(&line) {
            return;
        }
        if Self::is_arc(&line) {
            if self.state.hole_sensing() {
                self.arc(&line);
            } else {
                self.emitter.emit(line.text());
            }
            return;
        }
        if self.torch_command(&line) {
            return;
        }
        if line.first_is('m', 5.0) {
            self.spindle_stop(&line);
            return;
        }
        if line.has('m', 2.0) || line.has('m', 30.0) || line.code.starts_with('%') {
            self.program_end(&line);
            return;
        }
        if let Some(feed) = line.word('f') {
            if let WordValue::Literal(feed) = feed.value {
                self.check_feed(feed);
            } else if !feed.raw.starts_with(FEED_RATE_MACRO) {
                tracing::debug!("Skipping feed check for non-literal feed {}", feed.raw);
            }
        }
        self.default_line(&line);
    }

    /// Z bypass toggle, redundant max height moves and the initial safe Z
    ///
    /// Returns `None` when the line was consumed.
    fn z_motion_rules(&mut self, line: CodeLine) -> Option<CodeLine> {
        if let Some(("keep-z-motion", value)) = parameter_assignment(&line.code) {
            self.state.z_bypass = value.starts_with('1');
            tracing::debug!("Z motion bypass {}", self.state.z_bypass);
            self.emitter.emit(line.text());
            return None;
        }
        if self.state.z_setup && line.code.contains(MAX_LIMIT_REF) {
            return None;
        }
        let motion = line.has('g', 0.0) || line.has('g', 1.0) || line.has('m', 3.0);
        if !self.state.z_setup && !self.state.z_bypass && motion {
            self.state.z_setup = true;
            let units = &self.state.units;
            let top = format!(
                "g53 g0 z[#<_ini[axis_z]max_limit> * {} - {:.3}] (Z just below max height)",
                units.multiplier(),
                units.top_z_offset(self.signals.max_z_offset())
            );
            if line.code.contains(MAX_LIMIT_REF) {
                self.emitter.emit(top);
                return None;
            }
            self.emitter.inject(top);
        }
        Some(line)
    }

    /// Units and cutter compensation; never consumes the line
    fn modal_rules(&mut self, line: &CodeLine) {
        if line.has('g', 21.0) {
            self.state.units.select_units(LinearUnits::Metric);
        } else if line.has('g', 20.0) {
            self.state.units.select_units(LinearUnits::Imperial);
        }
        if line.has('g', 41.0) || line.has('g', 42.0) {
            self.state.compensation = true;
        } else if line.has('g', 40.0) {
            self.state.compensation = false;
        }
    }

    fn scribe_start(&mut self, line: &CodeLine) {
        if self.state.pierce_only_active() {
            self.error(FilterError::ScribePierceConflict(
                ScribePierceOrder::ScribeDuringPierceOnly,
            ));
            return;
        }
        self.state.scribing = true;
        self.emitter.emit(line.text());
    }

    fn pierce_only_line(&mut self, line: &CodeLine) {
        let Some(pierce) = self.state.pierce_only.as_mut() else {
            return;
        };
        if line.code.starts_with("m3$2") {
            pierce.spotting = true;
            self.emitter
                .emit("(Ignoring spotting operation as pierce-only is active)");
            return;
        }
        if pierce.spotting {
            if line.code.starts_with("m5$2") {
                pierce.spotting = false;
            }
            return;
        }
        if line.code.starts_with("g0") {
            pierce.rapid = Some(line.text());
            return;
        }
        if line.first_is('m', 3.0) && !line.code.starts_with("m3$1") {
            pierce.pierces += 1;
            let number = pierce.pierces;
            let rapid = pierce.rapid.take();
            self.emitter.emit("");
            self.emitter.emit(format!("(Pierce #{})", number));
            if let Some(rapid) = rapid {
                self.emitter.emit(rapid);
            }
            for cmd in ["M3 $0 S1", "G91", "G1 X.000001", "G90", "M5 $0"] {
                self.emitter.emit(cmd);
            }
            return;
        }
        if pierce.passes(&line.code) {
            self.emitter.emit(line.text());
        }
    }

    /// Enter pierce-only mode on request
    ///
    /// The `#<pierce-only>=1` directive is consumed. A line that triggered
    /// activation through the cut type signal goes on through the normal
    /// rules.
    fn pierce_only_activation(&mut self, line: &CodeLine) -> Activation {
        if self.state.pierce_only_active() {
            return Activation::None;
        }
        let directive = matches!(
            parameter_assignment(&line.code),
            Some(("pierce-only", value)) if value.starts_with('1')
        );
        if !directive && self.signals.cut_type() != CutType::PierceOnly {
            return Activation::None;
        }
        let outcome = if directive {
            Activation::Consumed
        } else {
            Activation::Signalled
        };

        if self.state.scribing {
            if directive || !self.state.pierce_conflict_reported {
                self.state.pierce_conflict_reported = true;
                self.error(FilterError::ScribePierceConflict(
                    ScribePierceOrder::PierceOnlyDuringScribe,
                ));
            }
            return outcome;
        }
        tracing::debug!("Pierce-only mode enabled");
        self.state.start_pierce_only();
        self.emitter.emit("(pierce only mode)");
        outcome
    }

    /// Overcut length, small hole diameter and velocity, hole profile
    fn parameter_directive(&mut self, line: &CodeLine) -> bool {
        let Some((name, value)) = parameter_assignment(&line.code) else {
            return false;
        };
        match name {
            "holes" => {
                let profile = HoleProfile::from_selector(value);
                self.state.holes = profile;
                let comments = profile.comments();
                if let Some((first, rest)) = comments.split_first() {
                    self.emitter.emit(*first);
                    for comment in rest {
                        self.emitter.inject(*comment);
                    }
                }
                true
            }
            "oclength" | "h_diameter" | "m_diameter" | "i_diameter" | "h_velocity" => {
                let Some(number) = leading_number(value) else {
                    self.warning(
                        advisory::INVALID_PARAMETER,
                        format!("Cannot read a number from #<{}>={}", name, value),
                    );
                    self.emitter.emit(line.text());
                    return true;
                };
                match name {
                    "oclength" => {
                        self.state.units.override_overburn_length(number);
                        self.emitter.emit(format!("(overcut length = {})", number));
                    }
                    "h_velocity" => {
                        self.state.hole_velocity = number;
                        self.emitter
                            .emit(format!("(small hole velocity = {})", number));
                    }
                    _ => {
                        self.state.units.override_min_diameter(number);
                        self.emitter
                            .emit(format!("(small hole diameter = {})", number));
                        if name != "h_diameter" {
                            self.warning(
                                advisory::DEPRECATED_DIRECTIVE,
                                format!(
                                    "#<{}> is deprecated in favour of #<h_diameter>, the diameter {} will read as being in the current units of the G-Code file",
                                    name, number
                                ),
                            );
                        }
                    }
                }
                true
            }
            _ => false,
        }
    }

    fn material_change(&mut self, line: &CodeLine) {
        match line.literal('p') {
            Some(number) if number >= 0.0 && number.fract() == 0.0 => {
                if let Err(e) = self.registry.bind(number as u32, &mut *self.signals) {
                    self.error(e);
                }
            }
            _ => self.warning(
                advisory::INVALID_PARAMETER,
                "Material change without a literal material number",
            ),
        }
    }

    fn check_hole_sensing_input(&mut self, line: &CodeLine) {
        if line.has('g', 91.0) {
            self.error(FilterError::UnsupportedDistanceMode {
                mode: "G91".to_string(),
            });
        } else if line.has('g', 90.1) {
            self.error(FilterError::UnsupportedDistanceMode {
                mode: "G90.1".to_string(),
            });
        }
        for axis in ['x', 'y', 'i', 'j'] {
            if line.word(axis).is_some_and(|w| w.value.is_expression()) {
                self.error(FilterError::NonLiteralCoordinate {
                    axis: axis.to_ascii_uppercase(),
                });
            }
        }
    }

    /// Comment out Z motion; returns true when the line was consumed
    fn suppress_z(&mut self, line: &CodeLine) -> bool {
        let Some(z) = line
            .words
            .iter()
            .find(|w| w.letter == 'z' && matches!(w.value, WordValue::Literal(_)))
        else {
            return false;
        };

        let other_axis = line
            .words
            .iter()
            .any(|w| matches!(w.letter, 'x' | 'y' | 'b' | 'c' | 'u' | 'v' | 'w'));
        if !other_axis {
            let commented = match &line.comment {
                Some(comment) => format!(
                    "({} {}",
                    line.code,
                    comment.strip_prefix('(').unwrap_or(comment)
                ),
                None => format!("({})", line.code),
            };
            self.emitter.emit(commented);
            return true;
        }

        if self.state.hole_sensing() {
            self.state.move_cursor(line.literal('x'), line.literal('y'));
        }
        if self.state.release_velocity() {
            self.emitter.inject(VELOCITY_RESTORE);
        }
        let mut code = line.code.clone();
        code.replace_range(z.span.clone(), "");
        let mut text = format!("{} (z{})", code, z.raw);
        if let Some(comment) = &line.comment {
            text.push(' ');
            text.push_str(comment);
        }
        self.emitter.emit(text);
        true
    }

    fn is_arc(line: &CodeLine) -> bool {
        (line.code.starts_with("g2") || line.code.starts_with("g3"))
            && line
                .code
                .as_bytes()
                .get(2)
                .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn arc(&mut self, line: &CodeLine) {
        let start = self.state.cursor;
        let arc = ArcMove {
            direction: if line.code.starts_with("g2") {
                ArcDirection::Clockwise
            } else {
                ArcDirection::CounterClockwise
            },
            start,
            end: Point::new(
                line.literal('x').unwrap_or(start.x),
                line.literal('y').unwrap_or(start.y),
            ),
            i: line.literal('i').unwrap_or(0.0),
            j: line.literal('j').unwrap_or(0.0),
        };
        let radius = arc.radius();
        let max_radius = self.state.units.max_small_radius();

        if arc.needs_velocity_reduction(max_radius, self.state.holes.arc_assist()) {
            if self.state.compensation {
                self.emitter.inject(";m67 e3 q0 (inactive due to g41)");
                self.warning(
                    advisory::COMPENSATION_ACTIVE,
                    "Cannot reduce velocity with cutter compensation active",
                );
            } else if self.state.latch_velocity() {
                let velocity = self.state.hole_velocity;
                self.emitter.inject(format!(
                    "m67 e3 q{0} (diameter:{1:.3}, velocity:{0}%)",
                    velocity,
                    radius * 2.0
                ));
            }
            if arc.direction == ArcDirection::Clockwise && arc.is_hole() {
                self.warning(
                    advisory::CLOCKWISE_HOLE,
                    "This cut appears to be a hole cut clockwise, small holes are normally cut counterclockwise",
                );
            }
        } else if self.state.release_velocity() {
            self.emitter.inject(VELOCITY_RESTORE);
        }

        self.emitter.emit(line.text());

        let overburn = arc.is_hole() && self.state.holes.overcut() && radius <= max_radius;
        let end = if overburn {
            arc.overburn_end(self.state.units.overburn_length())
        } else {
            None
        };
        let Some(end) = end else {
            self.state.cursor = arc.end;
            return;
        };

        if self.state.compensation {
            self.emitter.inject(";m62 p3 (inactive due to g41)");
            self.warning(
                advisory::COMPENSATION_ACTIVE,
                "Cannot enable/disable torch with cutter compensation active",
            );
        } else {
            self.emitter.inject(TORCH_DISABLE);
            self.state.disable_torch();
        }
        let precision = self.state.units.active_units().precision();
        self.emitter.inject(continuation_arc(&arc, end, precision));
        self.state.cursor = end;
    }

    fn torch_command(&mut self, line: &CodeLine) -> bool {
        let code = line.code.as_str();
        if code.starts_with("m62p3") || code.starts_with("m64p3") {
            self.state.disable_torch();
        } else if code.starts_with("m63p3") || code.starts_with("m65p3") {
            self.state.enable_torch();
        } else {
            return false;
        }
        self.emitter.emit(line.text());
        true
    }

    fn spindle_stop(&mut self, line: &CodeLine) {
        if self.state.release_velocity() {
            self.emitter.inject(VELOCITY_RESTORE_SYNC);
        }
        if self.state.enable_torch() {
            self.emitter.inject(TORCH_ENABLE);
        }
        self.emitter.emit(line.text());
    }

    fn program_end(&mut self, line: &CodeLine) {
        if self.state.release_velocity() {
            self.emitter.inject(VELOCITY_RESTORE_SYNC);
        }
        if self.state.enable_torch() {
            self.emitter.inject(TORCH_ENABLE);
        }
        if self.state.disable_hole_sensing() {
            self.emitter.inject("(disable hole sensing)");
        }
        if let Some(restore) = self.registry.restore() {
            self.signals.publish_material_change(restore);
        }
        self.emitter.emit(line.text());
    }

    fn check_feed(&mut self, feed: f64) {
        if self.state.feed_warning_issued {
            return;
        }
        let number = self
            .registry
            .current()
            .unwrap_or_else(|| self.signals.current_material());
        let Some(cut_feed) = self.registry.get(number).map(|m| m.cut_feed_rate) else {
            return;
        };
        if feed == cut_feed {
            return;
        }

        let dec = self.state.units.machine_units().feed_precision();
        let thc = if cut_feed != 0.0 {
            format!("THC calculations will use the material #{} feed rate which may cause issues", number)
        } else {
            "THC calculations will use the motion.requested-vel HAL pin which is not recommended"
                .to_string()
        };
        self.warning(
            advisory::FEED_RATE_MISMATCH,
            format!(
                "G-Code feed rate is F{:.dec$} and material #{} feed rate is F{:.dec$}. {}. Use F{} with a valid cut feed rate in the material. No other feed rates have been checked",
                feed, number, cut_feed, thc, FEED_RATE_MACRO,
                dec = dec
            ),
        );
        self.state.feed_warning_issued = true;
    }

    fn default_line(&mut self, line: &CodeLine) {
        if self.state.release_velocity() {
            self.emitter.inject(VELOCITY_RESTORE);
        }
        if self.state.hole_sensing()
            && line
                .code
                .starts_with(|c: char| matches!(c, 'g' | 'x' | 'y'))
        {
            self.state.move_cursor(line.literal('x'), line.literal('y'));
        }
        self.emitter.emit(line.text());
    }

    fn material_edit(&mut self, text: &str) {
        let directive = match parse_material_directive(text) {
            Ok(directive) => directive,
            Err(e) => {
                self.error(e);
                return;
            }
        };
        tracing::debug!("Material edit {:?} for #{}", directive.mode, directive.material.number);

        let outcome = match self
            .registry
            .create_or_edit(directive.material, directive.mode, &mut *self.signals)
        {
            Ok(outcome) => outcome,
            Err(Error::Filter(e)) => {
                self.error(e);
                return;
            }
            Err(e) => {
                self.warning(
                    advisory::MATERIAL_FILE,
                    format!("Cannot add or edit material from G-Code file: {}", e),
                );
                return;
            }
        };
        if let Some(timeout) = outcome.timeout {
            self.diagnostics.error(timeout, None);
        }
        if directive.mode == EditMode::Temporary {
            self.emitter
                .emit(format!("m190 p{} ({})", outcome.number, outcome.name));
            self.emitter.emit("m66 p3 l3 q1");
            if let Err(e) = self.registry.select_temporary(outcome.number) {
                self.error(e);
            }
        }
    }
}

/// Filter a whole program held in memory
pub fn filter_program<S: MachineSignals>(
    text: &str,
    registry: MaterialRegistry,
    signals: &mut S,
    options: FilterOptions,
) -> FilterOutput {
    let mut filter = PlasmaFilter::new(registry, signals, options);
    filter.process_str(text);
    filter.finish()
}
