//! Output line assembly

/// Program returned in place of the transformed one when errors were found
pub const ERROR_PROGRAM: [&str; 7] = [
    "(The original G-Code file)",
    "(has one or more errors)",
    "",
    "(All errors require fixing)",
    "(before reloading the file)",
    "",
    "M2",
];

/// Collects output lines and keeps the running line counter
///
/// The counter advances once per input line and once per injected line,
/// so it tracks the line numbers of the program as the controller sees it.
#[derive(Debug, Clone, Default)]
pub struct LineEmitter {
    lines: Vec<String>,
    line_number: u32,
}

impl LineEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for the next input line
    pub fn next_input_line(&mut self) {
        self.line_number += 1;
    }

    /// Emit a line in place of the current input line
    pub fn emit(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Emit a synthesized line
    pub fn inject(&mut self, line: impl Into<String>) {
        self.line_number += 1;
        self.lines.push(line.into());
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
