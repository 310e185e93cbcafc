//! Line normalization
//!
//! Brings every input line into the canonical form the filter matches
//! against: line numbers removed, code lower-cased with whitespace removed,
//! trailing comments kept verbatim.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A line after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedLine {
    /// `(o=...)` material edit directive, untouched apart from trimming
    MaterialEdit(String),
    /// Whole-line comment, passed through as is
    Comment(String),
    /// Code with an optional trailing comment
    Code {
        /// Lower-cased code with whitespace removed
        code: String,
        /// Trailing comment in parenthesized form, e.g. `(rough pass)`
        comment: Option<String>,
    },
}

impl NormalizedLine {
    /// Code portion, empty for comments and directives
    pub fn code(&self) -> &str {
        match self {
            Self::Code { code, .. } => code,
            _ => "",
        }
    }
}

impl fmt::Display for NormalizedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaterialEdit(text) | Self::Comment(text) => write!(f, "{}", text),
            Self::Code {
                code,
                comment: Some(comment),
            } => write!(f, "{} {}", code, comment),
            Self::Code { code, comment: None } => write!(f, "{}", code),
        }
    }
}

/// Normalize one raw input line
pub fn normalize(raw: &str) -> NormalizedLine {
    let line = strip_line_number(raw.trim());

    if line.starts_with("(o=") {
        return NormalizedLine::MaterialEdit(line.to_string());
    }
    if line.starts_with(';') || line.starts_with('(') {
        return NormalizedLine::Comment(line.to_string());
    }

    let (code, comment) = match line.find([';', '(']) {
        Some(pos) if line[pos..].starts_with(';') => {
            (&line[..pos], Some(format!("({})", &line[pos + 1..])))
        }
        Some(pos) => (&line[..pos], Some(line[pos..].to_string())),
        None => (line, None),
    };

    let code: String = code
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    NormalizedLine::Code {
        code: strip_leading_zeros(code),
        comment,
    }
}

/// Remove `N<number>` prefixes, including repeated ones
fn strip_line_number(mut line: &str) -> &str {
    static LINE_NUMBER: OnceLock<Regex> = OnceLock::new();
    let regex = LINE_NUMBER
        .get_or_init(|| Regex::new(r"^[nN]\s*[0-9.][0-9.\s]*").expect("invalid regex pattern"));
    while let Some(m) = regex.find(line) {
        line = &line[m.end()..];
    }
    line
}

/// `g01` -> `g1`, `m003` -> `m3`; `g0` and `g0x1` are left alone
fn strip_leading_zeros(mut code: String) -> String {
    if !(code.starts_with('g') || code.starts_with('m')) {
        return code;
    }
    while code.len() > 2 && code.as_bytes()[1] == b'0' && code.as_bytes()[2].is_ascii_digit() {
        code.remove(1);
    }
    code
}
