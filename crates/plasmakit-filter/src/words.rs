//! Word tokenizer for normalized code
//!
//! Splits the code portion of a normalized line into address words such as
//! `g2`, `x10.5` or `f#<_hal[plasmac.cut-feed-rate]>`. Letters inside
//! `[...]` expressions and `#<...>` parameter names belong to the value of
//! the word they appear in.

use std::ops::Range;

/// Value of an address word
#[derive(Debug, Clone, PartialEq)]
pub enum WordValue {
    /// Plain number
    Literal(f64),
    /// Expression or parameter reference, starting with `[` or `#`
    Expression(String),
    /// Anything else, including an empty value
    Other(String),
}

impl WordValue {
    fn parse(raw: &str) -> Self {
        if raw.starts_with('[') || raw.starts_with('#') {
            return Self::Expression(raw.to_string());
        }
        match raw.parse::<f64>() {
            Ok(value) if !raw.is_empty() => Self::Literal(value),
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn literal(&self) -> Option<f64> {
        match self {
            Self::Literal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }
}

/// One address word of a code line
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    /// Lower-case address letter, or `$`
    pub letter: char,
    pub value: WordValue,
    /// Value exactly as written
    pub raw: String,
    /// Byte range of the whole word in the code
    pub span: Range<usize>,
}

impl Word {
    /// Whether this is `<letter><number>`, e.g. `g91` but not `g91.1`
    pub fn is(&self, letter: char, number: f64) -> bool {
        self.letter == letter
            && self
                .value
                .literal()
                .is_some_and(|v| (v - number).abs() < 1e-9)
    }
}

fn is_address(c: char) -> bool {
    c.is_ascii_lowercase() || c == '$'
}

/// Tokenize normalized code into words
///
/// Text before the first address letter, such as a leading `#<name>=`
/// assignment, produces no words.
pub fn tokenize(code: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<(char, usize)> = None;
    let mut depth = 0usize;
    let mut in_name = false;
    let mut prev = '\0';

    let close = |current: Option<(char, usize)>, end: usize, words: &mut Vec<Word>| {
        if let Some((letter, start)) = current {
            let raw = &code[start + 1..end];
            words.push(Word {
                letter,
                value: WordValue::parse(raw),
                raw: raw.to_string(),
                span: start..end,
            });
        }
    };

    for (idx, c) in code.char_indices() {
        if in_name {
            in_name = c != '>';
        } else if c == '<' && prev == '#' {
            in_name = true;
        } else if c == '[' {
            depth += 1;
        } else if c == ']' {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && is_address(c) {
            close(current.take(), idx, &mut words);
            current = Some((c, idx));
        }
        prev = c;
    }
    close(current.take(), code.len(), &mut words);
    words
}

/// Find the first word with `letter`
pub fn find(words: &[Word], letter: char) -> Option<&Word> {
    words.iter().find(|w| w.letter == letter)
}

/// Whether any word is exactly `<letter><number>`
pub fn has(words: &[Word], letter: char, number: f64) -> bool {
    words.iter().any(|w| w.is(letter, number))
}
