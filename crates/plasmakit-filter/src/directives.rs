//! In-file directives
//!
//! Two kinds of directive appear in plasma programs:
//! - Material edits, `(o=<0|1|2>, nu=<n>, na=<name>, ph=..., ...)`
//! - Named parameter assignments, `#<holes>=2`, `#<h_velocity>=40`
//!
//! Material edits are tokenized into a typed key list; anything malformed
//! is rejected as an invalid directive.

use plasmakit_core::data::{EditMode, Material};
use plasmakit_core::FilterError;
use regex::Regex;
use std::sync::OnceLock;

/// Field of a material edit directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKey {
    Number,
    Name,
    KerfWidth,
    Thc,
    PierceHeight,
    PierceDelay,
    PuddleJumpHeight,
    PuddleJumpDelay,
    CutHeight,
    FeedRate,
    CutAmps,
    CutVolts,
    PauseAtEnd,
    GasPressure,
    CutMode,
}

impl DirectiveKey {
    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "nu" => Self::Number,
            "na" => Self::Name,
            "kw" => Self::KerfWidth,
            "th" => Self::Thc,
            "ph" => Self::PierceHeight,
            "pd" => Self::PierceDelay,
            "jh" => Self::PuddleJumpHeight,
            "jd" => Self::PuddleJumpDelay,
            "ch" => Self::CutHeight,
            "fr" => Self::FeedRate,
            "ca" => Self::CutAmps,
            "cv" => Self::CutVolts,
            "pe" => Self::PauseAtEnd,
            "gp" => Self::GasPressure,
            "cm" => Self::CutMode,
            _ => return None,
        })
    }

    fn code(self) -> &'static str {
        match self {
            Self::Number => "nu",
            Self::Name => "na",
            Self::KerfWidth => "kw",
            Self::Thc => "th",
            Self::PierceHeight => "ph",
            Self::PierceDelay => "pd",
            Self::PuddleJumpHeight => "jh",
            Self::PuddleJumpDelay => "jd",
            Self::CutHeight => "ch",
            Self::FeedRate => "fr",
            Self::CutAmps => "ca",
            Self::CutVolts => "cv",
            Self::PauseAtEnd => "pe",
            Self::GasPressure => "gp",
            Self::CutMode => "cm",
        }
    }
}

/// Fields every material edit must carry
const MANDATORY: [DirectiveKey; 4] = [
    DirectiveKey::PierceHeight,
    DirectiveKey::PierceDelay,
    DirectiveKey::CutHeight,
    DirectiveKey::FeedRate,
];

/// A parsed material edit directive
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDirective {
    pub mode: EditMode,
    /// Record to apply; the number is reassigned for temporary materials
    pub material: Material,
}

/// Parse a `(o=...)` material edit line
pub fn parse_material_directive(line: &str) -> Result<MaterialDirective, FilterError> {
    let body = line
        .trim()
        .strip_prefix('(')
        .ok_or_else(|| FilterError::invalid_directive("directive must start with '('"))?;
    let body = body.split_once(')').map_or(body, |(inside, _)| inside);

    let mut items = body
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim()))
                .ok_or_else(|| FilterError::invalid_directive(format!("malformed item '{}'", item)))
        });

    let (selector_key, selector) = items
        .next()
        .ok_or_else(|| FilterError::invalid_directive("empty directive"))??;
    if selector_key != "o" {
        return Err(FilterError::invalid_directive("directive must start with o="));
    }
    let mode = selector
        .parse::<u32>()
        .map_err(|_| FilterError::invalid_directive(format!("unknown operation selector o={}", selector)))
        .and_then(|n| EditMode::try_from(n).map_err(FilterError::invalid_directive))?;

    let mut material = Material::new(0, "");
    let mut seen = Vec::new();
    for item in items {
        let (key, value) = item?;
        let key = DirectiveKey::from_code(&key)
            .ok_or_else(|| FilterError::invalid_directive(format!("unknown parameter '{}'", key)))?;
        apply(&mut material, key, value)?;
        seen.push(key);
    }

    let mut required: Vec<DirectiveKey> = MANDATORY.to_vec();
    if mode != EditMode::Temporary {
        required.extend([DirectiveKey::Number, DirectiveKey::Name]);
    }
    if let Some(missing) = required.iter().find(|k| !seen.contains(k)) {
        return Err(FilterError::invalid_directive(format!(
            "missing mandatory parameter '{}'",
            missing.code()
        )));
    }

    Ok(MaterialDirective { mode, material })
}

fn apply(material: &mut Material, key: DirectiveKey, value: &str) -> Result<(), FilterError> {
    let number = || {
        value.parse::<f64>().map_err(|_| {
            FilterError::invalid_directive(format!("invalid value '{}' for '{}'", value, key.code()))
        })
    };
    match key {
        DirectiveKey::Number => {
            material.number = value.parse::<u32>().map_err(|_| {
                FilterError::invalid_directive(format!("invalid material number '{}'", value))
            })?
        }
        DirectiveKey::Name => material.name = value.to_string(),
        DirectiveKey::Thc => {
            material.thc = value.parse::<i32>().map_err(|_| {
                FilterError::invalid_directive(format!("invalid value '{}' for 'th'", value))
            })?
        }
        DirectiveKey::KerfWidth => material.kerf_width = number()?,
        DirectiveKey::PierceHeight => material.pierce_height = number()?,
        DirectiveKey::PierceDelay => material.pierce_delay = number()?,
        DirectiveKey::PuddleJumpHeight => material.puddle_jump_height = number()?,
        DirectiveKey::PuddleJumpDelay => material.puddle_jump_delay = number()?,
        DirectiveKey::CutHeight => material.cut_height = number()?,
        DirectiveKey::FeedRate => material.cut_feed_rate = number()?,
        DirectiveKey::CutAmps => material.cut_amps = number()?,
        DirectiveKey::CutVolts => material.cut_volts = number()?,
        DirectiveKey::PauseAtEnd => material.pause_at_end = number()?,
        DirectiveKey::GasPressure => material.gas_pressure = number()?,
        DirectiveKey::CutMode => material.cut_mode = number()?,
    }
    Ok(())
}

/// Split a `#<name>=value` assignment
pub fn parameter_assignment(code: &str) -> Option<(&str, &str)> {
    static ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
    let regex = ASSIGNMENT
        .get_or_init(|| Regex::new(r"^#<([^>]+)>=(.*)$").expect("invalid regex pattern"));
    let caps = regex.captures(code)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Leading number of a parameter value, e.g. `10` in `10;small`
pub fn leading_number(value: &str) -> Option<f64> {
    let end = value
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    value[..end].parse().ok()
}
