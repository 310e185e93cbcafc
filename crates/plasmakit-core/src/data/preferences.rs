//! Preferences file defaults for material 0

use super::materials::{Material, DEFAULT_MATERIAL};
use crate::error::MaterialFileError;
use std::fs;
use std::path::Path;

/// Cut defaults read from the preferences file
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreferenceDefaults {
    pub cut_feed_rate: f64,
    pub kerf_width: f64,
}

impl PreferenceDefaults {
    /// Parse `Cut feed rate = <f>` and `Kerf width = <f>` lines
    ///
    /// Every other line is ignored. A later line overrides an earlier one.
    pub fn parse(path: &Path, content: &str) -> Result<Self, MaterialFileError> {
        let mut prefs = Self::default();
        for (idx, line) in content.lines().enumerate() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let slot = match key.trim() {
                "Cut feed rate" => &mut prefs.cut_feed_rate,
                "Kerf width" => &mut prefs.kerf_width,
                _ => continue,
            };
            *slot = value
                .trim()
                .parse::<f64>()
                .map_err(|_| MaterialFileError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: format!("Invalid number '{}' for {}", value.trim(), key.trim()),
                })?;
        }
        Ok(prefs)
    }

    /// Read defaults from a preferences file
    pub fn load(path: &Path) -> Result<Self, MaterialFileError> {
        let content = fs::read_to_string(path).map_err(|e| MaterialFileError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// The default material these preferences describe
    pub fn to_material(self) -> Material {
        let mut material = Material::new(DEFAULT_MATERIAL, "Default");
        material.cut_feed_rate = self.cut_feed_rate;
        material.kerf_width = self.kerf_width;
        material
    }
}
