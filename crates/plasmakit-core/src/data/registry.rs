//! Material registry
//!
//! Holds every material the current pass may bind: the preferences default
//! (material 0), the records of the material file, and the temporary
//! materials created by directives earlier in the same pass.

use super::material_file::{load_materials, write_material, write_temporary};
use super::materials::{Material, DEFAULT_MATERIAL, TEMP_MATERIAL_BASE};
use super::preferences::PreferenceDefaults;
use crate::error::{Error, FilterError, MaterialFileError, Result};
use crate::signals::{wait_for_ack, MachineSignals};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Files the registry reads and writes
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryPaths {
    pub material_file: PathBuf,
    pub prefs_file: PathBuf,
    pub temp_material_file: PathBuf,
}

/// Bounded wait used for runtime acknowledgments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// How a material edit directive applies its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Allocate a temporary number; the material file is not touched
    Temporary,
    /// Add a new section; the number must be unused
    Insert,
    /// Replace or add a section
    Update,
}

impl TryFrom<u32> for EditMode {
    type Error = String;

    fn try_from(selector: u32) -> std::result::Result<Self, Self::Error> {
        match selector {
            0 => Ok(Self::Temporary),
            1 => Ok(Self::Insert),
            2 => Ok(Self::Update),
            other => Err(format!("unknown operation selector o={}", other)),
        }
    }
}

/// Result of a successful create or edit
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// Number the material ended up under
    pub number: u32,
    /// Name the material ended up with
    pub name: String,
    /// Set when the runtime did not acknowledge in time
    pub timeout: Option<FilterError>,
}

/// Number to material mapping for one filter pass
#[derive(Debug, Clone)]
pub struct MaterialRegistry {
    paths: RegistryPaths,
    ack: AckPolicy,
    temp_base: u32,
    temp_created: u32,
    materials: BTreeMap<u32, Material>,
    current: Option<u32>,
    restore: Option<u32>,
}

impl MaterialRegistry {
    /// Create an empty registry
    pub fn new(paths: RegistryPaths) -> Self {
        Self {
            paths,
            ack: AckPolicy::default(),
            temp_base: TEMP_MATERIAL_BASE,
            temp_created: 0,
            materials: BTreeMap::new(),
            current: None,
            restore: None,
        }
    }

    pub fn with_ack_policy(mut self, ack: AckPolicy) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_temp_base(mut self, base: u32) -> Self {
        self.temp_base = base;
        self
    }

    /// Read the preferences file and the material file
    ///
    /// Temporary materials created earlier in the pass are kept. A missing
    /// file is not an error; it contributes no records.
    pub fn load(&mut self) -> std::result::Result<(), MaterialFileError> {
        let base = self.temp_base;
        self.materials.retain(|number, _| *number >= base);

        let prefs = match PreferenceDefaults::load(&self.paths.prefs_file) {
            Ok(prefs) => prefs,
            Err(MaterialFileError::Io { path, source })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::warn!("Preferences file {} not found, using zero defaults", path.display());
                PreferenceDefaults::default()
            }
            Err(e) => return Err(e),
        };
        self.materials.insert(DEFAULT_MATERIAL, prefs.to_material());

        let loaded = match load_materials(&self.paths.material_file) {
            Ok(loaded) => loaded,
            Err(MaterialFileError::Io { path, source })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::warn!("Material file {} not found", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        for (number, material) in loaded {
            if number >= base {
                tracing::warn!("Ignoring material #{} in the temporary range", number);
                continue;
            }
            self.materials.entry(number).or_insert(material);
        }

        tracing::debug!("Loaded {} materials", self.materials.len());
        Ok(())
    }

    /// Add a record directly, replacing any record with the same number
    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.number, material);
    }

    pub fn get(&self, number: u32) -> Option<&Material> {
        self.materials.get(&number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.materials.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn is_temporary(&self, number: u32) -> bool {
        Material::is_temporary_number(number, self.temp_base)
    }

    /// Currently bound material
    pub fn current(&self) -> Option<u32> {
        self.current
    }

    /// First material bound in this pass
    pub fn restore(&self) -> Option<u32> {
        self.restore
    }

    pub fn ack_policy(&self) -> AckPolicy {
        self.ack
    }

    /// Bind `number` as the current material and publish it
    pub fn bind<S: MachineSignals>(
        &mut self,
        number: u32,
        signals: &mut S,
    ) -> std::result::Result<(), FilterError> {
        if !self.contains(number) {
            return Err(if self.is_temporary(number) {
                FilterError::MissingTemporaryMaterial { number }
            } else {
                FilterError::MissingMaterial { number }
            });
        }
        self.current = Some(number);
        if self.restore.is_none() {
            self.restore = Some(number);
        }
        signals.publish_material_change(number);
        tracing::debug!("Bound material #{}", number);
        Ok(())
    }

    /// Make a just-created temporary material current
    ///
    /// The runtime loads temporaries through its own request, so nothing is
    /// published and the restore material is left alone.
    pub fn select_temporary(&mut self, number: u32) -> std::result::Result<(), FilterError> {
        if !self.contains(number) {
            return Err(FilterError::MissingTemporaryMaterial { number });
        }
        self.current = Some(number);
        tracing::debug!("Selected temporary material #{}", number);
        Ok(())
    }

    /// Apply a material edit directive
    pub fn create_or_edit<S: MachineSignals>(
        &mut self,
        mut material: Material,
        mode: EditMode,
        signals: &mut S,
    ) -> Result<EditOutcome> {
        match mode {
            EditMode::Temporary => {
                material.number = self.temp_base.saturating_add(self.temp_created);
                if material.name.is_empty() {
                    material.name = format!("Temporary {}", material.number);
                }
                write_temporary(&self.paths.temp_material_file, &material)?;
                self.temp_created += 1;
                let number = material.number;
                let name = material.name.clone();
                self.insert(material);

                signals.request_temp_material(number);
                let acked = wait_for_ack(
                    || signals.temp_material_pending(),
                    self.ack.timeout,
                    self.ack.poll_interval,
                );
                Ok(EditOutcome {
                    number,
                    name,
                    timeout: self.timeout_unless(acked, format!("Temporary material #{}", number)),
                })
            }
            EditMode::Insert | EditMode::Update => {
                if mode == EditMode::Insert && self.contains(material.number) {
                    return Err(Error::Filter(FilterError::DuplicateMaterial {
                        number: material.number,
                    }));
                }
                write_material(&self.paths.material_file, &material)?;
                self.load()?;

                signals.request_material_reload();
                let acked = wait_for_ack(
                    || signals.material_reload_pending(),
                    self.ack.timeout,
                    self.ack.poll_interval,
                );
                Ok(EditOutcome {
                    number: material.number,
                    name: material.name,
                    timeout: self.timeout_unless(acked, "Material reload".to_string()),
                })
            }
        }
    }

    fn timeout_unless(&self, acked: bool, what: String) -> Option<FilterError> {
        if acked {
            return None;
        }
        tracing::warn!("{} was not acknowledged", what);
        Some(FilterError::AcknowledgmentTimeout {
            what,
            timeout_ms: self.ack.timeout.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::StaticSignals;

    fn registry() -> MaterialRegistry {
        MaterialRegistry::new(RegistryPaths {
            material_file: PathBuf::from("/nonexistent/material.cfg"),
            prefs_file: PathBuf::from("/nonexistent/qtplasmac.prefs"),
            temp_material_file: PathBuf::from("/nonexistent/tmp.gcode"),
        })
    }

    #[test]
    fn test_bind_missing() {
        let mut reg = registry();
        let mut signals = StaticSignals::new();
        assert_eq!(
            reg.bind(5, &mut signals),
            Err(FilterError::MissingMaterial { number: 5 })
        );
        assert_eq!(
            reg.bind(TEMP_MATERIAL_BASE, &mut signals),
            Err(FilterError::MissingTemporaryMaterial {
                number: TEMP_MATERIAL_BASE
            })
        );
        assert!(signals.published.is_empty());
    }

    #[test]
    fn test_bind_records_restore() {
        let mut reg = registry();
        reg.insert(Material::new(1, "One"));
        reg.insert(Material::new(2, "Two"));
        let mut signals = StaticSignals::new();

        reg.bind(2, &mut signals).unwrap();
        reg.bind(1, &mut signals).unwrap();
        assert_eq!(reg.current(), Some(1));
        assert_eq!(reg.restore(), Some(2));
        assert_eq!(signals.published, vec![2, 1]);
    }

    #[test]
    fn test_select_temporary_keeps_restore() {
        let mut reg = registry();
        reg.insert(Material::new(1, "One"));
        reg.insert(Material::new(TEMP_MATERIAL_BASE, "Temporary"));
        let mut signals = StaticSignals::new();

        reg.bind(1, &mut signals).unwrap();
        reg.select_temporary(TEMP_MATERIAL_BASE).unwrap();
        assert_eq!(reg.current(), Some(TEMP_MATERIAL_BASE));
        assert_eq!(reg.restore(), Some(1));
        assert_eq!(signals.published, vec![1]);
        assert_eq!(
            reg.select_temporary(TEMP_MATERIAL_BASE + 1),
            Err(FilterError::MissingTemporaryMaterial {
                number: TEMP_MATERIAL_BASE + 1
            })
        );
    }

    #[test]
    fn test_missing_files_load_empty() {
        let mut reg = registry();
        reg.load().unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(DEFAULT_MATERIAL));
    }

    #[test]
    fn test_edit_mode_selector() {
        assert_eq!(EditMode::try_from(0), Ok(EditMode::Temporary));
        assert_eq!(EditMode::try_from(2), Ok(EditMode::Update));
        assert!(EditMode::try_from(3).is_err());
    }
}
