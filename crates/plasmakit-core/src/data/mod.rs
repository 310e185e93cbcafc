//! Material data model and persistence

pub mod material_file;
pub mod materials;
pub mod preferences;
pub mod registry;

pub use material_file::{backup_path, load_materials, parse_materials, write_material, write_temporary};
pub use materials::{Material, MaterialKey, DEFAULT_MATERIAL, TEMP_MATERIAL_BASE};
pub use preferences::PreferenceDefaults;
pub use registry::{AckPolicy, EditMode, EditOutcome, MaterialRegistry, RegistryPaths};
