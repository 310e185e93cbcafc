//! Material file reading and atomic rewriting
//!
//! The material file is a sectioned key-value text file. Each section opens
//! with `[MATERIAL_NUMBER_<n>]` and carries `KEY = value` lines. Anything
//! before the first section is a free-form header that survives rewrites.

use super::materials::{parse_section_header, Material, MaterialKey};
use crate::error::MaterialFileError;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Parse material file text into records
///
/// The first section for a given number wins. Within a section the last
/// write of a key wins. Unknown keys are ignored. A value that does not
/// parse leaves the key at its default, and a section with an unreadable
/// number is skipped up to the next header.
pub fn parse_materials(path: &Path, content: &str) -> BTreeMap<u32, Material> {
    let mut materials = BTreeMap::new();
    let mut current: Option<Material> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if let Some(header) = parse_section_header(line) {
            if let Some(done) = current.take() {
                insert_first(&mut materials, done);
            }
            match header {
                Ok(number) => current = Some(Material::new(number, "")),
                Err(reason) => tracing::warn!(
                    "{} line {}: {}, skipping section",
                    path.display(),
                    line_no,
                    reason
                ),
            }
            continue;
        }

        let Some(material) = current.as_mut() else {
            continue;
        };
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!(
                "{} line {}: expected KEY = value, found '{}'",
                path.display(),
                line_no,
                line
            );
            continue;
        };
        match key.parse::<MaterialKey>() {
            Ok(key) => {
                if let Err(reason) = material.set_value(key, value) {
                    tracing::warn!(
                        "{} line {}: {}, material #{} keeps the default",
                        path.display(),
                        line_no,
                        reason,
                        material.number
                    );
                }
            }
            Err(_) => tracing::debug!("Ignoring unknown key '{}' at line {}", key.trim(), line_no),
        }
    }

    if let Some(done) = current.take() {
        insert_first(&mut materials, done);
    }
    materials
}

fn insert_first(materials: &mut BTreeMap<u32, Material>, material: Material) {
    if materials.contains_key(&material.number) {
        tracing::warn!(
            "Material #{} is defined more than once, keeping the first definition",
            material.number
        );
        return;
    }
    materials.insert(material.number, material);
}

/// Load all records from a material file
pub fn load_materials(path: &Path) -> Result<BTreeMap<u32, Material>, MaterialFileError> {
    let content = fs::read_to_string(path).map_err(|e| MaterialFileError::io(path, e))?;
    Ok(parse_materials(path, &content))
}

/// Path of the backup written before a rewrite
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bkp");
    PathBuf::from(name)
}

/// Replace or append one section of the material file
///
/// The current file is copied to `<file>.bkp`, the new content is streamed
/// into a temporary file in the same directory and renamed over the
/// original. A failure at any step leaves the original untouched.
pub fn write_material(path: &Path, material: &Material) -> Result<(), MaterialFileError> {
    let original = match fs::read_to_string(path) {
        Ok(content) => {
            fs::copy(path, backup_path(path)).map_err(|e| MaterialFileError::io(path, e))?;
            content
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(MaterialFileError::io(path, e)),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|e| MaterialFileError::io(dir, e))?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        splice_section(&original, material, &mut out).map_err(|e| MaterialFileError::io(path, e))?;
        out.flush().map_err(|e| MaterialFileError::io(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| MaterialFileError::io(path, e))?;
    tmp.persist(path).map_err(|source| MaterialFileError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Wrote material #{} to {}", material.number, path.display());
    Ok(())
}

/// Stream `original` into `out`, swapping in the section for `material`
fn splice_section<W: Write>(original: &str, material: &Material, out: &mut W) -> std::io::Result<()> {
    let mut skipping = false;
    let mut written = false;
    let mut last_blank = true;

    for line in original.lines() {
        if let Some(header) = parse_section_header(line) {
            skipping = matches!(header, Ok(n) if n == material.number) && !written;
            if skipping {
                material.write_section(out)?;
                written = true;
                continue;
            }
        }
        if !skipping {
            writeln!(out, "{}", line)?;
            last_blank = line.trim().is_empty();
        }
    }

    if !written {
        if !last_blank {
            writeln!(out)?;
        }
        material.write_section(out)?;
    }
    Ok(())
}

/// Write the throwaway file announcing a temporary material
pub fn write_temporary(path: &Path, material: &Material) -> Result<(), MaterialFileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| MaterialFileError::io(parent, e))?;
        }
    }
    let mut buf = Vec::new();
    material
        .write_temporary(&mut buf)
        .map_err(|e| MaterialFileError::io(path, e))?;
    fs::write(path, buf).map_err(|e| MaterialFileError::io(path, e))
}
