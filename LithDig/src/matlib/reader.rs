//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Material library decoding
//!
//! After the 32-byte header come a name table, a property table, and the
//! per-material assignment lists. Assignments refer back into the first two
//! tables by offsets relative to the end of the header.

use std::path::Path;

use tracing::{debug, warn};

use super::{HEADER_SIZE, MAGIC, Material, MaterialValue, NO_PARENT, PropertyInfo, PropertyType, VERSION};
use crate::error::{Error, Result};
use crate::io::{ByteReader, StringEncoding, read_magic, to_len_i32};

/// Longest parent chain followed before the name table is considered cyclic.
const MAX_NAME_DEPTH: usize = 64;

/// A decoded `.matlib` file.
#[derive(Debug, Clone, Default)]
pub struct MatLibFile {
    /// Header counts with no known meaning (first, third and fourth)
    pub unknown_counts: [i32; 3],
    pub property_table_offset: i32,
    pub assignments_offset: i32,
    pub materials: Vec<Material>,
}

impl MatLibFile {
    /// Read and decode a material library from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lib = Self::from_bytes(std::fs::read(path)?)?;
        debug!("Loaded {} materials from {}", lib.materials.len(), path.display());
        Ok(lib)
    }

    /// Decode a material library held in memory.
    ///
    /// # Errors
    /// Returns an error on bad magic, unsupported version, truncation, or an
    /// unknown property type.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut reader = ByteReader::from_bytes(data);
        let magic = read_magic(&mut reader)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic {
                format: "material library",
                expected: "MTLB",
                found: magic,
            });
        }
        let version = reader.read_i32()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion {
                format: "material library",
                version: i64::from(version),
            });
        }

        let count1 = reader.read_i32()?;
        let material_count = to_len_i32(reader.read_i32()?)?;
        let count3 = reader.read_i32()?;
        let count4 = reader.read_i32()?;
        let property_table_offset = reader.read_i32()?;
        let assignments_offset = reader.read_i32()?;

        reader.seek(HEADER_SIZE + to_len_i32(assignments_offset)? as u64)?;

        let mut materials = Vec::with_capacity(material_count);
        for _ in 0..material_count {
            materials.push(read_material(&mut reader)?);
        }

        Ok(Self {
            unknown_counts: [count1, count3, count4],
            property_table_offset,
            assignments_offset,
            materials,
        })
    }

    /// Find a material by name (case-insensitive).
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

fn read_material(reader: &mut ByteReader) -> Result<Material> {
    let name = read_name(reader)?;
    let shader = read_name(reader)?;
    let _unused = reader.read_u32()?;
    let property_count = to_len_i32(reader.read_i32()?)?;

    let mut material = Material {
        name,
        shader,
        ..Material::default()
    };
    for _ in 0..property_count {
        let info = read_property_info(reader)?;
        let value = match info.kind {
            PropertyType::FileName => MaterialValue::FileName(read_name(reader)?),
            PropertyType::Vector3 => MaterialValue::Vector3(follow(reader, ByteReader::read_vec3)?),
            PropertyType::Color4 => MaterialValue::Color4(follow(reader, ByteReader::read_vec4)?),
            PropertyType::Integer => MaterialValue::Integer(reader.read_i32()?),
            PropertyType::Float => MaterialValue::Float(reader.read_f32()?),
        };
        if material.properties.insert(info.name.clone(), value).is_some() {
            warn!("Material '{}' repeats property '{}'", material.name, info.name);
        }
    }
    Ok(material)
}

/// Read an `i32` offset and decode a value there, restoring the cursor.
fn follow<T>(reader: &mut ByteReader, decode: impl FnOnce(&mut ByteReader) -> Result<T>) -> Result<T> {
    let offset = reader.read_i32()?;
    at_offset(reader, offset, decode)
}

fn at_offset<T>(
    reader: &mut ByteReader,
    offset: i32,
    decode: impl FnOnce(&mut ByteReader) -> Result<T>,
) -> Result<T> {
    let target = u64::try_from(offset).map_err(|_| Error::NegativeLength(i64::from(offset)))?;
    let saved = reader.position();
    reader.seek(HEADER_SIZE + target)?;
    let result = decode(reader);
    reader.seek(saved)?;
    result
}

/// Resolve a hierarchical name: each entry is a 24-bit parent offset and a
/// name segment.
fn read_name(reader: &mut ByteReader) -> Result<String> {
    let offset = reader.read_i32()?;
    name_at(reader, offset, 0)
}

fn name_at(reader: &mut ByteReader, offset: i32, depth: usize) -> Result<String> {
    if depth > MAX_NAME_DEPTH {
        return Err(Error::invalid("material library", "name parent chain too deep"));
    }
    let (parent, segment) = at_offset(reader, offset, |r| {
        let low = u32::from(r.read_u16()?);
        let high = u32::from(r.read_u8()?);
        let name = r.read_cstring(None, StringEncoding::SingleByte)?;
        Ok((low | (high << 16), name))
    })?;
    if parent < NO_PARENT {
        let prefix = name_at(reader, parent as i32, depth + 1)?;
        return Ok(format!("{prefix}\\{segment}"));
    }
    Ok(segment)
}

fn read_property_info(reader: &mut ByteReader) -> Result<PropertyInfo> {
    let offset = reader.read_i32()?;
    at_offset(reader, offset, |r| {
        let kind = PropertyType::from_i16(r.read_i16()?)?;
        let usage = r.read_u16()?;
        let raw = r.read_cstring(None, StringEncoding::SingleByte)?;
        let name = match raw.strip_prefix("k_") {
            Some(stripped) => stripped.to_string(),
            None => raw,
        };
        Ok(PropertyInfo { name, kind, usage })
    })
}
