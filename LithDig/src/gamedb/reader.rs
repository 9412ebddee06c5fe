//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Game database decoding

use std::path::Path;

use tracing::debug;

use super::hash::{HashNameTable, calc_hash};
use super::{
    Attribute, AttributeDescriptor, AttributeType, AttributeUsage, AttributeValue, Category,
    DESCRIPTOR_VERSION, MAGIC, Record, RecordLink, SUPPORTED_VERSIONS,
};
use crate::error::{Error, Result};
use crate::io::{ByteReader, Endian, OffsetTable, read_magic, to_len_i32};

/// A decoded `.gamedb` file.
#[derive(Debug, Clone, Default)]
pub struct GameDbFile {
    pub version: i32,
    pub value_table_length: i32,
    /// Header counters with no known meaning: three always present, two more
    /// from version 7 (zero before)
    pub unknown: [i32; 5],
    /// Attribute descriptors (empty before version 6)
    pub descriptors: Vec<AttributeDescriptor>,
    pub categories: Vec<Category>,
}

impl GameDbFile {
    /// Read and decode a game database from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is malformed.
    pub fn open(path: impl AsRef<Path>, names: &HashNameTable) -> Result<Self> {
        let path = path.as_ref();
        let db = Self::from_bytes(std::fs::read(path)?, names)?;
        debug!(
            "Loaded game database {} (v{}, {} categories)",
            path.display(),
            db.version,
            db.categories.len()
        );
        Ok(db)
    }

    /// Decode a game database held in memory. Hashed attribute names are
    /// resolved through `names`.
    ///
    /// # Errors
    /// Returns an error on bad magic, unsupported version, truncation, a
    /// failed name hash check, or an unknown attribute type.
    pub fn from_bytes(data: Vec<u8>, names: &HashNameTable) -> Result<Self> {
        let mut reader = ByteReader::from_bytes(data);
        let magic = read_magic(&mut reader)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic {
                format: "game database",
                expected: "GADB",
                found: magic,
            });
        }
        let version = reader.read_i32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion {
                format: "game database",
                version: i64::from(version),
            });
        }

        let mut unknown = [0i32; 5];
        if version >= 7 {
            unknown[3] = reader.read_i32()?;
            unknown[4] = reader.read_i32()?;
        }
        let value_table_length = reader.read_i32()?;
        unknown[0] = reader.read_i32()?;
        unknown[1] = reader.read_i32()?;
        unknown[2] = reader.read_i32()?;
        let descriptor_count = to_len_i32(reader.read_i32()?)?;

        let values = OffsetTable::new(
            reader.read_bytes_signed(i64::from(value_table_length))?,
            Endian::Little,
        );
        let descriptors = if version >= DESCRIPTOR_VERSION {
            reader.read_array::<AttributeDescriptor>(descriptor_count)?
        } else {
            Vec::new()
        };

        let mut decoder = Decoder {
            reader,
            values,
            names,
            version,
            descriptors,
        };
        let category_count = to_len_i32(decoder.reader.read_i32()?)?;
        let mut categories = Vec::with_capacity(category_count);
        for index in 0..category_count {
            categories.push(decoder.read_category(index)?);
        }

        Ok(Self {
            version,
            value_table_length,
            unknown,
            descriptors: decoder.descriptors,
            categories,
        })
    }

    /// Look up a category by name (case-insensitive, first wins).
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Dereference a record link. Negative or out-of-range indices give `None`.
    #[must_use]
    pub fn resolve_link(&self, link: RecordLink) -> Option<&Record> {
        let category = usize::try_from(link.category_index).ok()?;
        let record = usize::try_from(link.record_index).ok()?;
        self.categories.get(category)?.records.get(record)
    }
}

struct Decoder<'a> {
    reader: ByteReader,
    values: OffsetTable,
    names: &'a HashNameTable,
    version: i32,
    descriptors: Vec<AttributeDescriptor>,
}

impl Decoder<'_> {
    fn has_descriptors(&self) -> bool {
        self.version >= DESCRIPTOR_VERSION
    }

    fn table_string(&mut self) -> Result<String> {
        let offset = self.reader.read_i32()?;
        self.values.string_at(offset)
    }

    fn check_hash(&mut self, name: &str) -> Result<()> {
        let stored = self.reader.read_i32()?;
        let computed = calc_hash(name);
        if stored != computed {
            return Err(Error::HashMismatch {
                name: name.to_string(),
                stored,
                computed,
            });
        }
        Ok(())
    }

    fn read_category(&mut self, index: usize) -> Result<Category> {
        let name = self.table_string()?;
        let record_count = to_len_i32(self.reader.read_i32()?)?;
        if self.has_descriptors() {
            self.check_hash(&name)?;
        }
        let mut records = Vec::with_capacity(record_count);
        for record_index in 0..record_count {
            records.push(self.read_record(record_index)?);
        }
        Ok(Category {
            index,
            name,
            records,
        })
    }

    fn read_record(&mut self, index: usize) -> Result<Record> {
        let name = self.table_string()?;
        if !self.has_descriptors() {
            let attribute_count = to_len_i32(self.reader.read_i32()?)?;
            let mut attributes = Vec::with_capacity(attribute_count);
            for _ in 0..attribute_count {
                attributes.push(self.read_inline_attribute()?);
            }
            return Ok(Record {
                index,
                name,
                attributes,
            });
        }

        let data_size = i64::from(self.reader.read_i32()?);
        let attribute_count = to_len_i32(self.reader.read_i32()?)?;
        let table_offset = to_len_i32(self.reader.read_i32()?)?;
        self.check_hash(&name)?;
        let mut block = ByteReader::from_bytes(self.reader.read_bytes_signed(data_size * 4)?);

        let mut attributes = Vec::with_capacity(attribute_count);
        for k in 0..attribute_count {
            let descriptor = *self.descriptors.get(table_offset + k).ok_or_else(|| {
                Error::invalid(
                    "game database",
                    format!("record '{name}' descriptor {} out of range", table_offset + k),
                )
            })?;
            let kind = AttributeType::from_i32(descriptor.type_tag())?;
            let mut attribute = Attribute {
                name: self.names.name(descriptor.name_hash),
                kind,
                usage: descriptor.usage(),
                values: Vec::with_capacity(usize::from(descriptor.array_length)),
            };

            let mut position = u64::from(descriptor.position) * 4;
            for _ in 0..descriptor.array_length {
                if position >= block.len() {
                    debug!(
                        "Record '{}' attribute '{}' truncated at {} of {} values",
                        name,
                        attribute.name,
                        attribute.values.len(),
                        descriptor.array_length
                    );
                    break;
                }
                block.seek(position)?;
                attribute
                    .values
                    .push(read_value(&mut block, &mut self.values, kind, self.version)?);
                position += 4;
            }
            attributes.push(attribute);
        }

        Ok(Record {
            index,
            name,
            attributes,
        })
    }

    fn read_inline_attribute(&mut self) -> Result<Attribute> {
        let name = self.table_string()?;
        let kind = AttributeType::from_i32(self.reader.read_i32()?)?;
        let usage = AttributeUsage::from_i32(self.reader.read_i32()?);
        let count = to_len_i32(self.reader.read_i32()?)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(read_value(&mut self.reader, &mut self.values, kind, self.version)?);
        }
        Ok(Attribute {
            name,
            kind,
            usage,
            values,
        })
    }
}

fn read_value(
    source: &mut ByteReader,
    values: &mut OffsetTable,
    kind: AttributeType,
    version: i32,
) -> Result<AttributeValue> {
    Ok(match kind {
        AttributeType::Bool => AttributeValue::Bool(source.read_i32()? != 0),
        AttributeType::Float => AttributeValue::Float(source.read_f32()?),
        AttributeType::Int => AttributeValue::Int(source.read_i32()?),
        AttributeType::String => AttributeValue::String(values.string_at(source.read_i32()?)?),
        AttributeType::WString => AttributeValue::WString(values.wstring_at(source.read_i32()?)?),
        AttributeType::Vector2 => AttributeValue::Vector2(values.vec2_at(source.read_i32()?)?),
        AttributeType::Vector3 => AttributeValue::Vector3(values.vec3_at(source.read_i32()?)?),
        AttributeType::Vector4 => AttributeValue::Vector4(values.quat_at(source.read_i32()?)?),
        AttributeType::Struct if version == 3 => AttributeValue::Struct(source.read_i32()?),
        AttributeType::RecordLink | AttributeType::Struct => {
            let record_index = source.read_i16()?;
            let category_index = source.read_i16()?;
            AttributeValue::RecordLink(RecordLink {
                record_index,
                category_index,
            })
        }
        AttributeType::Invalid => return Err(Error::UnknownAttributeType(0)),
    })
}
