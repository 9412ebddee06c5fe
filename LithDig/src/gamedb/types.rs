//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Game database data model

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec2, Vec3};
use serde::Serialize;

use crate::error::{Error, Result};

/// Attribute value type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeType {
    Invalid,
    Bool,
    Float,
    Int,
    String,
    WString,
    Vector2,
    Vector3,
    Vector4,
    RecordLink,
    Struct,
}

impl AttributeType {
    /// Map a raw tag.
    ///
    /// # Errors
    /// Returns [`Error::UnknownAttributeType`] for tags past `Struct`.
    pub fn from_i32(value: i32) -> Result<Self> {
        Ok(match value {
            0 => Self::Invalid,
            1 => Self::Bool,
            2 => Self::Float,
            3 => Self::Int,
            4 => Self::String,
            5 => Self::WString,
            6 => Self::Vector2,
            7 => Self::Vector3,
            8 => Self::Vector4,
            9 => Self::RecordLink,
            10 => Self::Struct,
            other => return Err(Error::UnknownAttributeType(other)),
        })
    }
}

/// How the game interprets an attribute (two bits in newer files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeUsage {
    Default,
    Filename,
    ClientFX,
    Animation,
    /// Usage values outside the known set are kept as-is
    Other(i32),
}

impl AttributeUsage {
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Default,
            1 => Self::Filename,
            2 => Self::ClientFX,
            3 => Self::Animation,
            other => Self::Other(other),
        }
    }
}

/// Reference to another record by position, dereferenced on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecordLink {
    pub record_index: i16,
    pub category_index: i16,
}

/// One decoded attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttributeValue {
    Bool(bool),
    Float(f32),
    Int(i32),
    String(String),
    WString(String),
    Vector2(Vec2),
    Vector3(Vec3),
    /// Stored W, X, Y, Z; held X, Y, Z, W
    Vector4(Quat),
    RecordLink(RecordLink),
    /// Version 3 struct reference
    Struct(i32),
}

impl AttributeValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::WString(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_link(&self) -> Option<RecordLink> {
        match self {
            Self::RecordLink(link) => Some(*link),
            _ => None,
        }
    }
}

/// Descriptor table entry (versions 6 and 7).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct AttributeDescriptor {
    pub name_hash: i32,
    /// Type in the low six bits, usage in the top two
    pub bits: u8,
    pub array_length: u8,
    /// Position in the record data block, in 4-byte units
    pub position: u16,
}

impl AttributeDescriptor {
    /// Raw type tag.
    #[must_use]
    pub fn type_tag(&self) -> i32 {
        i32::from(self.bits & 0x3F)
    }

    #[must_use]
    pub fn usage(&self) -> AttributeUsage {
        AttributeUsage::from_i32(i32::from((self.bits & 0xC0) >> 6))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeType,
    pub usage: AttributeUsage,
    /// May be shorter than declared when a record's data block runs out
    pub values: Vec<AttributeValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub index: usize,
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Record {
    /// Look up an attribute by name (case-insensitive, first wins).
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// First value of a string attribute.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.attribute(name)?.values.first()?.as_str()
    }

    /// First value of an int attribute, or 0.
    #[must_use]
    pub fn int(&self, name: &str) -> i32 {
        self.attribute(name)
            .and_then(|a| a.values.first())
            .and_then(AttributeValue::as_int)
            .unwrap_or(0)
    }

    /// First value of a record link attribute.
    #[must_use]
    pub fn link(&self, name: &str) -> Option<RecordLink> {
        self.attribute(name)?.values.first()?.as_link()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Category {
    pub index: usize,
    pub name: String,
    pub records: Vec<Record>,
}

impl Category {
    /// Look up a record by name (case-insensitive, first wins).
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_bits() {
        let descriptor = AttributeDescriptor {
            name_hash: 0,
            bits: 0x80 | 4,
            array_length: 1,
            position: 0,
        };
        assert_eq!(descriptor.type_tag(), 4);
        assert_eq!(descriptor.usage(), AttributeUsage::ClientFX);
        assert_eq!(std::mem::size_of::<AttributeDescriptor>(), 8);
    }

    #[test]
    fn test_attribute_type_range() {
        assert_eq!(AttributeType::from_i32(10).unwrap(), AttributeType::Struct);
        assert!(matches!(
            AttributeType::from_i32(11),
            Err(Error::UnknownAttributeType(11))
        ));
    }
}
