//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Placed world objects and their properties

use glam::{Quat, Vec2, Vec3};
use serde::Serialize;

use super::UNNAMED_OBJECT;
use super::options::WorldVersion;
use crate::error::{Error, Result};
use crate::gamedb::{AttributeValue, RecordLink};
use crate::io::{ByteReader, Endian, OffsetTable};

/// Property flag bits holding the editor group number.
pub const PROPERTY_GROUP_MASK: i32 = 0x0FC0;

/// Object record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectEncoding {
    /// Pre Jupiter EX: inline values with a leading data length. No world
    /// version maps here; only callers of [`WorldObject::read`] select it.
    Legacy,
    /// Values in a side table addressed by offsets
    JupiterEx,
    /// Class, name and transform only; the rest lives in the `.gamedb`
    Loki,
}

impl From<WorldVersion> for ObjectEncoding {
    fn from(version: WorldVersion) -> Self {
        match version {
            WorldVersion::Fear => Self::JupiterEx,
            WorldVersion::Loki => Self::Loki,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyValue {
    String(String),
    /// Long text (Jupiter EX)
    Text(String),
    /// Script command (Jupiter EX)
    CommandString(String),
    Vector3(Vec3),
    /// RGB without alpha
    Color(Vec3),
    Float(f32),
    Flags(i32),
    Bool(bool),
    Int(i32),
    /// Four components, not always a unit quaternion
    Rotation(Quat),
    Hpc(i32),
    Vector2(Vec2),
    Vector4(Quat),
    RecordLink(RecordLink),
}

impl PropertyValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Text(s) | Self::CommandString(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector3(v) | Self::Color(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<AttributeValue> for PropertyValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Bool(v) => Self::Bool(v),
            AttributeValue::Float(v) => Self::Float(v),
            AttributeValue::Int(v) | AttributeValue::Struct(v) => Self::Int(v),
            AttributeValue::String(v) | AttributeValue::WString(v) => Self::String(v),
            AttributeValue::Vector2(v) => Self::Vector2(v),
            AttributeValue::Vector3(v) => Self::Vector3(v),
            AttributeValue::Vector4(v) => Self::Vector4(v),
            AttributeValue::RecordLink(v) => Self::RecordLink(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectProperty {
    pub name: String,
    pub value: PropertyValue,
    pub flags: i32,
    /// Declared value length (legacy records only)
    pub length: i16,
}

impl ObjectProperty {
    #[must_use]
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            flags: 0,
            length: 0,
        }
    }

    /// Editor group (1 to 6), or 0 when ungrouped.
    #[must_use]
    pub fn group(&self) -> u32 {
        let bits = (self.flags & PROPERTY_GROUP_MASK) >> 6;
        if bits == 0 { 0 } else { bits.trailing_zeros() + 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldObject {
    pub index: usize,
    pub class_name: String,
    pub properties: Vec<ObjectProperty>,
    /// LT5 name stored outside the properties
    pub name_override: Option<String>,
    /// LT5 record index in the paired `.gamedb`; -1 for none
    pub db_index: i32,
    /// BSP sharing this object's name
    pub linked_bsp: Option<usize>,
    /// Legacy record length
    pub data_length: u16,
}

impl WorldObject {
    /// Decode one object record.
    ///
    /// # Errors
    /// Returns [`Error::UnknownObjectPropertyType`] for unknown value tags,
    /// or an error on truncation or table offsets out of range.
    pub fn read(reader: &mut ByteReader, index: usize, encoding: ObjectEncoding) -> Result<Self> {
        let mut object = Self {
            index,
            class_name: String::new(),
            properties: Vec::new(),
            name_override: None,
            db_index: -1,
            linked_bsp: None,
            data_length: 0,
        };

        match encoding {
            ObjectEncoding::Legacy => {
                object.data_length = reader.read_u16()?;
                object.class_name = reader.read_string_i16()?;
                let count = reader.read_count()?;
                for _ in 0..count {
                    object.properties.push(read_legacy_property(reader)?);
                }
            }
            ObjectEncoding::JupiterEx => {
                object.class_name = reader.read_string_i16()?;
                let count = reader.read_count()?;
                let block_length = reader.read_count()?;
                let mut table = OffsetTable::new(reader.read_bytes(block_length)?, Endian::Little);
                for _ in 0..count {
                    object.properties.push(read_table_property(reader, &mut table)?);
                }
            }
            ObjectEncoding::Loki => {
                object.class_name = reader.read_string_i16()?;
                object.name_override = Some(reader.read_string_i16()?);
                object.db_index = reader.read_i32()?;
                object
                    .properties
                    .push(ObjectProperty::new("Pos", PropertyValue::Vector3(reader.read_vec3()?)));
                // Euler angles, not a quaternion
                object
                    .properties
                    .push(ObjectProperty::new("Rotation", PropertyValue::Vector3(reader.read_vec3()?)));
            }
        }
        Ok(object)
    }

    /// Object name: the LT5 override, else the first `name` property that
    /// holds a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if let Some(name) = &self.name_override {
            return Some(name);
        }
        self.properties
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case("name"))
            .find_map(|p| p.value.as_str())
    }

    /// Whether the object has a name other than the `noname` placeholder.
    #[must_use]
    pub fn has_link_name(&self) -> bool {
        self.name().is_some_and(|n| !n.is_empty() && n != UNNAMED_OBJECT)
    }

    /// First property with the given name, ignoring case.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// `Pos` property, or the origin.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.property("Pos").and_then(PropertyValue::as_vec3).unwrap_or(Vec3::ZERO)
    }

    /// `Rotation` as Euler angles: the vector part of a stored rotation, or
    /// the LT5 angles as stored.
    #[must_use]
    pub fn rotation_euler(&self) -> Vec3 {
        match self.property("Rotation") {
            Some(PropertyValue::Rotation(q)) => Vec3::new(q.x, q.y, q.z),
            Some(PropertyValue::Vector3(v)) => *v,
            _ => Vec3::ZERO,
        }
    }
}

fn read_legacy_property(reader: &mut ByteReader) -> Result<ObjectProperty> {
    let name = reader.read_string_u16()?;
    let tag = reader.read_u8()?;
    let flags = reader.read_i32()?;
    let length = reader.read_i16()?;
    let value = match tag {
        // ints are stored as floats
        6 => PropertyValue::Int(reader.read_f32()? as i32),
        5 => PropertyValue::Bool(reader.read_u8()? != 0),
        3 => PropertyValue::Float(reader.read_f32()?),
        0 => PropertyValue::String(reader.read_string_u16()?),
        1 => PropertyValue::Vector3(reader.read_vec3()?),
        2 => PropertyValue::Color(reader.read_vec3()?),
        4 => PropertyValue::Flags(reader.read_i32()?),
        9 => PropertyValue::Hpc(reader.read_i32()?),
        7 => PropertyValue::Rotation(reader.read_quat()?),
        other => return Err(Error::UnknownObjectPropertyType(i32::from(other))),
    };
    Ok(ObjectProperty {
        name,
        value,
        flags,
        length,
    })
}

fn read_table_property(reader: &mut ByteReader, table: &mut OffsetTable) -> Result<ObjectProperty> {
    let name = table.string_at(reader.read_i32()?)?;
    let value = match reader.read_i32()? {
        5 => PropertyValue::Int(reader.read_i32()?),
        4 => PropertyValue::Bool(reader.read_i32()? != 0),
        3 => PropertyValue::Float(reader.read_f32()?),
        0 => PropertyValue::String(table.string_at(reader.read_i32()?)?),
        8 => PropertyValue::Text(table.string_at(reader.read_i32()?)?),
        7 => PropertyValue::CommandString(table.string_at(reader.read_i32()?)?),
        1 => PropertyValue::Vector3(table.vec3_at(reader.read_i32()?)?),
        2 => PropertyValue::Color(table.vec3_at(reader.read_i32()?)?),
        6 => PropertyValue::Rotation(table.at(reader.read_i32()?, ByteReader::read_quat)?),
        other => return Err(Error::UnknownObjectPropertyType(other)),
    };
    Ok(ObjectProperty::new(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_i32s(out: &mut Vec<u8>, values: &[i32]) {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn push_string(out: &mut Vec<u8>, value: &str) {
        out.extend_from_slice(&(value.len() as i16).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }

    fn jupiter_object(class: &str, name: &str, position: [f32; 3]) -> Vec<u8> {
        // table: "Name\0" 0, "Pos\0" 5, "Active\0" 9, name string 16, then the position
        let mut table = b"Name\0Pos\0Active\0".to_vec();
        let name_offset = table.len() as i32;
        table.extend_from_slice(name.as_bytes());
        table.push(0);
        while table.len() % 4 != 0 {
            table.push(0);
        }
        let pos_offset = table.len() as i32;
        for f in position {
            table.extend_from_slice(&f.to_le_bytes());
        }

        let mut out = Vec::new();
        push_string(&mut out, class);
        push_i32s(&mut out, &[3, table.len() as i32]);
        out.extend_from_slice(&table);
        push_i32s(&mut out, &[0, 0, name_offset]);
        push_i32s(&mut out, &[5, 1, pos_offset]);
        push_i32s(&mut out, &[9, 4, 1]);
        out
    }

    #[test]
    fn test_jupiter_object() {
        let data = jupiter_object("Door", "FrontDoor", [1.0, 2.0, 3.0]);
        let mut reader = ByteReader::from_bytes(data);
        let object = WorldObject::read(&mut reader, 0, ObjectEncoding::JupiterEx).unwrap();
        assert!(reader.is_eof());
        assert_eq!(object.class_name, "Door");
        assert_eq!(object.name(), Some("FrontDoor"));
        assert_eq!(object.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(object.property("ACTIVE"), Some(&PropertyValue::Bool(true)));
        assert_eq!(object.db_index, -1);
        assert!(object.has_link_name());
    }

    #[test]
    fn test_jupiter_unknown_type() {
        let mut data = Vec::new();
        push_string(&mut data, "X");
        push_i32s(&mut data, &[1, 4]);
        data.extend_from_slice(b"abc\0");
        push_i32s(&mut data, &[0, 11, 0]);
        assert!(matches!(
            WorldObject::read(&mut ByteReader::from_bytes(data), 0, ObjectEncoding::JupiterEx),
            Err(Error::UnknownObjectPropertyType(11))
        ));
    }

    #[test]
    fn test_legacy_object() {
        let mut data = Vec::new();
        data.extend_from_slice(&40u16.to_le_bytes());
        push_string(&mut data, "Light");
        push_i32s(&mut data, &[2]);
        // int stored as float
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(b"Count");
        data.push(6);
        push_i32s(&mut data, &[0x40]);
        data.extend_from_slice(&4i16.to_le_bytes());
        data.extend_from_slice(&7.9f32.to_le_bytes());
        // name
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(b"name");
        data.push(0);
        push_i32s(&mut data, &[0]);
        data.extend_from_slice(&6i16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(b"Lamp");

        let object = WorldObject::read(&mut ByteReader::from_bytes(data), 3, ObjectEncoding::Legacy).unwrap();
        assert_eq!(object.data_length, 40);
        assert_eq!(object.properties[0].value, PropertyValue::Int(7));
        assert_eq!(object.properties[0].group(), 1);
        assert_eq!(object.name(), Some("Lamp"));
    }

    #[test]
    fn test_loki_object() {
        let mut data = Vec::new();
        push_string(&mut data, "Prop");
        push_string(&mut data, "noname");
        push_i32s(&mut data, &[4]);
        for f in [1.0f32, 2.0, 3.0, 0.0, 90.0, 0.0] {
            data.extend_from_slice(&f.to_le_bytes());
        }
        let object = WorldObject::read(&mut ByteReader::from_bytes(data), 0, ObjectEncoding::from(WorldVersion::Loki)).unwrap();
        assert_eq!(object.db_index, 4);
        assert_eq!(object.name(), Some("noname"));
        assert!(!object.has_link_name());
        assert_eq!(object.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(object.rotation_euler(), Vec3::new(0.0, 90.0, 0.0));
    }

    #[test]
    fn test_name_skips_non_string() {
        let object = WorldObject {
            index: 0,
            class_name: String::new(),
            properties: vec![
                ObjectProperty::new("Name", PropertyValue::Int(1)),
                ObjectProperty::new("NAME", PropertyValue::String("Second".into())),
            ],
            name_override: None,
            db_index: -1,
            linked_bsp: None,
            data_length: 0,
        };
        assert_eq!(object.name(), Some("Second"));
    }

    #[test]
    fn test_attribute_values_map() {
        assert_eq!(PropertyValue::from(AttributeValue::Struct(3)), PropertyValue::Int(3));
        assert_eq!(
            PropertyValue::from(AttributeValue::WString("w".into())),
            PropertyValue::String("w".into())
        );
    }
}
