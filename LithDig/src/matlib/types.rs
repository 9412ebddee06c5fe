//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Material library data model

use glam::{Vec3, Vec4};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};

/// Property value type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i16)]
pub enum PropertyType {
    FileName = 1,
    Vector3 = 2,
    Color4 = 3,
    Integer = 4,
    Float = 5,
}

impl PropertyType {
    pub fn from_i16(value: i16) -> Result<Self> {
        match value {
            1 => Ok(Self::FileName),
            2 => Ok(Self::Vector3),
            3 => Ok(Self::Color4),
            4 => Ok(Self::Integer),
            5 => Ok(Self::Float),
            other => Err(Error::UnknownPropertyType(other)),
        }
    }
}

/// A typed material property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MaterialValue {
    FileName(String),
    Vector3(Vec3),
    /// RGBA, stored as four floats
    Color4(Vec4),
    Integer(i32),
    Float(f32),
}

/// Entry of the property table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyType,
    /// Usage bits, kept opaque
    pub usage: u16,
}

/// One material definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub shader: String,
    /// Properties in file order
    pub properties: IndexMap<String, MaterialValue>,
}

impl Material {
    /// Look up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&MaterialValue> {
        self.properties.get(name)
    }
}
