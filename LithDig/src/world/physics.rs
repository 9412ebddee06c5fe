//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Physics shapes attached to BSPs

use glam::{Quat, Vec3};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::io::{ByteReader, Plane, to_len_i32};

/// Highest tag accepted as a `SubShapes` child.
const MAX_CHILD_TAG: i32 = 0x10;

/// Offset from the capsule vectors to the field that says whether the
/// optional second transform is present.
const CAPSULE_CHECK_OFFSET: i64 = 7 * 4;

/// Collision shape with its local transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicsShape {
    pub position: Vec3,
    pub rotation: Quat,
    pub kind: ShapeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ShapeKind {
    Null,
    Mesh(MeshShape),
    Obb(ObbShape),
    Sphere(SphereShape),
    Hull(HullShape),
    Capsule(CapsuleShape),
    SubShapes(Vec<PhysicsShape>),
}

impl ShapeKind {
    /// Raw type tag.
    #[must_use]
    pub fn tag(&self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Mesh(_) => 1,
            Self::Obb(_) => 2,
            Self::Sphere(_) => 3,
            Self::Hull(_) => 4,
            Self::SubShapes(_) => 6,
            Self::Capsule(_) => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshShape {
    pub mass: f32,
    pub density: f32,
    pub vectors: [Vec3; 4],
    pub unknown: [f32; 2],
    pub points: Vec<Vec3>,
    /// Widened from 16 bits when there are fewer than 65536 points
    pub indices: Vec<i32>,
    pub properties: [f32; 4],
    pub trailing: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObbShape {
    pub mass: f32,
    pub density: f32,
    pub unknown: f32,
    pub dimensions: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SphereShape {
    pub mass: f32,
    pub density: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HullShape {
    pub mass: f32,
    pub density: f32,
    pub vectors: [Vec3; 4],
    pub unknown: [f32; 2],
    pub points: Vec<Vec3>,
    pub planes: Vec<Plane>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapsuleShape {
    pub mass: f32,
    pub density: f32,
    pub radius: f32,
    pub vectors: [Vec3; 2],
    pub extension: Option<CapsuleExtension>,
}

/// Second transform present on some capsules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapsuleExtension {
    pub position: Vec3,
    pub rotation: Quat,
    pub id: u32,
}

impl PhysicsShape {
    /// Decode one shape record, recursing into `SubShapes`.
    ///
    /// # Errors
    /// Returns an error on truncation or an unknown shape tag.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let position = reader.read_vec3()?;
        let rotation = reader.read_quat()?;
        let tag = reader.read_i32()?;
        let kind = match tag {
            0 => ShapeKind::Null,
            1 => ShapeKind::Mesh(read_mesh(reader)?),
            2 => ShapeKind::Obb(ObbShape {
                mass: reader.read_f32()?,
                density: reader.read_f32()?,
                unknown: reader.read_f32()?,
                dimensions: reader.read_vec3()?,
            }),
            3 => ShapeKind::Sphere(SphereShape {
                mass: reader.read_f32()?,
                density: reader.read_f32()?,
                radius: reader.read_f32()?,
            }),
            4 => ShapeKind::Hull(read_hull(reader)?),
            6 => ShapeKind::SubShapes(read_children(reader, position, rotation)?),
            7 => ShapeKind::Capsule(read_capsule(reader)?),
            other => return Err(Error::UnknownShapeType(other)),
        };
        Ok(Self {
            position,
            rotation,
            kind,
        })
    }
}

/// Children follow a count, but the list may end early: a tag of zero or
/// above `0x10` belongs to the enclosing scope and is left unread.
fn read_children(reader: &mut ByteReader, position: Vec3, rotation: Quat) -> Result<Vec<PhysicsShape>> {
    let declared = reader.read_i32()?;
    let mut children = Vec::new();
    for _ in 0..declared.max(0) {
        let tag = reader.read_i32()?;
        if tag == 0 || tag > MAX_CHILD_TAG {
            reader.skip(-4)?;
            break;
        }
        if tag == 7 {
            // bare capsule body, inheriting the parent transform
            children.push(PhysicsShape {
                position,
                rotation,
                kind: ShapeKind::Capsule(read_capsule(reader)?),
            });
        } else {
            children.push(PhysicsShape::read(reader)?);
        }
    }
    Ok(children)
}

fn read_vec3_array<const N: usize>(reader: &mut ByteReader) -> Result<[Vec3; N]> {
    let mut out = [Vec3::ZERO; N];
    for v in &mut out {
        *v = reader.read_vec3()?;
    }
    Ok(out)
}

fn read_mesh(reader: &mut ByteReader) -> Result<MeshShape> {
    let mass = reader.read_f32()?;
    let density = reader.read_f32()?;
    let vectors = read_vec3_array::<4>(reader)?;
    let unknown = [reader.read_f32()?, reader.read_f32()?];
    let point_count = to_len_i32(reader.read_i32()?)?;
    let index_count = to_len_i32(reader.read_i32()?)?;
    let points = reader.read_array::<Vec3>(point_count)?;
    let indices = if point_count < 0x10000 {
        reader
            .read_array::<u16>(index_count)?
            .into_iter()
            .map(i32::from)
            .collect()
    } else {
        reader.read_array::<i32>(index_count)?
    };
    let properties = [
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
    ];
    let trailing_length = reader.read_count()?;
    let trailing = reader.read_bytes(trailing_length)?;
    Ok(MeshShape {
        mass,
        density,
        vectors,
        unknown,
        points,
        indices,
        properties,
        trailing,
    })
}

fn read_hull(reader: &mut ByteReader) -> Result<HullShape> {
    let mass = reader.read_f32()?;
    let density = reader.read_f32()?;
    let vectors = read_vec3_array::<4>(reader)?;
    let unknown = [reader.read_f32()?, reader.read_f32()?];
    let point_count = to_len_i32(reader.read_i32()?)?;
    let plane_count = to_len_i32(reader.read_i32()?)?;
    Ok(HullShape {
        mass,
        density,
        vectors,
        unknown,
        points: reader.read_array(point_count)?,
        planes: reader.read_array(plane_count)?,
    })
}

fn read_capsule(reader: &mut ByteReader) -> Result<CapsuleShape> {
    let mass = reader.read_f32()?;
    let density = reader.read_f32()?;
    let radius = reader.read_f32()?;
    let vectors = read_vec3_array::<2>(reader)?;

    let bookmark = reader.position();
    reader.skip(CAPSULE_CHECK_OFFSET)?;
    let check = reader.read_i32()?;
    reader.seek(bookmark)?;

    let extension = if check == 3 {
        Some(CapsuleExtension {
            position: reader.read_vec3()?,
            rotation: reader.read_quat()?,
            id: reader.read_u32()?,
        })
    } else {
        None
    };
    Ok(CapsuleShape {
        mass,
        density,
        radius,
        vectors,
        extension,
    })
}
