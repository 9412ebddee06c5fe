//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Collision BSPs (world models)

use glam::Vec3;
use indexmap::IndexMap;
use serde::Serialize;

use super::options::WorldVersion;
use super::physics::PhysicsShape;
use super::render::{LokiRenderInstanceData, RenderNode};
use crate::error::Result;
use crate::io::{BoundingBox, ByteReader, to_len_i32};

/// A collision brush with its polygons, partition tree and points.
///
/// BSPs are used for physics and object linking, not for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorldBsp {
    pub index: usize,
    /// Every name the name table assigns to this BSP, in table order
    pub names: Vec<String>,
    pub unknown1: i32,
    /// Jupiter EX only (0 on LT5)
    pub unknown2: i32,
    pub half_dims: Vec3,
    pub center: Vec3,
    pub total_poly_point_count: i32,
    pub polygons: Vec<WorldPoly>,
    pub nodes: Vec<WorldNode>,
    pub points: Vec<Vec3>,

    // Filled in by later stages
    pub shape: Option<PhysicsShape>,
    /// Jupiter EX render tree nodes owned by this BSP
    pub render_nodes: Vec<RenderNode>,
    /// LT5 per-BSP instance data
    pub instance_data: Option<LokiRenderInstanceData>,
    /// Objects linked by name, mapped to their index in the world's object list
    pub linked_objects: IndexMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorldPoly {
    pub index: usize,
    pub unknown: [u8; 2],
    pub surface_flags: u16,
    /// Index into the world's plane normals
    pub plane_index: i32,
    pub plane_distance: f32,
    pub vertex_indices: Vec<i32>,
}

/// BSP tree node; child indices are -1 for none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorldNode {
    pub index: usize,
    pub poly_index: i32,
    pub left: i32,
    pub right: i32,
}

impl WorldBsp {
    /// Decode one BSP.
    ///
    /// # Errors
    /// Returns an error on truncation or negative counts.
    pub fn read(
        reader: &mut ByteReader,
        version: WorldVersion,
        index: usize,
        names: Vec<String>,
    ) -> Result<Self> {
        let unknown1 = reader.read_i32()?;
        let point_count = to_len_i32(reader.read_i32()?)?;
        let poly_count = to_len_i32(reader.read_i32()?)?;
        let total_poly_point_count = reader.read_i32()?;
        let node_count = to_len_i32(reader.read_i32()?)?;
        let half_dims = reader.read_vec3()?;
        let center = reader.read_vec3()?;
        let unknown2 = if version.is_loki() { 0 } else { reader.read_i32()? };

        let vertices_per_poly = reader.read_bytes(poly_count)?;
        let mut polygons = Vec::with_capacity(poly_count);
        for (i, &count) in vertices_per_poly.iter().enumerate() {
            polygons.push(WorldPoly {
                index: i,
                unknown: [reader.read_u8()?, reader.read_u8()?],
                surface_flags: reader.read_u16()?,
                plane_index: reader.read_i32()?,
                plane_distance: reader.read_f32()?,
                vertex_indices: reader.read_array(usize::from(count))?,
            });
        }

        let mut nodes = Vec::with_capacity(node_count);
        for i in 0..node_count {
            let poly_index = reader.read_i32()?;
            let (left, right) = if version.is_loki() {
                (i32::from(reader.read_i16()?), i32::from(reader.read_i16()?))
            } else {
                (reader.read_i32()?, reader.read_i32()?)
            };
            nodes.push(WorldNode {
                index: i,
                poly_index,
                left,
                right,
            });
        }

        let points = reader.read_array(point_count)?;

        Ok(Self {
            index,
            names,
            unknown1,
            unknown2,
            half_dims,
            center,
            total_poly_point_count,
            polygons,
            nodes,
            points,
            ..Self::default()
        })
    }

    /// First name, if the BSP has any.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// First name, or `#index` for unnamed BSPs.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.first_name() {
            Some(name) => name.to_string(),
            None => format!("#{}", self.index),
        }
    }

    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            min: self.center - self.half_dims,
            max: self.center + self.half_dims,
        }
    }

    /// Sum of polygon vertex counts.
    #[must_use]
    pub fn poly_vertex_count(&self) -> usize {
        self.polygons.iter().map(|p| p.vertex_indices.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(version: WorldVersion) -> Vec<u8> {
        let mut data = Vec::new();
        // unknown1, points, polys, total poly points, nodes
        for v in [1i32, 3, 1, 3, 1] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        for f in [1.0f32, 2.0, 3.0, 10.0, 20.0, 30.0] {
            data.extend_from_slice(&f.to_le_bytes());
        }
        if !version.is_loki() {
            data.extend_from_slice(&0i32.to_le_bytes());
        }
        data.push(3);
        // polygon
        data.extend_from_slice(&[7, 8]);
        data.extend_from_slice(&0x0102u16.to_le_bytes());
        data.extend_from_slice(&4i32.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        for i in [0i32, 1, 2] {
            data.extend_from_slice(&i.to_le_bytes());
        }
        // node
        data.extend_from_slice(&0i32.to_le_bytes());
        if version.is_loki() {
            data.extend_from_slice(&(-1i16).to_le_bytes());
            data.extend_from_slice(&(-1i16).to_le_bytes());
        } else {
            data.extend_from_slice(&(-1i32).to_le_bytes());
            data.extend_from_slice(&(-1i32).to_le_bytes());
        }
        // points
        for f in [0.0f32; 9] {
            data.extend_from_slice(&f.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_read_bsp() {
        for version in [WorldVersion::Fear, WorldVersion::Loki] {
            let mut reader = ByteReader::from_bytes(sample(version));
            let bsp = WorldBsp::read(&mut reader, version, 2, vec!["Door".into()]).unwrap();
            assert!(reader.is_eof());
            assert_eq!(bsp.index, 2);
            assert_eq!(bsp.first_name(), Some("Door"));
            assert_eq!(bsp.polygons.len(), 1);
            assert_eq!(bsp.polygons[0].vertex_indices, vec![0, 1, 2]);
            assert_eq!(bsp.polygons[0].surface_flags, 0x0102);
            assert_eq!(bsp.nodes[0].left, -1);
            assert_eq!(bsp.points.len(), 3);
            assert_eq!(bsp.poly_vertex_count(), 3);
            assert_eq!(bsp.bbox().min, Vec3::new(9.0, 18.0, 27.0));
        }
    }

    #[test]
    fn test_display_name_unnamed() {
        let bsp = WorldBsp {
            index: 4,
            ..WorldBsp::default()
        };
        assert_eq!(bsp.display_name(), "#4");
    }
}
