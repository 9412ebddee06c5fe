//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Prefab (`PRFB`) files referenced by LT5 instances

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::mesh::{Face, VertexType, read_faces_and_vertices};
use super::options::WorldVersion;
use super::{PREFAB_MAGIC, PREFAB_VERSION};
use crate::error::{Error, Result};
use crate::io::{ByteReader, StringEncoding, read_magic};

/// Material name marking shadow volume geometry.
const SHADOW_VOLUME_MATERIAL: &str = "shadowvolume.mat";

/// A named run of a prefab's faces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefabNode {
    pub index: usize,
    /// Name hash
    pub id: i32,
    pub face_offset: usize,
    pub face_count: usize,
    pub flags: [u8; 4],
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrefabFile {
    pub name: String,
    pub id: u32,
    pub vertex_types: Vec<VertexType>,
    pub faces: Vec<Face>,
    pub materials: Vec<String>,
    pub nodes: Vec<PrefabNode>,
    /// Node id to index in `nodes`; the first of duplicate ids wins
    pub nodes_by_id: HashMap<i32, usize>,
}

impl PrefabFile {
    /// Decode a prefab. Prefabs only exist in LT5 worlds.
    ///
    /// # Errors
    /// Returns an error on bad magic or version, truncation, material ids or
    /// node face ranges out of range.
    pub fn read(reader: &mut ByteReader, name: &str) -> Result<Self> {
        let magic = read_magic(reader)?;
        if magic != PREFAB_MAGIC {
            return Err(Error::InvalidMagic {
                format: "prefab",
                expected: "PRFB",
                found: magic,
            });
        }
        let version = reader.read_i32()?;
        if version != PREFAB_VERSION {
            return Err(Error::UnsupportedVersion {
                format: "prefab",
                version: i64::from(version),
            });
        }

        let id = reader.read_u32()?;
        let node_count = reader.read_count()?;
        let face_count = reader.read_i32()?;
        let material_count = reader.read_count()?;
        let material_block_size = reader.read_count()?;
        let vertex_type_count = reader.read_i32()?;
        let _unknown4 = reader.read_i32()?;
        let _vertex_block_size = reader.read_i32()?;
        let _face_count_a = reader.read_i32()?;

        let geometry = read_faces_and_vertices(reader, WorldVersion::Loki, vertex_type_count, face_count)?;
        let mut faces = geometry.faces;

        let mut block = ByteReader::from_bytes(reader.read_bytes(material_block_size)?);
        let mut materials = Vec::with_capacity(material_count);
        for _ in 0..material_count {
            materials.push(block.read_cstring(None, StringEncoding::SingleByte)?);
            if !block.is_eof() {
                block.align(4)?;
            }
        }

        for face in &mut faces {
            let material = usize::try_from(face.material_id)
                .ok()
                .and_then(|i| materials.get(i))
                .ok_or_else(|| {
                    Error::invalid(
                        "prefab",
                        format!("face #{} uses material {} of {}", face.index, face.material_id, materials.len()),
                    )
                })?;
            if material.to_ascii_lowercase().contains(SHADOW_VOLUME_MATERIAL) {
                face.is_shadow_volume = true;
            }
        }

        let mut nodes = Vec::with_capacity(node_count);
        let mut nodes_by_id = HashMap::with_capacity(node_count);
        for index in 0..node_count {
            let node_id = reader.read_i32()?;
            let offset = reader.read_i32()?;
            let count = reader.read_i32()?;
            let flags = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
            let (face_offset, face_count) = match (usize::try_from(offset), usize::try_from(count)) {
                (Ok(o), Ok(c)) if o + c <= faces.len() => (o, c),
                _ => {
                    return Err(Error::invalid(
                        "prefab",
                        format!("node #{index} covers faces {offset}+{count} of {}", faces.len()),
                    ));
                }
            };
            if nodes_by_id.contains_key(&node_id) {
                warn!("Prefab '{name}': duplicate node id {node_id}");
            } else {
                nodes_by_id.insert(node_id, index);
            }
            nodes.push(PrefabNode {
                index,
                id: node_id,
                face_offset,
                face_count,
                flags,
            });
        }

        Ok(Self {
            name: name.to_string(),
            id,
            vertex_types: geometry.vertex_types,
            faces,
            materials,
            nodes,
            nodes_by_id,
        })
    }

    /// Node with the given id.
    #[must_use]
    pub fn node(&self, id: i32) -> Option<&PrefabNode> {
        self.nodes_by_id.get(&id).map(|&i| &self.nodes[i])
    }

    /// Faces drawn by a node.
    #[must_use]
    pub fn node_faces(&self, node: &PrefabNode) -> &[Face] {
        &self.faces[node.face_offset..node.face_offset + node.face_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_i32s(out: &mut Vec<u8>, values: &[i32]) {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// LT5 geometry with two faces of one triangle each.
    fn geometry() -> Vec<u8> {
        // faces consume the vertex blob in order
        let mut vertices = Vec::new();
        for f in [0.0f32; 18] {
            vertices.extend_from_slice(&f.to_le_bytes());
        }
        let mut triangles = Vec::new();
        for i in [0u16, 1, 2] {
            triangles.extend_from_slice(&i.to_le_bytes());
        }
        let mut out = Vec::new();
        push_i32s(&mut out, &[vertices.len() as i32, triangles.len() as i32]);
        out.extend_from_slice(&vertices);
        out.extend_from_slice(&triangles);
        // one position-only vertex type
        push_i32s(&mut out, &[1, 1]);
        out.extend_from_slice(&[0, 2, 0, 0]);
        push_i32s(&mut out, &[2]);
        for material in [0, 1] {
            // shift, vcount, tstart, vstart, tcount, material, unk1, unk2, vtype
            push_i32s(&mut out, &[0, 3, 0, 0, 1, material, 0, 0, 0]);
        }
        out
    }

    fn prefab(node_ids: &[i32], second_node_count: i32) -> Vec<u8> {
        let materials = b"wall.mat\0\0\0\0fx/ShadowVolume.mat\0".to_vec();
        let mut out = b"PRFB".to_vec();
        push_i32s(&mut out, &[1, 77, node_ids.len() as i32, 2, 2, materials.len() as i32, 1, 0, 0, 2]);
        out.extend_from_slice(&geometry());
        out.extend_from_slice(&materials);
        for (i, id) in node_ids.iter().enumerate() {
            let count = if i == 0 { 1 } else { second_node_count };
            push_i32s(&mut out, &[*id, i as i32, count]);
            out.extend_from_slice(&[1, 2, 3, 4]);
        }
        out
    }

    #[test]
    fn test_read_prefab() {
        let mut reader = ByteReader::from_bytes(prefab(&[10, 20], 1));
        let prefab = PrefabFile::read(&mut reader, "crate.inst").unwrap();
        assert!(reader.is_eof());
        assert_eq!(prefab.id, 77);
        assert_eq!(prefab.materials, vec!["wall.mat", "fx/ShadowVolume.mat"]);
        assert!(!prefab.faces[0].is_shadow_volume);
        assert!(prefab.faces[1].is_shadow_volume);
        let node = prefab.node(20).unwrap();
        assert_eq!(node.face_offset, 1);
        assert_eq!(prefab.node_faces(node).len(), 1);
        assert_eq!(node.flags, [1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicate_node_ids_keep_first() {
        let prefab = PrefabFile::read(&mut ByteReader::from_bytes(prefab(&[5, 5], 1)), "p").unwrap();
        assert_eq!(prefab.nodes.len(), 2);
        assert_eq!(prefab.node(5).unwrap().index, 0);
    }

    #[test]
    fn test_node_range_checked() {
        let result = PrefabFile::read(&mut ByteReader::from_bytes(prefab(&[1, 2], 5)), "p");
        assert!(matches!(result, Err(Error::InvalidFormat { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let result = PrefabFile::read(&mut ByteReader::from_bytes(b"PRFX\x01\0\0\0".to_vec()), "p");
        assert!(matches!(result, Err(Error::InvalidMagic { .. })));
    }
}
