//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Render tree: the mapping from BSPs and render nodes to mesh faces
//!
//! Jupiter EX stores one tree per BSP whose faces name their mesh. LT5
//! stores a flat node list, a global instance list and one instance record
//! per BSP. Decoding annotates the referenced [`Face`]s in place.

use glam::{Quat, Vec3};
use serde::Serialize;
use tracing::debug;

use super::bsp::WorldBsp;
use super::mesh::{Face, RenderMesh};
use super::reader::RenderHeader;
use crate::error::{Error, Result};
use crate::io::{BoundingBox, ByteReader};

/// A face reference inside a render node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderFace {
    pub bounds: BoundingBox,
    /// Non-zero for shadow volumes; values up to 3 are seen
    pub flags: i32,
    /// Jupiter EX only; the node's mesh on LT5
    pub mesh_index: i32,
    pub face_index: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderNode {
    pub index: usize,
    /// Owning BSP (Jupiter EX)
    pub bsp: Option<usize>,
    /// Mesh drawn by this node (LT5)
    pub mesh: Option<usize>,
    pub faces: Vec<RenderFace>,
    /// Point sets of unknown purpose
    pub support_boxes: Vec<Vec<Vec3>>,
    /// Instances drawn by this node (LT5)
    pub instances: Vec<usize>,
}

/// A placed prefab instance (LT5).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub index: usize,
    /// Zero for most instances
    pub bounds: BoundingBox,
    pub position: Vec3,
    pub rotation: Quat,
    pub unknown: [i32; 3],
    pub file_name: String,
    /// Render nodes listing this instance; an instance may sit in several
    pub render_nodes: Vec<usize>,
}

impl InstanceInfo {
    fn read(reader: &mut ByteReader, index: usize) -> Result<Self> {
        Ok(Self {
            index,
            bounds: reader.read_bbox()?,
            position: reader.read_vec3()?,
            rotation: reader.read_quat()?,
            unknown: [reader.read_i32()?, reader.read_i32()?, reader.read_i32()?],
            file_name: reader.read_string_i16()?,
            render_nodes: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RenderInstanceKind {
    /// A run of faces in a mesh; negative indices mean none
    Mesh {
        mesh_index: i32,
        face_index: i32,
        face_count: i32,
        unknown: [u8; 4],
    },
    /// A node of an instance file
    Prefab { node_index: i32, file_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefabReference {
    pub unknown: i32,
    pub node_index: i32,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstancePlacement {
    pub position: Vec3,
    pub rotation: Quat,
    pub prefabs: Vec<PrefabReference>,
}

impl InstancePlacement {
    fn read(reader: &mut ByteReader) -> Result<Self> {
        let position = reader.read_vec3()?;
        let rotation = reader.read_quat()?;
        let count = reader.read_count()?;
        let mut prefabs = Vec::with_capacity(count);
        for _ in 0..count {
            prefabs.push(PrefabReference {
                unknown: reader.read_i32()?,
                node_index: reader.read_i32()?,
                file_name: reader.read_string_i16()?,
            });
        }
        Ok(Self {
            position,
            rotation,
            prefabs,
        })
    }
}

/// Per-BSP instance record (LT5).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LokiRenderInstanceData {
    pub kind: RenderInstanceKind,
    pub placements: Vec<InstancePlacement>,
}

impl LokiRenderInstanceData {
    /// Decode one record, recording `bsp` on every face a mesh record
    /// points at.
    ///
    /// # Errors
    /// Returns an error for unknown record types and face runs outside the
    /// mesh.
    pub(crate) fn read(reader: &mut ByteReader, bsp: usize, meshes: &mut [Option<RenderMesh>]) -> Result<Self> {
        let kind = match reader.read_i32()? {
            0 => {
                let mesh_index = reader.read_i32()?;
                let face_index = reader.read_i32()?;
                let face_count = reader.read_i32()?;
                let unknown = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
                if mesh_index >= 0 && face_index >= 0 {
                    for face in face_run_mut(meshes, mesh_index, face_index, face_count)? {
                        face.bsps.push(bsp);
                    }
                }
                RenderInstanceKind::Mesh {
                    mesh_index,
                    face_index,
                    face_count,
                    unknown,
                }
            }
            1 => RenderInstanceKind::Prefab {
                node_index: reader.read_i32()?,
                file_name: reader.read_string_i16()?,
            },
            other => {
                return Err(Error::invalid(
                    "render tree",
                    format!("BSP #{bsp} has instance type {other}"),
                ));
            }
        };

        let count = reader.read_count()?;
        let mut placements = Vec::with_capacity(count);
        for _ in 0..count {
            placements.push(InstancePlacement::read(reader)?);
        }
        Ok(Self { kind, placements })
    }

    /// No placements and no target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
            && match &self.kind {
                RenderInstanceKind::Mesh { mesh_index, .. } => *mesh_index < 0,
                RenderInstanceKind::Prefab { file_name, .. } => file_name.is_empty(),
            }
    }
}

/// Check a raw index against a collection length.
fn checked_index(raw: i32, len: usize, what: &str) -> Result<usize> {
    usize::try_from(raw)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| Error::invalid("render tree", format!("{what} index {raw} out of range ({len})")))
}

/// Look up a face; `None` when the mesh slot is empty (unresolved external
/// mesh).
fn face_mut(meshes: &mut [Option<RenderMesh>], mesh: i32, face: i32) -> Result<Option<&mut Face>> {
    let mesh = checked_index(mesh, meshes.len(), "mesh")?;
    let Some(mesh) = meshes[mesh].as_mut() else {
        return Ok(None);
    };
    let face = checked_index(face, mesh.faces.len(), "face")?;
    Ok(Some(&mut mesh.faces[face]))
}

/// Faces `first..first + count` of a mesh; empty when the mesh slot is
/// empty.
fn face_run_mut(meshes: &mut [Option<RenderMesh>], mesh: i32, first: i32, count: i32) -> Result<&mut [Face]> {
    let mesh = checked_index(mesh, meshes.len(), "mesh")?;
    let Some(mesh) = meshes[mesh].as_mut() else {
        return Ok(&mut []);
    };
    let len = mesh.faces.len();
    let start = usize::try_from(first).ok();
    let end = first
        .checked_add(count.max(0))
        .and_then(|end| usize::try_from(end).ok());
    match (start, end) {
        (Some(start), Some(end)) if end <= len => Ok(&mut mesh.faces[start..end]),
        _ => Err(Error::invalid(
            "render tree",
            format!("face run {first}+{count} out of range ({len})"),
        )),
    }
}

fn read_support_boxes(reader: &mut ByteReader, count: usize) -> Result<Vec<Vec<Vec3>>> {
    let mut boxes = Vec::with_capacity(count);
    for _ in 0..count {
        let points = usize::from(reader.read_u8()?);
        boxes.push(reader.read_array(points)?);
    }
    Ok(boxes)
}

/// Decode the per-BSP trees of a Jupiter EX world into `bsps`.
///
/// # Errors
/// Returns an error on out-of-range mesh or face indices and on faces
/// claimed by two render nodes.
pub(crate) fn read_jupiter_tree(
    reader: &mut ByteReader,
    bsps: &mut [WorldBsp],
    meshes: &mut [Option<RenderMesh>],
) -> Result<()> {
    for bsp in bsps.iter_mut() {
        let node_count = reader.read_count()?;
        let mut nodes = Vec::with_capacity(node_count);
        for j in 0..node_count {
            let face_count = reader.read_count()?;
            let box_count = reader.read_count()?;
            let mut faces = Vec::with_capacity(face_count);
            for _ in 0..face_count {
                let bounds = reader.read_bbox()?;
                let flags = reader.read_i32()?;
                let mesh_index = reader.read_i32()?;
                let face_index = reader.read_i32()?;
                if let Some(face) = face_mut(meshes, mesh_index, face_index)? {
                    if let Some((owner_bsp, owner_node)) = face.render_node {
                        return Err(Error::invalid(
                            "render tree",
                            format!(
                                "face {mesh_index}/{face_index} claimed by BSP #{owner_bsp} node #{owner_node} and BSP #{} node #{j}",
                                bsp.index
                            ),
                        ));
                    }
                    face.bounds = bounds;
                    face.render_node = Some((bsp.index, j));
                    face.is_shadow_volume = flags != 0;
                }
                faces.push(RenderFace {
                    bounds,
                    flags,
                    mesh_index,
                    face_index,
                });
            }
            nodes.push(RenderNode {
                index: j,
                bsp: Some(bsp.index),
                mesh: None,
                faces,
                support_boxes: read_support_boxes(reader, box_count)?,
                instances: Vec::new(),
            });
        }
        debug!("BSP #{}: {} render nodes", bsp.index, nodes.len());
        bsp.render_nodes = nodes;
    }
    Ok(())
}

/// LT5 render tree contents that are not owned by a BSP.
#[derive(Debug, Clone, Default)]
pub(crate) struct LokiRenderTree {
    pub instances: Vec<InstanceInfo>,
    pub nodes: Vec<RenderNode>,
}

/// Decode the LT5 instance list, node list and per-BSP instance records.
///
/// # Errors
/// Returns an error on out-of-range indices, unknown instance types, or
/// totals that disagree with the render header.
pub(crate) fn read_loki_tree(
    reader: &mut ByteReader,
    header: &RenderHeader,
    bsps: &mut [WorldBsp],
    meshes: &mut [Option<RenderMesh>],
) -> Result<LokiRenderTree> {
    let mut instances = Vec::with_capacity(header.total_instances);
    for i in 0..header.total_instances {
        instances.push(InstanceInfo::read(reader, i)?);
    }

    let mut nodes = Vec::with_capacity(header.render_node_count);
    let mut total_faces = 0;
    let mut total_boxes = 0;
    let mut total_instances = 0;
    for j in 0..header.render_node_count {
        let face_count = reader.read_count()?;
        let box_count = reader.read_count()?;
        let instance_count = reader.read_count()?;
        let mesh_index = reader.read_i32()?;
        total_faces += face_count;
        total_boxes += box_count;
        total_instances += instance_count;

        let mesh = if mesh_index >= 0 {
            Some(checked_index(mesh_index, meshes.len(), "mesh")?)
        } else {
            None
        };
        if mesh.is_none() && face_count > 0 {
            return Err(Error::invalid("render tree", format!("node #{j} has faces but no mesh")));
        }

        let mut faces = Vec::with_capacity(face_count);
        for _ in 0..face_count {
            let bounds = reader.read_bbox()?;
            let flags = reader.read_i32()?;
            let face_index = reader.read_i32()?;
            if let Some(face) = face_mut(meshes, mesh_index, face_index)? {
                face.bounds = bounds;
                face.is_shadow_volume = flags != 0;
                face.render_nodes.push(j);
            }
            faces.push(RenderFace {
                bounds,
                flags,
                mesh_index,
                face_index,
            });
        }
        let support_boxes = read_support_boxes(reader, box_count)?;

        let mut node_instances = Vec::with_capacity(instance_count);
        for raw in reader.read_array::<i32>(instance_count)? {
            let index = checked_index(raw, instances.len(), "instance")?;
            instances[index].render_nodes.push(j);
            node_instances.push(index);
        }

        nodes.push(RenderNode {
            index: j,
            bsp: None,
            mesh,
            faces,
            support_boxes,
            instances: node_instances,
        });
    }

    check_total("render tree faces", header.face_count, total_faces)?;
    check_total("render tree support boxes", header.support_boxes, total_boxes)?;
    check_total("render tree instances", header.render_tree_instances, total_instances)?;

    for bsp in bsps.iter_mut() {
        bsp.instance_data = Some(LokiRenderInstanceData::read(reader, bsp.index, meshes)?);
    }

    Ok(LokiRenderTree { instances, nodes })
}

fn check_total(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::CountMismatch { what, expected, found })
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

    fn push_bbox(out: &mut Vec<u8>, value: f32) {
        for _ in 0..6 {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn push_string(out: &mut Vec<u8>, value: &str) {
        out.extend_from_slice(&(value.len() as i16).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }

    fn mesh_with_faces(count: usize) -> Option<RenderMesh> {
        Some(RenderMesh {
            faces: (0..count)
                .map(|index| Face {
                    index,
                    ..Face::default()
                })
                .collect(),
            ..RenderMesh::default()
        })
    }

    fn bsps(count: usize) -> Vec<WorldBsp> {
        (0..count)
            .map(|index| WorldBsp {
                index,
                ..WorldBsp::default()
            })
            .collect()
    }

    #[test]
    fn test_jupiter_tree_annotates_faces() {
        let mut data = Vec::new();
        // BSP 0: one node, two faces, one support box
        push_i32s(&mut data, &[1, 2, 1]);
        push_bbox(&mut data, 1.0);
        push_i32s(&mut data, &[1, 0, 1]);
        push_bbox(&mut data, 2.0);
        // second face sits in an unresolved mesh slot
        push_i32s(&mut data, &[0, 1, 0]);
        data.push(2);
        for _ in 0..6 {
            data.extend_from_slice(&0.5f32.to_le_bytes());
        }
        // BSP 1: no nodes
        push_i32s(&mut data, &[0]);

        let mut bsps = bsps(2);
        let mut meshes = vec![mesh_with_faces(2), None];
        let mut reader = ByteReader::from_bytes(data);
        read_jupiter_tree(&mut reader, &mut bsps, &mut meshes).unwrap();
        assert!(reader.is_eof());

        let node = &bsps[0].render_nodes[0];
        assert_eq!(node.faces.len(), 2);
        assert_eq!(node.support_boxes, vec![vec![Vec3::splat(0.5); 2]]);
        assert_eq!(node.bsp, Some(0));
        assert!(bsps[1].render_nodes.is_empty());

        let face = &meshes[0].as_ref().unwrap().faces[1];
        assert_eq!(face.render_node, Some((0, 0)));
        assert!(face.is_shadow_volume);
        assert_eq!(face.bounds.max, Vec3::splat(1.0));
        assert_eq!(meshes[0].as_ref().unwrap().faces[0].render_node, None);
    }

    #[test]
    fn test_jupiter_tree_rejects_shared_face() {
        let mut data = Vec::new();
        push_i32s(&mut data, &[2]);
        for _ in 0..2 {
            push_i32s(&mut data, &[1, 0]);
            push_bbox(&mut data, 0.0);
            push_i32s(&mut data, &[0, 0, 0]);
        }
        let mut meshes = vec![mesh_with_faces(1)];
        let result = read_jupiter_tree(&mut ByteReader::from_bytes(data), &mut bsps(1), &mut meshes);
        assert!(matches!(result, Err(Error::InvalidFormat { .. })));
    }

    #[test]
    fn test_jupiter_tree_rejects_bad_mesh() {
        let mut data = Vec::new();
        push_i32s(&mut data, &[1, 1, 0]);
        push_bbox(&mut data, 0.0);
        push_i32s(&mut data, &[0, 3, 0]);
        let mut meshes = vec![mesh_with_faces(1)];
        let result = read_jupiter_tree(&mut ByteReader::from_bytes(data), &mut bsps(1), &mut meshes);
        assert!(matches!(result, Err(Error::InvalidFormat { .. })));
    }

    fn loki_tree_data(bsp_type: i32) -> Vec<u8> {
        let mut data = Vec::new();
        // one instance
        push_bbox(&mut data, 0.0);
        for f in [1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0] {
            data.extend_from_slice(&f.to_le_bytes());
        }
        push_i32s(&mut data, &[1, 2, 0]);
        push_string(&mut data, "crates.inst");
        // node 0: one face, no boxes, one instance, mesh 0
        push_i32s(&mut data, &[1, 0, 1, 0]);
        push_bbox(&mut data, 4.0);
        push_i32s(&mut data, &[0, 1]);
        push_i32s(&mut data, &[0]);
        // node 1: empty, no mesh
        push_i32s(&mut data, &[0, 0, 0, -1]);
        // one BSP record
        push_i32s(&mut data, &[bsp_type]);
        if bsp_type == 0 {
            push_i32s(&mut data, &[0, 0, 2]);
            data.extend_from_slice(&[1, 2, 3, 4]);
        } else {
            push_i32s(&mut data, &[7]);
            push_string(&mut data, "props.inst");
        }
        // one placement with one prefab
        push_i32s(&mut data, &[1]);
        for f in [0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0] {
            data.extend_from_slice(&f.to_le_bytes());
        }
        push_i32s(&mut data, &[1, 3, 5]);
        push_string(&mut data, "a.inst");
        data
    }

    fn loki_header() -> RenderHeader {
        RenderHeader {
            render_node_count: 2,
            face_count: 1,
            total_instances: 1,
            render_tree_instances: 1,
            ..RenderHeader::default()
        }
    }

    #[test]
    fn test_loki_tree() {
        let mut bsps = bsps(1);
        let mut meshes = vec![mesh_with_faces(2)];
        let mut reader = ByteReader::from_bytes(loki_tree_data(0));
        let tree = read_loki_tree(&mut reader, &loki_header(), &mut bsps, &mut meshes).unwrap();
        assert!(reader.is_eof());

        assert_eq!(tree.instances[0].file_name, "crates.inst");
        assert_eq!(tree.instances[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(tree.instances[0].render_nodes, vec![0]);
        assert_eq!(tree.nodes[0].mesh, Some(0));
        assert_eq!(tree.nodes[0].instances, vec![0]);
        assert_eq!(tree.nodes[1].mesh, None);

        let faces = &meshes[0].as_ref().unwrap().faces;
        assert_eq!(faces[1].render_nodes, vec![0]);
        assert!(!faces[1].is_shadow_volume);
        // the BSP record covers faces 0 and 1
        assert_eq!(faces[0].bsps, vec![0]);
        assert_eq!(faces[1].bsps, vec![0]);

        let data = bsps[0].instance_data.as_ref().unwrap();
        assert!(matches!(data.kind, RenderInstanceKind::Mesh { face_count: 2, .. }));
        assert_eq!(data.placements[0].prefabs[0].file_name, "a.inst");
        assert!(!data.is_empty());
    }

    #[test]
    fn test_loki_prefab_record() {
        let mut bsps = bsps(1);
        let mut meshes = vec![mesh_with_faces(2)];
        read_loki_tree(
            &mut ByteReader::from_bytes(loki_tree_data(1)),
            &loki_header(),
            &mut bsps,
            &mut meshes,
        )
        .unwrap();
        let data = bsps[0].instance_data.as_ref().unwrap();
        assert_eq!(
            data.kind,
            RenderInstanceKind::Prefab {
                node_index: 7,
                file_name: "props.inst".into()
            }
        );
    }

    #[test]
    fn test_loki_tree_count_mismatch() {
        let header = RenderHeader {
            face_count: 5,
            ..loki_header()
        };
        let result = read_loki_tree(
            &mut ByteReader::from_bytes(loki_tree_data(0)),
            &header,
            &mut bsps(1),
            &mut vec![mesh_with_faces(2)],
        );
        assert!(matches!(
            result,
            Err(Error::CountMismatch {
                expected: 5,
                found: 1,
                ..
            })
        ));
    }

    fn mesh_record(mesh_index: i32, face_index: i32, face_count: i32) -> Vec<u8> {
        let mut data = Vec::new();
        push_i32s(&mut data, &[0, mesh_index, face_index, face_count]);
        data.extend_from_slice(&[0; 4]);
        push_i32s(&mut data, &[0]);
        data
    }

    #[test]
    fn test_face_run_on_missing_mesh() {
        let mut meshes = vec![None];
        let data = LokiRenderInstanceData::read(
            &mut ByteReader::from_bytes(mesh_record(0, i32::MAX - 1, 5)),
            0,
            &mut meshes,
        )
        .unwrap();
        assert!(matches!(data.kind, RenderInstanceKind::Mesh { face_count: 5, .. }));
    }

    #[test]
    fn test_face_run_out_of_range() {
        let mut meshes = vec![mesh_with_faces(2)];
        for (first, count) in [(1, 2), (i32::MAX - 1, 5)] {
            let result = LokiRenderInstanceData::read(
                &mut ByteReader::from_bytes(mesh_record(0, first, count)),
                0,
                &mut meshes,
            );
            assert!(matches!(result, Err(Error::InvalidFormat { .. })));
        }
        assert!(meshes[0].as_ref().unwrap().faces.iter().all(|f| f.bsps.is_empty()));
    }

    #[test]
    fn test_unknown_instance_type() {
        let result = LokiRenderInstanceData::read(
            &mut ByteReader::from_bytes(2i32.to_le_bytes().to_vec()),
            0,
            &mut [],
        );
        assert!(matches!(result, Err(Error::InvalidFormat { .. })));
    }
}
