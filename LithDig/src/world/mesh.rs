//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Render meshes: vertex layouts, faces and vertices
//!
//! A mesh carries two shared blobs, vertex data and 16-bit triangle
//! indices. Each face owns a window into both, decoded with one of the
//! mesh's vertex types.

use glam::{Vec2, Vec3, Vec4};
use serde::Serialize;
use tracing::{debug, warn};

use super::files::MeshLoadInfo;
use super::options::WorldVersion;
use super::{MESH_MAGIC, MESH_VERSION};
use crate::error::{Error, Result};
use crate::io::{BoundingBox, ByteReader, Rgba32, read_magic, to_len, to_len_i32};

/// Property flag marking the last slot of a Jupiter EX vertex type.
const LAST_PROPERTY_MARKER: u16 = 255;

/// Binary encoding of one vertex slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VertexFormat {
    Vector2,
    Vector3,
    Vector4,
    Rgba,
    SkeletalIndex,
    /// Two `i16` scaled by `1 / 32767` (LT5)
    CompressedVector2,
    /// End of the slot list
    Exit,
    Other(u8),
}

impl VertexFormat {
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Vector2,
            2 => Self::Vector3,
            3 => Self::Vector4,
            4 => Self::Rgba,
            5 => Self::SkeletalIndex,
            8 => Self::CompressedVector2,
            17 => Self::Exit,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            Self::Vector2 => 1,
            Self::Vector3 => 2,
            Self::Vector4 => 3,
            Self::Rgba => 4,
            Self::SkeletalIndex => 5,
            Self::CompressedVector2 => 8,
            Self::Exit => 17,
            Self::Other(v) => v,
        }
    }

    /// Bytes one slot of this format occupies.
    ///
    /// # Errors
    /// Skeletal indices and unknown formats are not decoded; `Exit` has no
    /// size.
    pub fn size(self) -> Result<usize> {
        match self {
            Self::Vector2 => Ok(8),
            Self::Vector3 => Ok(12),
            Self::Vector4 => Ok(16),
            Self::Rgba | Self::CompressedVector2 => Ok(4),
            Self::SkeletalIndex => Err(Error::NotImplemented("skeletal index vertex format".into())),
            Self::Exit => Err(Error::invalid("vertex type", "exit marker has no size")),
            Self::Other(v) => Err(Error::NotImplemented(format!("vertex format {v}"))),
        }
    }
}

/// Semantic of one vertex slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VertexUsage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    TexCoords,
    Tangent,
    Binormal,
    Color,
    Other(u8),
}

impl VertexUsage {
    /// Map a Jupiter EX usage tag.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Position,
            1 => Self::BlendWeight,
            2 => Self::BlendIndices,
            3 => Self::Normal,
            5 => Self::TexCoords,
            6 => Self::Tangent,
            7 => Self::Binormal,
            10 => Self::Color,
            other => Self::Other(other),
        }
    }

    /// Map an LT5 usage tag, which uses its own compact numbering.
    #[must_use]
    pub fn from_loki(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Position,
            1 => Self::Normal,
            2 => Self::Tangent,
            3 => Self::Binormal,
            4 => Self::TexCoords,
            5 => Self::Color,
            _ => return None,
        })
    }

    /// Jupiter EX tag.
    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            Self::Position => 0,
            Self::BlendWeight => 1,
            Self::BlendIndices => 2,
            Self::Normal => 3,
            Self::TexCoords => 5,
            Self::Tangent => 6,
            Self::Binormal => 7,
            Self::Color => 10,
            Self::Other(v) => v,
        }
    }
}

/// One slot of a vertex type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VertexProperty {
    /// Byte offset in the vertex (Jupiter EX); -1 means "follows the
    /// previous slot"
    pub offset: i32,
    pub format: VertexFormat,
    pub usage: VertexUsage,
    /// Usage index (UV channel and so on)
    pub index: u8,
    pub unknown1: u16,
    pub unknown2: u8,
}

impl VertexProperty {
    fn slot_error(&self) -> Error {
        Error::UnknownVertexSlot {
            usage: self.usage.raw(),
            format: self.format.raw(),
            index: self.index,
        }
    }
}

/// Layout of the vertices of some faces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VertexType {
    pub index: usize,
    pub properties: Vec<VertexProperty>,
    /// Some Jupiter EX layouts list slot offsets out of order. Decoding
    /// still works because every slot seeks to its own offset.
    pub has_backward_offsets: bool,
    /// Computed vertex size in bytes
    pub size: usize,
}

impl VertexType {
    /// Decode a vertex type.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVertexSlot`] for usage/format pairs that are
    /// not decoded, and an error for formats without a known size.
    pub fn read(reader: &mut ByteReader, version: WorldVersion, index: usize) -> Result<Self> {
        let struct_size = to_len_i32(reader.read_i32()?)?;
        // Jupiter EX stores the structure size in bytes, LT5 the slot count
        let property_count = if version.is_loki() { struct_size } else { struct_size / 8 };

        let mut vertex_type = Self {
            index,
            ..Self::default()
        };
        let mut last_offset = -1;
        for _ in 0..property_count {
            let property = read_property(reader, version)?;
            vertex_type.properties.push(property);
            if property.unknown1 == LAST_PROPERTY_MARKER {
                break;
            }
            if !version.is_loki() && property.offset <= last_offset {
                vertex_type.has_backward_offsets = true;
            }
            last_offset = property.offset;

            let known = matches!(
                (property.usage, property.format),
                (
                    VertexUsage::Position | VertexUsage::Normal | VertexUsage::Tangent | VertexUsage::Binormal,
                    VertexFormat::Vector3
                ) | (
                    VertexUsage::TexCoords,
                    VertexFormat::Vector2 | VertexFormat::Vector3 | VertexFormat::Vector4 | VertexFormat::CompressedVector2
                ) | (VertexUsage::Color, VertexFormat::Rgba)
                    | (VertexUsage::BlendWeight | VertexUsage::BlendIndices, _)
            );
            if !known {
                return Err(property.slot_error());
            }
            vertex_type.size += property.format.size()?;
        }
        Ok(vertex_type)
    }

    /// Number of slots with the given usage.
    #[must_use]
    pub fn count(&self, usage: VertexUsage) -> usize {
        self.properties.iter().filter(|p| p.usage == usage).count()
    }
}

fn read_property(reader: &mut ByteReader, version: WorldVersion) -> Result<VertexProperty> {
    if version.is_loki() {
        let unknown2 = reader.read_u8()?;
        let format = VertexFormat::from_u8(reader.read_u8()?);
        let usage_tag = reader.read_u8()?;
        let index = reader.read_u8()?;
        let usage = VertexUsage::from_loki(usage_tag).ok_or(Error::UnknownVertexSlot {
            usage: usage_tag,
            format: format.raw(),
            index,
        })?;
        Ok(VertexProperty {
            offset: -1,
            format,
            usage,
            index,
            unknown1: 0,
            unknown2,
        })
    } else {
        let unknown1 = reader.read_u16()?;
        let offset = i32::from(reader.read_u16()?);
        let format = VertexFormat::from_u8(reader.read_u8()?);
        let unknown2 = reader.read_u8()?;
        let usage = VertexUsage::from_u8(reader.read_u8()?);
        let index = reader.read_u8()?;
        Ok(VertexProperty {
            offset,
            format,
            usage,
            index,
            unknown1,
            unknown2,
        })
    }
}

/// A decoded vertex. Slots the vertex type does not declare stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub uv: [Vec2; 4],
    /// Texture coordinates stored as 3- or 4-component vectors
    pub tex4: [Vec4; 2],
    pub color: Rgba32,
}

impl Vertex {
    /// Decode one vertex laid out as `vertex_type` describes.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVertexSlot`] for blend data and any slot
    /// combination that is not decoded.
    pub fn read(reader: &mut ByteReader, vertex_type: &VertexType) -> Result<Self> {
        let mut vertex = Self::default();
        let start = reader.position();
        for property in &vertex_type.properties {
            if property.format == VertexFormat::Exit {
                break;
            }
            if let Ok(offset) = u64::try_from(property.offset) {
                reader.seek(start + offset)?;
            }
            match (property.usage, property.format, property.index) {
                (VertexUsage::Position, VertexFormat::Vector3, 0) => vertex.position = reader.read_vec3()?,
                (VertexUsage::Normal, VertexFormat::Vector3, 0) => vertex.normal = reader.read_vec3()?,
                (VertexUsage::Tangent, VertexFormat::Vector3, 0) => vertex.tangent = reader.read_vec3()?,
                (VertexUsage::Binormal, VertexFormat::Vector3, 0) => vertex.binormal = reader.read_vec3()?,
                (VertexUsage::TexCoords, VertexFormat::Vector2, i @ 0..=3) => {
                    vertex.uv[usize::from(i)] = reader.read_vec2()?;
                }
                (VertexUsage::TexCoords, VertexFormat::CompressedVector2, i @ 0..=1) => {
                    let u = f32::from(reader.read_i16()?) / f32::from(i16::MAX);
                    let v = f32::from(reader.read_i16()?) / f32::from(i16::MAX);
                    vertex.uv[usize::from(i)] = Vec2::new(u, v);
                }
                (VertexUsage::TexCoords, VertexFormat::Vector3, i @ 0..=1) => {
                    vertex.tex4[usize::from(i)] = reader.read_vec3()?.extend(0.0);
                }
                (VertexUsage::TexCoords, VertexFormat::Vector4, i @ 0..=1) => {
                    vertex.tex4[usize::from(i)] = reader.read_vec4()?;
                }
                // higher channels are skipped
                (VertexUsage::TexCoords, VertexFormat::Vector3, _) => {
                    reader.read_vec3()?;
                }
                (VertexUsage::TexCoords, VertexFormat::Vector4, _) => {
                    reader.read_vec4()?;
                }
                (VertexUsage::Color, VertexFormat::Rgba, 0) => vertex.color = reader.read_rgba32()?,
                _ => return Err(property.slot_error()),
            }
        }
        Ok(vertex)
    }
}

/// A run of triangles sharing a material and vertex type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Face {
    pub index: usize,
    pub material_id: i32,
    pub unknown1: i32,
    /// Index into the owning mesh's vertex types
    pub vertex_type: usize,
    pub vertices: Vec<Vertex>,
    /// Triangle list, three indices per triangle, relative to `vertices`
    pub indices: Vec<u32>,

    // Filled in by the render tree
    pub bounds: BoundingBox,
    pub is_shadow_volume: bool,
    /// Jupiter EX owner as `(bsp, render node)`
    pub render_node: Option<(usize, usize)>,
    /// LT5 render nodes referencing this face
    pub render_nodes: Vec<usize>,
    /// LT5 BSPs whose instance data points at this face
    pub bsps: Vec<usize>,
}

impl Face {
    /// Decode a face header and its window of the shared vertex and triangle
    /// blobs.
    ///
    /// # Errors
    /// Returns an error for bad vertex type indices, windows outside the
    /// blobs, or triangle indices that shift below zero.
    pub fn read(
        reader: &mut ByteReader,
        version: WorldVersion,
        index: usize,
        vertex_types: &[VertexType],
        vertex_data: &mut ByteReader,
        triangle_data: &mut ByteReader,
    ) -> Result<Self> {
        let vertex_count;
        let vertex_size;
        let triangle_start;
        let triangle_shift;
        let triangle_count;
        let material_id;
        let unknown1;
        let vertex_type;

        if version.is_loki() {
            triangle_shift = -i64::from(reader.read_i32()?);
            vertex_count = to_len_i32(reader.read_i32()?)?;
            triangle_start = reader.read_i32()?;
            let _vertex_start = reader.read_i32()?;
            triangle_count = to_len_i32(reader.read_i32()?)?;
            material_id = reader.read_i32()?;
            unknown1 = reader.read_i32()?;
            let _unknown2 = reader.read_i32()?;
            vertex_type = lookup_vertex_type(vertex_types, reader.read_i32()?)?;
            vertex_size = vertex_types[vertex_type].size;
            if vertex_size > 0 {
                vertex_data.align(vertex_size as u64)?;
            }
        } else {
            let vertex_start = reader.read_i32()?;
            vertex_count = to_len_i32(reader.read_i32()?)?;
            vertex_size = to_len_i32(reader.read_i32()?)?;
            triangle_start = reader.read_i32()?;
            triangle_shift = i64::from(reader.read_i32()?) - i64::from(vertex_start);
            triangle_count = to_len_i32(reader.read_i32()?)?;
            material_id = reader.read_i32()?;
            unknown1 = reader.read_i32()?;
            vertex_type = lookup_vertex_type(vertex_types, reader.read_i32()?)?;
            let start = to_len(i64::from(vertex_start) * vertex_size as i64)?;
            vertex_data.seek(start as u64)?;
        }

        let layout = &vertex_types[vertex_type];
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let start = vertex_data.position();
            vertices.push(Vertex::read(vertex_data, layout)?);
            let end = start + vertex_size as u64;
            if vertex_data.position() != end {
                debug!(
                    "Face #{index}: vertex ended at {} instead of {end}",
                    vertex_data.position()
                );
                vertex_data.seek(end)?;
            }
        }

        triangle_data.seek(to_len(i64::from(triangle_start) * 2)? as u64)?;
        let mut indices = Vec::with_capacity(triangle_count * 3);
        for _ in 0..triangle_count * 3 {
            let shifted = i64::from(triangle_data.read_u16()?) + triangle_shift;
            let value = u32::try_from(shifted).map_err(|_| {
                Error::invalid("render mesh", format!("face #{index} has negative vertex index {shifted}"))
            })?;
            indices.push(value);
        }

        Ok(Self {
            index,
            material_id,
            unknown1,
            vertex_type,
            vertices,
            indices,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn lookup_vertex_type(vertex_types: &[VertexType], raw: i32) -> Result<usize> {
    usize::try_from(raw)
        .ok()
        .filter(|&i| i < vertex_types.len())
        .ok_or_else(|| {
            Error::invalid(
                "render mesh",
                format!("vertex type {raw} out of range ({} types)", vertex_types.len()),
            )
        })
}

/// Vertex types and faces shared by meshes and prefabs.
#[derive(Debug, Clone, Default)]
pub(crate) struct MeshGeometry {
    pub vertex_types: Vec<VertexType>,
    pub faces: Vec<Face>,
}

/// Decode the vertex/triangle blobs, then the vertex types and faces that
/// index into them.
pub(crate) fn read_faces_and_vertices(
    reader: &mut ByteReader,
    version: WorldVersion,
    vertex_type_count: i32,
    face_count: i32,
) -> Result<MeshGeometry> {
    let vertex_data_size = reader.read_i32()?;
    let triangle_data_size = reader.read_i32()?;
    let mut vertex_data = ByteReader::from_bytes(reader.read_bytes_signed(i64::from(vertex_data_size))?);
    let mut triangle_data = ByteReader::from_bytes(reader.read_bytes_signed(i64::from(triangle_data_size))?);

    let declared_types = reader.read_i32()?;
    if declared_types != vertex_type_count {
        warn!("Mesh declares {vertex_type_count} vertex types but lists {declared_types}");
    }
    let declared_types = to_len_i32(declared_types)?;
    let mut vertex_types = Vec::with_capacity(declared_types);
    for i in 0..declared_types {
        let vertex_type = VertexType::read(reader, version, i)?;
        if vertex_type.has_backward_offsets {
            debug!("Vertex type #{i} has backward offsets");
        }
        vertex_types.push(vertex_type);
    }

    let declared_faces = reader.read_i32()?;
    if declared_faces != face_count {
        warn!("Mesh declares {face_count} faces but lists {declared_faces}");
    }
    let declared_faces = to_len_i32(declared_faces)?;
    let mut faces = Vec::with_capacity(declared_faces);
    for i in 0..declared_faces {
        faces.push(Face::read(
            reader,
            version,
            i,
            &vertex_types,
            &mut vertex_data,
            &mut triangle_data,
        )?);
    }

    Ok(MeshGeometry { vertex_types, faces })
}

/// A render mesh, embedded in the world or loaded from a `MESH` file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderMesh {
    pub index: usize,
    /// Source file of an external mesh
    pub external_file: Option<String>,
    pub vertex_types: Vec<VertexType>,
    pub faces: Vec<Face>,
    pub materials: Vec<String>,
    /// LT5 load info matched by file name
    pub load_info: Option<MeshLoadInfo>,
    /// Header fields with no known meaning: the LT5 leading count (1 before
    /// LT5), two vertex related counts, a flag, and the Jupiter EX second
    /// face count
    pub unknown: [i32; 5],
}

impl RenderMesh {
    /// Decode a mesh stored inline in the world's client stream.
    ///
    /// # Errors
    /// Returns an error on truncation or undecodable vertex data.
    pub fn read_embedded(reader: &mut ByteReader, version: WorldVersion, index: usize) -> Result<Self> {
        let (mut mesh, material_count) = Self::read_body(reader, version, index)?;
        mesh.materials = (0..material_count)
            .map(|_| reader.read_string_i16())
            .collect::<Result<_>>()?;
        Ok(mesh)
    }

    /// Decode a standalone `MESH` file. Its materials were listed by the
    /// world that references it.
    ///
    /// # Errors
    /// Returns an error on bad magic or version, truncation, or undecodable
    /// vertex data.
    pub fn read_external(
        reader: &mut ByteReader,
        version: WorldVersion,
        index: usize,
        file_name: &str,
        materials: Vec<String>,
    ) -> Result<Self> {
        let magic = read_magic(reader)?;
        if magic != MESH_MAGIC {
            return Err(Error::InvalidMagic {
                format: "render mesh",
                expected: "MESH",
                found: magic,
            });
        }
        let mesh_version = reader.read_i32()?;
        if mesh_version != MESH_VERSION {
            return Err(Error::UnsupportedVersion {
                format: "render mesh",
                version: i64::from(mesh_version),
            });
        }
        let (mut mesh, _material_count) = Self::read_body(reader, version, index)?;
        mesh.external_file = Some(file_name.to_string());
        mesh.materials = materials;
        Ok(mesh)
    }

    fn read_body(reader: &mut ByteReader, version: WorldVersion, index: usize) -> Result<(Self, usize)> {
        let leading = if version.is_loki() { reader.read_i32()? } else { 1 };
        let face_count = reader.read_i32()?;
        let vertex_type_count = reader.read_i32()?;
        let unknown2 = reader.read_i32()?;
        let unknown3 = reader.read_i32()?;
        let flag = reader.read_i32()?;
        let face_count_a = if version.is_loki() { 0 } else { reader.read_i32()? };
        let material_count = to_len_i32(reader.read_i32()?)?;

        let geometry = read_faces_and_vertices(reader, version, vertex_type_count, face_count)?;
        let mesh = Self {
            index,
            vertex_types: geometry.vertex_types,
            faces: geometry.faces,
            unknown: [leading, unknown2, unknown3, flag, face_count_a],
            ..Self::default()
        };
        Ok((mesh, material_count))
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.faces.iter().map(|f| f.vertices.len()).sum()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(Face::triangle_count).sum()
    }

    /// Material name of a face, if its id is in range.
    #[must_use]
    pub fn material_of(&self, face: &Face) -> Option<&str> {
        usize::try_from(face.material_id)
            .ok()
            .and_then(|i| self.materials.get(i))
            .map(String::as_str)
    }
}
