//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! [`WorldFile`]: opening, stream layout and the decode sequence

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::Vec3;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::bsp::WorldBsp;
use super::files::{FilesSection, MeshLoadInfo};
use super::mesh::RenderMesh;
use super::object::{ObjectEncoding, ObjectProperty, WorldObject};
use super::options::{WorldLoadOptions, WorldVersion};
use super::physics::PhysicsShape;
use super::prefab::PrefabFile;
use super::render::{InstanceInfo, RenderNode, read_jupiter_tree, read_loki_tree};
use super::resolve::DataResolver;
use super::sectors::SectorData;
use super::summary::WorldSummary;
use super::{CLIENT_MAGIC, SERVER_MAGIC, SPLIT_MAGIC};
use crate::error::{Error, Result};
use crate::gamedb::{GameDbFile, HashNameTable};
use crate::io::{BoundingBox, ByteReader, Endian, OffsetTable, read_magic};

/// Attach the world path and decode stage to an error.
trait StageExt<T> {
    fn stage(self, path: &Path, stage: &'static str) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, path: &Path, stage: &'static str) -> Result<T> {
        self.map_err(|source| Error::World {
            path: path.to_path_buf(),
            stage,
            source: Box::new(source),
        })
    }
}

/// World model counts, stored XOR-masked per title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelCounts {
    pub name_count: i32,
    pub names_length: i32,
    pub plane_count: i32,
    pub bsp_count: i32,
    pub total_nodes: i32,
    pub total_polygons: i32,
    pub total_vertex_types: i32,
    pub total_vertices: i32,
}

impl ModelCounts {
    fn read(reader: &mut ByteReader, mask: i32) -> Result<Self> {
        let mut raw = [0i32; 8];
        for value in &mut raw {
            *value = reader.read_i32()? ^ mask;
        }
        Ok(Self {
            name_count: raw[0],
            names_length: raw[1],
            plane_count: raw[2],
            bsp_count: raw[3],
            total_nodes: raw[4],
            total_polygons: raw[5],
            total_vertex_types: raw[6],
            total_vertices: raw[7],
        })
    }
}

/// Leading counts of the client part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderHeader {
    pub bsp_count: usize,
    pub render_node_count: usize,
    /// Faces referenced by render nodes
    pub face_count: usize,
    pub mesh_count: usize,
    /// Jupiter EX only
    pub material_count: usize,
    /// Jupiter EX only
    pub embedded_count: usize,
    /// LT5 only
    pub total_instances: usize,
    /// LT5 only; sum of the instance lists of all render nodes
    pub render_tree_instances: usize,
    /// LT5 only
    pub support_boxes: usize,
    /// LT5 only
    pub unknown: [i32; 3],
}

impl RenderHeader {
    fn read(reader: &mut ByteReader, version: WorldVersion) -> Result<Self> {
        let mut header = Self {
            bsp_count: reader.read_count()?,
            render_node_count: reader.read_count()?,
            face_count: reader.read_count()?,
            ..Self::default()
        };
        if version.is_loki() {
            header.total_instances = reader.read_count()?;
            header.render_tree_instances = reader.read_count()?;
            header.unknown[0] = reader.read_i32()?;
            header.mesh_count = reader.read_count()?;
            header.unknown[1] = reader.read_i32()?;
            header.support_boxes = reader.read_count()?;
            header.unknown[2] = reader.read_i32()?;
        } else {
            header.mesh_count = reader.read_count()?;
            header.material_count = reader.read_count()?;
            header.embedded_count = reader.read_count()?;
        }
        Ok(header)
    }
}

/// The three streams of a world. Non-split worlds use one stream for all
/// parts.
struct WorldStreams {
    common: ByteReader,
    split: Option<(ByteReader, ByteReader)>,
}

/// A decoded world.
///
/// All cross references (faces to render nodes, objects to BSPs) are
/// resolved when [`WorldFile::open`] returns.
#[derive(Debug)]
pub struct WorldFile {
    pub path: PathBuf,
    pub version: WorldVersion,
    pub split: bool,
    /// Render, sector, object and streaming offsets of a non-split world
    pub section_offsets: Option<[i32; 4]>,
    pub bounds: BoundingBox,
    /// Offset from this world to its source world
    pub offset: Vec3,
    pub bounds2: BoundingBox,
    pub subdivision_flags: Vec<u8>,
    pub subdivision_count: i32,
    pub counts: ModelCounts,
    /// LT5 only
    pub loki_unknown: Vec<u32>,
    pub plane_normals: Vec<Vec3>,
    pub bsps: Vec<WorldBsp>,
    /// Jupiter EX blocker polygons; skipped, only counted
    pub blocker_count: usize,
    pub files: FilesSection,
    pub render_header: RenderHeader,
    /// `None` for external meshes that could not be resolved
    pub meshes: Vec<Option<RenderMesh>>,
    /// LT5 mesh whose id is `global`
    pub global_mesh: Option<usize>,
    /// LT5 only
    pub instances: Vec<InstanceInfo>,
    /// LT5 render nodes; Jupiter EX keeps them per BSP
    pub render_nodes: Vec<RenderNode>,
    pub sectors: SectorData,
    pub objects: Vec<WorldObject>,
    models_by_name: HashMap<String, usize>,
    objects_by_name: HashMap<String, usize>,
    resolver: DataResolver,
}

impl WorldFile {
    /// Decode a world file and everything it references.
    ///
    /// # Errors
    /// Returns [`Error::World`] naming the stage that failed. Missing
    /// external meshes, bundles, prefabs and the paired game database are
    /// not errors.
    pub fn open(path: impl AsRef<Path>, options: &WorldLoadOptions, names: &HashNameTable) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening world {}", path.display());

        let (mut streams, version) = open_streams(path, options).stage(path, "header")?;
        let split = streams.split.is_some();
        let game_dir = options
            .game_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let mut resolver = DataResolver::new(version, game_dir, options.effective_content_dirs());

        // common part
        let reader = &mut streams.common;
        let (section_offsets, bounds, offset) = read_common_header(reader, split).stage(path, "header")?;

        let models = read_world_models(reader, version, options).stage(path, "world models")?;
        let mut bsps = models.bsps;
        let models_by_name = index_models(&bsps);

        let shape_count = reader.read_count().stage(path, "physics")?;
        if shape_count != bsps.len() {
            return Err(Error::CountMismatch {
                what: "physics shapes",
                expected: bsps.len(),
                found: shape_count,
            })
            .stage(path, "physics");
        }
        for bsp in &mut bsps {
            bsp.shape = Some(PhysicsShape::read(reader).stage(path, "physics")?);
        }

        let files = FilesSection::read(reader, version).stage(path, "files")?;
        if version.is_loki() {
            for name in files.bundle_names() {
                resolver.cache_bundle(name).stage(path, "files")?;
            }
        }

        // client part
        let client = match streams.split.as_mut() {
            Some((_, client)) => client,
            None => {
                let position = section_position(section_offsets, 0).stage(path, "render meshes")?;
                streams.common.seek(position).stage(path, "render meshes")?;
                &mut streams.common
            }
        };
        let render_header = RenderHeader::read(client, version).stage(path, "render meshes")?;
        if render_header.bsp_count != bsps.len() {
            return Err(Error::CountMismatch {
                what: "render tree BSPs",
                expected: bsps.len(),
                found: render_header.bsp_count,
            })
            .stage(path, "render meshes");
        }
        let (mut meshes, global_mesh) =
            read_meshes(client, version, &render_header, &files, &mut resolver).stage(path, "render meshes")?;

        let (instances, render_nodes) = if version.is_loki() {
            let tree = read_loki_tree(client, &render_header, &mut bsps, &mut meshes).stage(path, "render tree")?;
            (tree.instances, tree.nodes)
        } else {
            read_jupiter_tree(client, &mut bsps, &mut meshes).stage(path, "render tree")?;
            (Vec::new(), Vec::new())
        };

        let sectors = SectorData::read(client, version).stage(path, "sectors")?;

        // server part
        let server = match streams.split.as_mut() {
            Some((server, _)) => server,
            None => {
                let position = section_position(section_offsets, 2).stage(path, "objects")?;
                streams.common.seek(position).stage(path, "objects")?;
                &mut streams.common
            }
        };
        let mut objects = read_objects(server, version).stage(path, "objects")?;

        if version.is_loki() && options.merge_game_db {
            merge_game_db(path, &mut objects, names).stage(path, "game database")?;
        }

        let objects_by_name = index_objects(&objects);
        link_objects(&mut bsps, &mut objects, &models_by_name);

        let world = Self {
            path: path.to_path_buf(),
            version,
            split,
            section_offsets,
            bounds,
            offset,
            bounds2: models.bounds2,
            subdivision_flags: models.subdivision_flags,
            subdivision_count: models.subdivision_count,
            counts: models.counts,
            loki_unknown: models.loki_unknown,
            plane_normals: models.plane_normals,
            bsps,
            blocker_count: models.blocker_count,
            files,
            render_header,
            meshes,
            global_mesh,
            instances,
            render_nodes,
            sectors,
            objects,
            models_by_name,
            objects_by_name,
            resolver,
        };
        info!(
            "Loaded world {}: {} BSPs, {} meshes, {} objects ({} linked)",
            path.display(),
            world.bsps.len(),
            world.meshes.len(),
            world.objects.len(),
            world.objects.iter().filter(|o| o.linked_bsp.is_some()).count()
        );
        Ok(world)
    }

    /// BSP carrying the given name, ignoring case.
    #[must_use]
    pub fn bsp_by_name(&self, name: &str) -> Option<&WorldBsp> {
        self.models_by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.bsps[i])
    }

    /// Object with the given name, ignoring case. The last object with a
    /// repeated name wins.
    #[must_use]
    pub fn object_by_name(&self, name: &str) -> Option<&WorldObject> {
        self.objects_by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.objects[i])
    }

    /// Open an external stream the way the world's meshes were opened.
    /// `Ok(None)` when it cannot be found.
    ///
    /// # Errors
    /// Returns an error if the stream exists but cannot be read.
    pub fn resolve_data_stream(&mut self, name: &str) -> Result<Option<ByteReader>> {
        self.resolver.resolve(name)
    }

    /// Decode a prefab referenced by an LT5 instance, once per name.
    ///
    /// # Errors
    /// Returns an error if the prefab exists but fails to decode.
    pub fn read_prefab_file(&mut self, name: &str) -> Result<Option<&PrefabFile>> {
        self.resolver.read_prefab(name)
    }

    /// Bundles opened while decoding, in load order.
    pub fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.resolver.bundle_names()
    }

    /// Directory external streams resolve against.
    #[must_use]
    pub fn game_dir(&self) -> &Path {
        self.resolver.game_dir()
    }

    #[must_use]
    pub fn summary(&self) -> WorldSummary {
        WorldSummary::new(self)
    }
}

fn read_common_header(reader: &mut ByteReader, split: bool) -> Result<(Option<[i32; 4]>, BoundingBox, Vec3)> {
    let section_offsets = if split {
        None
    } else {
        Some([reader.read_i32()?, reader.read_i32()?, reader.read_i32()?, reader.read_i32()?])
    };
    Ok((section_offsets, reader.read_bbox()?, reader.read_vec3()?))
}

fn section_position(offsets: Option<[i32; 4]>, section: usize) -> Result<u64> {
    let raw = offsets.map_or(-1, |o| o[section]);
    u64::try_from(raw).map_err(|_| Error::NegativeLength(i64::from(raw)))
}

/// Sibling path of a split world part.
fn sibling_path(path: &Path, version: WorldVersion, server: bool) -> PathBuf {
    let extension = match (version, server) {
        (WorldVersion::Fear, true) => "WorldServer00p",
        (WorldVersion::Fear, false) => "WorldClient00p",
        (WorldVersion::Loki, true) => "WldSrvr",
        (WorldVersion::Loki, false) => "WldClnt",
    };
    path.with_extension(extension)
}

fn open_streams(path: &Path, options: &WorldLoadOptions) -> Result<(WorldStreams, WorldVersion)> {
    let mut common = ByteReader::read_file(path)?;
    let is_split = read_magic(&mut common)? == SPLIT_MAGIC;
    if !is_split {
        common.seek(0)?;
    }
    let raw_version = common.read_i32()?;
    let version = options
        .version_codes
        .classify(raw_version)
        .ok_or(Error::UnsupportedVersion {
            format: "world",
            version: i64::from(raw_version),
        })?;
    debug!("World version {raw_version} ({version:?}), split: {is_split}");

    let split = if is_split {
        let server = open_sibling(&sibling_path(path, version, true), SERVER_MAGIC, "WLDS", raw_version)?;
        let client = open_sibling(&sibling_path(path, version, false), CLIENT_MAGIC, "WLDC", raw_version)?;
        Some((server, client))
    } else {
        None
    };
    Ok((WorldStreams { common, split }, version))
}

fn open_sibling(path: &Path, magic: [u8; 4], expected: &'static str, version: i32) -> Result<ByteReader> {
    if !path.is_file() {
        return Err(Error::SplitFileMissing {
            path: path.to_path_buf(),
        });
    }
    let mut reader = ByteReader::read_file(path)?;
    let found = read_magic(&mut reader)?;
    if found != magic {
        return Err(Error::InvalidMagic {
            format: "world",
            expected,
            found,
        });
    }
    let sibling_version = reader.read_i32()?;
    if sibling_version != version {
        return Err(Error::invalid(
            "world",
            format!("{} has version {sibling_version}, expected {version}", path.display()),
        ));
    }
    Ok(reader)
}

struct WorldModels {
    bounds2: BoundingBox,
    subdivision_count: i32,
    subdivision_flags: Vec<u8>,
    counts: ModelCounts,
    loki_unknown: Vec<u32>,
    plane_normals: Vec<Vec3>,
    bsps: Vec<WorldBsp>,
    blocker_count: usize,
}

fn read_world_models(reader: &mut ByteReader, version: WorldVersion, options: &WorldLoadOptions) -> Result<WorldModels> {
    let bounds2 = reader.read_bbox()?;
    let subdivision_count = reader.read_i32()?;
    if !version.is_loki() {
        let _zero = reader.read_i32()?;
    }
    let flag_bytes = usize::try_from(subdivision_count)
        .map_err(|_| Error::NegativeLength(i64::from(subdivision_count)))?
        .div_ceil(8);
    let subdivision_flags = reader.read_bytes(flag_bytes)?;

    let counts = ModelCounts::read(reader, options.game.count_mask())?;
    debug!("World model counts: {counts:?}");
    let loki_unknown = if version.is_loki() {
        reader.read_counted_array::<u32>()?
    } else {
        Vec::new()
    };

    let names_length = usize::try_from(counts.names_length)
        .map_err(|_| Error::NegativeLength(i64::from(counts.names_length)))?;
    let mut names = OffsetTable::new(reader.read_bytes(names_length)?, Endian::Little);
    let name_count = usize::try_from(counts.name_count)
        .map_err(|_| Error::NegativeLength(i64::from(counts.name_count)))?;
    let mut names_by_bsp: IndexMap<i32, Vec<String>> = IndexMap::new();
    for _ in 0..name_count {
        let offset = reader.read_i32()?;
        let bsp = reader.read_i32()?;
        names_by_bsp.entry(bsp).or_default().push(names.string_at(offset)?);
    }

    let plane_count = usize::try_from(counts.plane_count)
        .map_err(|_| Error::NegativeLength(i64::from(counts.plane_count)))?;
    let plane_normals = reader.read_array::<Vec3>(plane_count)?;

    let bsp_count = usize::try_from(counts.bsp_count)
        .map_err(|_| Error::NegativeLength(i64::from(counts.bsp_count)))?;
    let mut bsps = Vec::with_capacity(bsp_count);
    for i in 0..bsp_count {
        let bsp_names = i32::try_from(i)
            .ok()
            .and_then(|key| names_by_bsp.shift_remove(&key))
            .unwrap_or_default();
        bsps.push(WorldBsp::read(reader, version, i, bsp_names)?);
    }
    for (bsp, names) in &names_by_bsp {
        warn!("Names {names:?} refer to missing BSP #{bsp}");
    }

    let mut blocker_count = 0;
    if !version.is_loki() {
        blocker_count = reader.read_count()?;
        let _point_total = reader.read_i32()?;
        for _ in 0..blocker_count {
            let _plane = reader.read_plane()?;
            let _points = reader.read_counted_array::<Vec3>()?;
        }
    }

    Ok(WorldModels {
        bounds2,
        subdivision_count,
        subdivision_flags,
        counts,
        loki_unknown,
        plane_normals,
        bsps,
        blocker_count,
    })
}

/// BSP names, lower-cased, to BSP index. The first BSP to carry a name
/// keeps it.
fn index_models(bsps: &[WorldBsp]) -> HashMap<String, usize> {
    let mut models = HashMap::new();
    for bsp in bsps {
        for name in &bsp.names {
            let key = name.to_lowercase();
            if let Some(&owner) = models.get(&key) {
                warn!("Duplicate model name '{name}' in BSP #{} (kept BSP #{owner})", bsp.index);
            } else {
                models.insert(key, bsp.index);
            }
        }
    }
    models
}

/// Id a load info is keyed by: the last dotted part of the file stem.
fn mesh_id(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
    stem.rsplit_once('.').map_or(stem, |(_, id)| id)
}

fn read_meshes(
    reader: &mut ByteReader,
    version: WorldVersion,
    header: &RenderHeader,
    files: &FilesSection,
    resolver: &mut DataResolver,
) -> Result<(Vec<Option<RenderMesh>>, Option<usize>)> {
    if header.embedded_count > header.mesh_count {
        return Err(Error::invalid(
            "world",
            format!("{} embedded meshes of {}", header.embedded_count, header.mesh_count),
        ));
    }
    let mut load_infos: IndexMap<String, MeshLoadInfo> = if version.is_loki() {
        files.load_info_map()
    } else {
        IndexMap::new()
    };

    let mut meshes = Vec::with_capacity(header.mesh_count);
    for i in 0..header.embedded_count {
        meshes.push(Some(RenderMesh::read_embedded(reader, version, i)?));
    }

    let mut global_mesh = None;
    for i in header.embedded_count..header.mesh_count {
        let _one = reader.read_i32()?;
        let material_count = reader.read_count()?;
        let file_name = reader.read_string_i16()?;
        let _zero = reader.read_i32()?;
        let materials = (0..material_count)
            .map(|_| reader.read_string_i16())
            .collect::<Result<Vec<_>>>()?;

        let Some(mut stream) = resolver.resolve(&file_name)? else {
            warn!("Render mesh #{i} '{file_name}' left unresolved");
            meshes.push(None);
            continue;
        };
        let mut mesh = RenderMesh::read_external(&mut stream, version, i, &file_name, materials)?;
        if version.is_loki() {
            let id = mesh_id(&file_name);
            mesh.load_info = load_infos.shift_remove(&id.to_lowercase());
            if id.eq_ignore_ascii_case("global") {
                global_mesh = Some(i);
            }
        }
        debug!("Render mesh #{i} '{file_name}': {} faces", mesh.faces.len());
        meshes.push(Some(mesh));
    }

    if let Some(name) = load_infos.keys().next() {
        warn!("{} mesh load infos were not assigned, including '{name}'", load_infos.len());
    }
    Ok((meshes, global_mesh))
}

fn read_objects(reader: &mut ByteReader, version: WorldVersion) -> Result<Vec<WorldObject>> {
    let count = reader.read_count()?;
    let encoding = ObjectEncoding::from(version);
    (0..count)
        .map(|i| WorldObject::read(reader, i, encoding))
        .collect()
}

/// Object names, lower-cased, to object index; the last object with a
/// name wins.
fn index_objects(objects: &[WorldObject]) -> HashMap<String, usize> {
    objects
        .iter()
        .filter(|o| o.has_link_name())
        .filter_map(|o| o.name().map(|name| (name.to_lowercase(), o.index)))
        .collect()
}

/// Append the attributes of each object's record in the paired `.gamedb`.
fn merge_game_db(path: &Path, objects: &mut [WorldObject], names: &HashNameTable) -> Result<()> {
    let db_path = path.with_extension("gamedb");
    if !db_path.is_file() {
        warn!("Game database for {} not found", path.display());
        return Ok(());
    }
    let db = GameDbFile::open(&db_path, names)?;
    if db.categories.len() != 1 {
        warn!("{} has {} categories, using the first", db_path.display(), db.categories.len());
    }
    let Some(category) = db.categories.first() else {
        return Ok(());
    };

    for object in objects.iter_mut().filter(|o| o.db_index >= 0) {
        let Some(record) = usize::try_from(object.db_index)
            .ok()
            .and_then(|i| category.records.get(i))
        else {
            warn!(
                "Object #{} refers to record {} of {}",
                object.index,
                object.db_index,
                category.records.len()
            );
            continue;
        };
        for attribute in &record.attributes {
            if attribute.values.len() > 1 {
                debug!("Attribute '{}' has {} values, using the first", attribute.name, attribute.values.len());
            }
            if let Some(value) = attribute.values.first() {
                object
                    .properties
                    .push(ObjectProperty::new(attribute.name.clone(), value.clone().into()));
            }
        }
    }
    Ok(())
}

/// Link each named object to the BSP of the same name.
fn link_objects(bsps: &mut [WorldBsp], objects: &mut [WorldObject], models: &HashMap<String, usize>) {
    for object in objects.iter_mut() {
        if !object.has_link_name() {
            continue;
        }
        let Some(name) = object.name().map(str::to_string) else {
            continue;
        };
        let Some(&bsp_index) = models.get(&name.to_lowercase()) else {
            continue;
        };
        let bsp = &mut bsps[bsp_index];
        if bsp.linked_objects.contains_key(&name) {
            warn!("Duplicate object name '{name}' not linked to BSP #{bsp_index}");
        } else {
            bsp.linked_objects.insert(name, object.index);
        }
        object.linked_bsp = Some(bsp_index);
    }
}
