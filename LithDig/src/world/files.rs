//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! The files section: asset folders, bundles and per-mesh load info

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use tracing::{debug, warn};

use super::options::WorldVersion;
use crate::error::Result;
use crate::io::{ByteReader, Endian, OffsetTable, to_len_i32};

/// Load information for one LT5 render mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeshLoadInfo {
    pub name: String,
    pub activate_message: String,
    pub deactivate_message: String,
    pub sound: String,
    /// Not unique per mesh
    pub type_id: u32,
    /// Render nodes that draw this mesh
    pub render_nodes: Vec<u32>,
    pub required_bundles: Vec<String>,
}

/// Decoded files section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilesSection {
    /// LT5 prefab id to the render nodes it contains
    pub prefab_nodes: IndexMap<i32, Vec<i32>>,
    /// Sum of child counts over all prefabs (LT5)
    pub prefab_child_count: i32,
    pub unknown_a: [u16; 4],
    pub mesh_load_info_count: i32,
    /// Declared string count; close to `string_count` but not exact
    pub string_count_approx: i32,
    pub portal_count: i32,
    pub node_count_y: i32,
    /// Unknown fields; the last is LT5 only
    pub unknown_b: [i32; 5],
    /// Strings actually present in the string table
    pub string_count: usize,
    /// Jupiter EX `(folder, file)` pairs
    pub asset_dirs: Vec<(String, String)>,
    /// LT5 files needed by every mesh, bundles among them
    pub global_files: Vec<String>,
    pub mesh_load_infos: Vec<MeshLoadInfo>,
}

impl FilesSection {
    /// Decode the files section.
    ///
    /// # Errors
    /// Returns an error on truncation, negative counts, or string offsets
    /// outside the string table.
    pub fn read(reader: &mut ByteReader, version: WorldVersion) -> Result<Self> {
        let mut section = Self::default();

        if version.is_loki() {
            let prefab_count = reader.read_count()?;
            section.prefab_child_count = reader.read_i32()?;
            for _ in 0..prefab_count {
                let id = reader.read_i32()?;
                let nodes = reader.read_counted_array::<i32>()?;
                match section.prefab_nodes.entry(id) {
                    Entry::Occupied(_) => warn!("Duplicate prefab id {id} in files section"),
                    Entry::Vacant(slot) => {
                        slot.insert(nodes);
                    }
                }
            }
        }

        let string_length = to_len_i32(reader.read_i32()?)?;
        section.unknown_a = [reader.read_u16()?, reader.read_u16()?, reader.read_u16()?, reader.read_u16()?];
        section.mesh_load_info_count = reader.read_i32()?;
        section.string_count_approx = reader.read_i32()?;
        section.portal_count = reader.read_i32()?;
        section.unknown_b[0] = reader.read_i32()?;
        section.unknown_b[1] = reader.read_i32()?;
        section.node_count_y = reader.read_i32()?;
        section.unknown_b[2] = reader.read_i32()?;
        section.unknown_b[3] = reader.read_i32()?;
        if version.is_loki() {
            section.unknown_b[4] = reader.read_i32()?;
        }

        let mut strings = OffsetTable::new(reader.read_bytes(string_length)?, Endian::Little);
        section.string_count = strings.strings().len();

        if version.is_loki() {
            let _zero = reader.read_i32()?;
            let global_count = reader.read_count()?;
            for _ in 0..global_count {
                section.global_files.push(strings.string_at(reader.read_i32()?)?);
            }

            let info_count = to_len_i32(section.mesh_load_info_count)?;
            for _ in 0..info_count {
                let name = strings.string_at(reader.read_i32()?)?;
                let activate_message = strings.string_at(reader.read_i32()?)?;
                let deactivate_message = strings.string_at(reader.read_i32()?)?;
                let sound = strings.string_at(reader.read_i32()?)?;
                let type_id = reader.read_u32()?;
                let render_nodes = reader.read_counted_array::<u32>()?;
                let required_bundles = reader
                    .read_counted_array::<i32>()?
                    .into_iter()
                    .map(|offset| strings.string_at(offset))
                    .collect::<Result<Vec<_>>>()?;
                section.mesh_load_infos.push(MeshLoadInfo {
                    name,
                    activate_message,
                    deactivate_message,
                    sound,
                    type_id,
                    render_nodes,
                    required_bundles,
                });
            }
        } else {
            let pair_count = reader.read_count()?;
            for i in 0..pair_count {
                let folder = strings.string_at(reader.read_i32()?)?;
                let file = strings.string_at(reader.read_i32()?)?;
                debug!("Asset dir #{i}: {file} -> {folder}");
                section.asset_dirs.push((folder, file));
            }
        }

        Ok(section)
    }

    /// Bundles to cache, in load order: global `.bndl` files first, then
    /// each mesh's required bundles. May contain repeats.
    #[must_use]
    pub fn bundle_names(&self) -> Vec<&str> {
        self.global_files
            .iter()
            .filter(|f| has_bundle_extension(f))
            .chain(self.mesh_load_infos.iter().flat_map(|info| info.required_bundles.iter()))
            .map(String::as_str)
            .collect()
    }

    /// Highest render node any mesh load info references.
    #[must_use]
    pub fn max_render_node(&self) -> Option<u32> {
        self.mesh_load_infos
            .iter()
            .flat_map(|info| info.render_nodes.iter().copied())
            .max()
    }

    /// Load infos keyed by lower-cased name; the first of duplicate names
    /// wins.
    pub(crate) fn load_info_map(&self) -> IndexMap<String, MeshLoadInfo> {
        let mut map = IndexMap::with_capacity(self.mesh_load_infos.len());
        for info in &self.mesh_load_infos {
            match map.entry(info.name.to_lowercase()) {
                Entry::Occupied(_) => warn!("Duplicate mesh load info '{}'", info.name),
                Entry::Vacant(slot) => {
                    slot.insert(info.clone());
                }
            }
        }
        map
    }
}

fn has_bundle_extension(file: &str) -> bool {
    std::path::Path::new(file)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bndl"))
}
