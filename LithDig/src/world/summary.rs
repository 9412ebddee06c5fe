//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Serializable overview of a decoded world, for diagnostics and dumps

use std::path::PathBuf;

use serde::Serialize;

use super::WorldFile;
use super::options::WorldVersion;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct BspSummary {
    pub index: usize,
    pub names: Vec<String>,
    pub polygons: usize,
    pub render_nodes: usize,
    /// Names of the objects linked to this BSP
    pub linked_objects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeshSummary {
    pub index: usize,
    pub external_file: Option<String>,
    pub faces: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub materials: Vec<String>,
}

/// Counts and per-part listings of a [`WorldFile`].
#[derive(Debug, Clone, Serialize)]
pub struct WorldSummary {
    pub path: PathBuf,
    pub version: WorldVersion,
    pub split: bool,
    pub bsp_count: usize,
    pub named_bsps: usize,
    pub mesh_count: usize,
    /// External meshes that could not be resolved
    pub missing_meshes: usize,
    pub sectors: usize,
    pub portals: usize,
    pub objects: usize,
    pub linked_objects: usize,
    pub bundles: Vec<String>,
    pub bsps: Vec<BspSummary>,
    pub meshes: Vec<MeshSummary>,
}

impl WorldSummary {
    pub(crate) fn new(world: &WorldFile) -> Self {
        let bsps = world
            .bsps
            .iter()
            .map(|bsp| BspSummary {
                index: bsp.index,
                names: bsp.names.clone(),
                polygons: bsp.polygons.len(),
                render_nodes: bsp.render_nodes.len(),
                linked_objects: bsp.linked_objects.keys().cloned().collect(),
            })
            .collect();
        let meshes = world
            .meshes
            .iter()
            .flatten()
            .map(|mesh| MeshSummary {
                index: mesh.index,
                external_file: mesh.external_file.clone(),
                faces: mesh.faces.len(),
                vertices: mesh.vertex_count(),
                triangles: mesh.triangle_count(),
                materials: mesh.materials.clone(),
            })
            .collect();

        Self {
            path: world.path.clone(),
            version: world.version,
            split: world.split,
            bsp_count: world.bsps.len(),
            named_bsps: world.bsps.iter().filter(|b| b.first_name().is_some()).count(),
            mesh_count: world.meshes.len(),
            missing_meshes: world.meshes.iter().filter(|m| m.is_none()).count(),
            sectors: world.sectors.sectors.len(),
            portals: world.sectors.portals.len(),
            objects: world.objects.len(),
            linked_objects: world.objects.iter().filter(|o| o.linked_bsp.is_some()).count(),
            bundles: world.bundle_names().map(str::to_string).collect(),
            bsps,
            meshes,
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
