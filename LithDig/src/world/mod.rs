//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! World decoder (`.world00p`, `.wld`, and the split `WLDP` layout)
//!
//! A world is decoded in one pass over up to three streams:
//!
//! - the common part: header, collision BSPs, physics shapes and the files
//!   section
//! - the client part: render meshes, the render tree and sector topology
//! - the server part: placed objects
//!
//! Non-split worlds keep all three in one file and record the client and
//! server positions in the header. Split worlds store them in sibling files
//! that each repeat the common version number.
//!
//! External meshes and prefabs are resolved from the install directory
//! (Jupiter EX) or from the bundles the files section names (LT5). After
//! decoding, named objects are linked to the BSPs that share their name.
//!
//! # Example
//!
//! ```no_run
//! use lithdig::gamedb::HashNameTable;
//! use lithdig::world::{Game, WorldFile, WorldLoadOptions};
//!
//! let options = WorldLoadOptions::new().with_game(Game::Fear);
//! let world = WorldFile::open("Worlds/Intro.world00p", &options, &HashNameTable::new())?;
//! for bsp in &world.bsps {
//!     println!("{} -> {} objects", bsp.display_name(), bsp.linked_objects.len());
//! }
//! # Ok::<(), lithdig::Error>(())
//! ```

mod bsp;
mod files;
mod mesh;
mod object;
mod options;
mod physics;
mod prefab;
mod reader;
mod render;
mod resolve;
mod sectors;
mod summary;

pub use bsp::{WorldBsp, WorldNode, WorldPoly};
pub use files::{FilesSection, MeshLoadInfo};
pub use mesh::{Face, RenderMesh, Vertex, VertexFormat, VertexProperty, VertexType, VertexUsage};
pub use object::{ObjectEncoding, ObjectProperty, PROPERTY_GROUP_MASK, PropertyValue, WorldObject};
pub(crate) use options::expand_home;
pub use options::{
    FEAR2_CONTENT_DIRS, GAME_DIR_ENV, Game, VersionCodes, WorldLoadOptions, WorldVersion,
};
pub use physics::{
    CapsuleExtension, CapsuleShape, HullShape, MeshShape, ObbShape, PhysicsShape, ShapeKind,
    SphereShape,
};
pub use prefab::{PrefabFile, PrefabNode};
pub use reader::{ModelCounts, RenderHeader, WorldFile};
pub use render::{
    InstanceInfo, InstancePlacement, LokiRenderInstanceData, PrefabReference, RenderFace,
    RenderInstanceKind, RenderNode,
};
pub use sectors::{Sector, SectorData, SectorNode, SectorPortal};
pub use summary::{BspSummary, MeshSummary, WorldSummary};

/// Common part magic of a split world
pub const SPLIT_MAGIC: [u8; 4] = *b"WLDP";

/// Server part magic of a split world
pub const SERVER_MAGIC: [u8; 4] = *b"WLDS";

/// Client part magic of a split world
pub const CLIENT_MAGIC: [u8; 4] = *b"WLDC";

/// External render mesh magic
pub const MESH_MAGIC: [u8; 4] = *b"MESH";

/// External render mesh version
pub const MESH_VERSION: i32 = 1;

/// Prefab magic
pub const PREFAB_MAGIC: [u8; 4] = *b"PRFB";

/// Prefab version
pub const PREFAB_VERSION: i32 = 1;

/// Object name that never links to anything
pub const UNNAMED_OBJECT: &str = "noname";
