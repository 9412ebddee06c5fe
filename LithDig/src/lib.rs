//! # `LithDig`
//!
//! A pure-Rust library for reading LithTech Jupiter EX and LT5 game data
//! (F.E.A.R., Condemned, District 187, F.E.A.R. 2).
//!
//! ## Supported Formats
//!
//! - **Archives** - `.arch00` / `.arch01` packages, stored or block-compressed
//! - **Bundles** - `.bndl` and `.lvbndl` resource bundles
//! - **Material libraries** - `.matlib` material definitions
//! - **Game databases** - `.gamedb` typed record stores (versions 3, 6, 7)
//! - **Worlds** - `.world00p` / `.wld` levels, split or not, with external
//!   meshes and prefabs
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```no_run
//! use lithdig::arch::ArchFile;
//!
//! let mut archive = ArchFile::open("FEAR_1.Arch00")?;
//! for file in archive.files() {
//!     println!("{:?} ({} bytes)", file.full_path(), file.entry.uncompressed_length);
//! }
//! let data = archive.read_file("Worlds\\Release\\Intro.World00p")?;
//! # Ok::<(), lithdig::Error>(())
//! ```
//!
//! ### Looking Up Game Database Records
//!
//! ```no_run
//! use lithdig::gamedb::{GameDbFile, HashNameTable};
//!
//! let names = HashNameTable::from_env()?;
//! let db = GameDbFile::open("Database/Weapons.Gamedb00p", &names)?;
//! if let Some(record) = db.category("Weapons").and_then(|c| c.record("Pistol")) {
//!     println!("{} attributes", record.attributes.len());
//! }
//! # Ok::<(), lithdig::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use lithdig::prelude::*;
//!
//! // ArchFile, BndlFile, LvBndlFile, MatLibFile, GameDbFile, WorldFile,
//! // WorldLoadOptions, Error, Result and more
//! ```

pub mod arch;
pub mod bundle;
pub mod compression;
pub mod error;
pub mod gamedb;
pub mod io;
pub mod matlib;
pub mod world;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::arch::{ArchFile, ArchFileEntry, ArchFolder};
    pub use crate::bundle::{BndlFile, Bundle, BundleEntry, LvBndlFile};
    pub use crate::gamedb::{
        Attribute, AttributeValue, Category, GameDbFile, HashNameTable, Record, RecordLink,
    };
    pub use crate::io::{BoundingBox, ByteReader, Endian};
    pub use crate::matlib::{MatLibFile, Material, MaterialValue};
    pub use crate::world::{
        Game, PrefabFile, RenderMesh, WorldBsp, WorldFile, WorldLoadOptions, WorldObject,
        WorldSummary, WorldVersion,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
