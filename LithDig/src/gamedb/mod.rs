//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Game database reader (`.gamedb`)
//!
//! A typed, hashed key/value store organised as categories of records of
//! attributes. Version 3 describes each attribute inline; versions 6 and 7
//! slice a shared descriptor table per record and store the values in a
//! fixed-size per-record data block.

mod hash;
mod reader;
mod types;

pub use hash::{HASH_NAMES_ENV, HashNameTable, calc_hash};
pub use reader::GameDbFile;
pub use types::*;

/// Game database magic
pub const MAGIC: [u8; 4] = *b"GADB";

/// Versions this reader decodes
pub const SUPPORTED_VERSIONS: [i32; 3] = [3, 6, 7];

/// First version with descriptor tables and name hash checks
pub const DESCRIPTOR_VERSION: i32 = 6;
