//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Jupiter EX archive reader (`.arch00`, `.arch01`)
//!
//! Archives store a folder tree as flat first-child/next-sibling tables and
//! file payloads as raw bytes or chunked zlib blocks.

mod reader;
mod types;

pub use reader::ArchFile;
pub use types::*;

/// Little-endian archive magic
pub const MAGIC: [u8; 4] = *b"LTAR";

/// Big-endian (console) archive magic
pub const MAGIC_BE: [u8; 4] = *b"RATL";

/// The only supported archive version
pub const VERSION: i32 = 3;

/// Upper bound for either length in a compressed block header
pub const MAX_BLOCK_LENGTH: i32 = 100_000;

/// Archive sub-formats whose layout is decoded (`arch00`, `arch01`)
pub const SUPPORTED_VARIANTS: [u8; 2] = [0, 1];
