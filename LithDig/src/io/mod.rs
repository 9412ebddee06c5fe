//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Endian-aware binary reading shared by every format decoder
//!
//! [`BinaryReader`] is the cursor every decoder is built on. [`OffsetTable`]
//! wraps a side blob (name table, value table) that is addressed by byte
//! offsets from many places during one decode pass.

mod math;
mod reader;
mod table;

pub use math::{BoundingBox, Plane, Rgba32};
pub use reader::{BinaryReader, ByteReader, Endian, StringEncoding};
pub(crate) use reader::{to_len, to_len_i32};
pub use table::OffsetTable;

/// Read four bytes as a magic tag.
///
/// # Errors
/// Returns an error if fewer than four bytes remain.
pub fn read_magic<R: std::io::Read + std::io::Seek>(reader: &mut BinaryReader<R>) -> crate::Result<[u8; 4]> {
    let bytes = reader.read_bytes(4)?;
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}
