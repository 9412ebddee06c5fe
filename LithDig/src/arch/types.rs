//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Archive table records

use std::io::{Read, Seek};

use crate::error::Result;
use crate::io::BinaryReader;

/// Raw file table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileEntry {
    /// Offset of the name in the name table
    pub name_offset: i32,
    /// Absolute offset of the payload
    pub data_offset: i64,
    pub compressed_length: i64,
    pub uncompressed_length: i64,
    /// 0 = stored, 9 = chunked zlib
    pub flags: i32,
}

impl FileEntry {
    pub(crate) fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            name_offset: reader.read_i32()?,
            data_offset: reader.read_i64()?,
            compressed_length: reader.read_i64()?,
            uncompressed_length: reader.read_i64()?,
            flags: reader.read_i32()?,
        })
    }

    /// Whether the payload is stored without block compression.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.compressed_length == self.uncompressed_length
    }
}

/// Raw folder table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FolderEntry {
    /// Offset of the name in the name table; 0 marks the root
    pub name_offset: i32,
    /// Index of the first child folder, -1 for none
    pub first_child: i32,
    /// Index of the next sibling folder, -1 for none
    pub next_sibling: i32,
    /// Number of consecutive file table records owned by this folder
    pub file_count: i32,
}

impl FolderEntry {
    pub(crate) fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            name_offset: reader.read_i32()?,
            first_child: reader.read_i32()?,
            next_sibling: reader.read_i32()?,
            file_count: reader.read_i32()?,
        })
    }
}

/// Archive header fields following the magic and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchHeader {
    pub name_table_length: i32,
    pub folder_count: i32,
    pub file_count: i32,
    /// Three header fields with no known meaning
    pub unknown: [i32; 3],
    /// Identifier or checksum, kept opaque
    pub guid: [u8; 16],
}

/// A folder with its resolved name and owned files.
#[derive(Debug, Clone, Default)]
pub struct ArchFolder {
    pub entry: FolderEntry,
    /// Name as stored in the name table (empty for the root)
    pub name: String,
    /// Indices into [`super::ArchFile::files`]
    pub files: Vec<usize>,
}

/// A file with its resolved name.
#[derive(Debug, Clone, Default)]
pub struct ArchFileEntry {
    pub entry: FileEntry,
    /// `None` for empty files, whose name offsets are not valid
    pub name: Option<String>,
    /// Name of the owning folder
    pub folder: Option<String>,
}

impl ArchFileEntry {
    /// Folder-relative path using `\` separators.
    #[must_use]
    pub fn full_path(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        match self.folder.as_deref() {
            Some(folder) if !folder.trim().is_empty() => Some(format!("{folder}\\{name}")),
            _ => Some(name.clone()),
        }
    }
}
