//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! `.bndl` reader

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, warn};

use super::{
    BNDL_EMPTY_MARKER, BNDL_MAGIC, BNDL_MIN_LENGTH, BNDL_VERSION, Bundle, BundleEntry,
};
use crate::error::{Error, Result};
use crate::io::{BinaryReader, OffsetTable, read_magic, to_len_i32};

/// An open `.bndl` bundle.
#[derive(Debug)]
pub struct BndlFile<R: Read + Seek> {
    reader: BinaryReader<R>,
    entries: Vec<BundleEntry>,
}

impl BndlFile<BufReader<File>> {
    /// Open a bundle from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not a bundle.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bundle = Self::from_reader(BinaryReader::open(path)?)?;
        debug!("Opened bundle {} ({} entries)", path.display(), bundle.entries.len());
        Ok(bundle)
    }
}

impl<R: Read + Seek> BndlFile<R> {
    /// Decode the entry table.
    ///
    /// Two legacy invalid forms decode as an empty bundle: a marker value of
    /// 15 where the magic should be, and any file shorter than 100 bytes.
    ///
    /// # Errors
    /// Returns an error on bad magic, unsupported version, or truncation.
    pub fn from_reader(mut reader: BinaryReader<R>) -> Result<Self> {
        let magic = read_magic(&mut reader)?;
        if magic != BNDL_MAGIC {
            reader.skip(-4)?;
            if reader.read_i32()? == BNDL_EMPTY_MARKER {
                return Ok(Self {
                    reader,
                    entries: Vec::new(),
                });
            }
            if reader.len() < BNDL_MIN_LENGTH {
                warn!("Ignoring too-short invalid bundle ({} bytes)", reader.len());
                return Ok(Self {
                    reader,
                    entries: Vec::new(),
                });
            }
            return Err(Error::InvalidMagic {
                format: "bundle",
                expected: "BNDL",
                found: magic,
            });
        }

        let version = reader.read_i32()?;
        if version != BNDL_VERSION {
            return Err(Error::UnsupportedVersion {
                format: "bundle",
                version: i64::from(version),
            });
        }

        let name_table_length = reader.read_i32()?;
        let _unused = reader.read_i32()?;
        let skip_count = to_len_i32(reader.read_i32()?)?;
        let file_count = to_len_i32(reader.read_i32()?)?;
        let names = reader.read_bytes_signed(i64::from(name_table_length))?;
        let mut names = OffsetTable::new(names, reader.endian());

        let mut entries = Vec::with_capacity(skip_count + file_count);
        for _ in 0..skip_count {
            let path = names.string_at(reader.read_i32()?)?;
            entries.push(BundleEntry {
                index: entries.len() + 1,
                path,
                offset: 0,
                size: 0,
            });
        }
        for _ in 0..file_count {
            let path = names.string_at(reader.read_i32()?)?;
            let size = reader.read_u32()?;
            let offset = reader.position();
            entries.push(BundleEntry {
                index: entries.len() + 1,
                path,
                offset,
                size,
            });
            // the last payload may run past the end of the file
            reader.seek(offset + u64::from(size))?;
        }

        Ok(Self { reader, entries })
    }
}

impl<R: Read + Seek> Bundle for BndlFile<R> {
    fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    fn read_data(&mut self, entry: &BundleEntry) -> Result<Option<Vec<u8>>> {
        if !entry.has_payload() {
            return Ok(None);
        }
        self.reader.seek(entry.offset)?;
        self.reader.read_bytes(entry.size as usize).map(Some)
    }
}
