//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! `.lvbndl` (level bundle) reader

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use super::{Bundle, BundleEntry, LVBNDL_MAGIC, LVBNDL_VERSION};
use crate::error::{Error, Result};
use crate::io::{BinaryReader, read_magic, to_len_i32};

/// An open `.lvbndl` level bundle.
#[derive(Debug)]
pub struct LvBndlFile<R: Read + Seek> {
    reader: BinaryReader<R>,
    entries: Vec<BundleEntry>,
}

impl LvBndlFile<BufReader<File>> {
    /// Open a level bundle from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not a level bundle.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(BinaryReader::open(path)?)
    }
}

impl<R: Read + Seek> LvBndlFile<R> {
    /// Decode the entry table.
    ///
    /// # Errors
    /// Returns an error on bad magic, unsupported version, truncation, or
    /// when the name table does not hold exactly one name per file.
    pub fn from_reader(mut reader: BinaryReader<R>) -> Result<Self> {
        let magic = read_magic(&mut reader)?;
        if magic != LVBNDL_MAGIC {
            return Err(Error::InvalidMagic {
                format: "level bundle",
                expected: "LVRS",
                found: magic,
            });
        }
        let version = reader.read_i32()?;
        if version != LVBNDL_VERSION {
            return Err(Error::UnsupportedVersion {
                format: "level bundle",
                version: i64::from(version),
            });
        }

        let file_count = to_len_i32(reader.read_i32()?)?;
        let name_table_length = reader.read_i32()?;
        let names = split_names(&reader.read_bytes_signed(i64::from(name_table_length))?);
        if names.len() != file_count {
            return Err(Error::CountMismatch {
                what: "level bundle names",
                expected: file_count,
                found: names.len(),
            });
        }

        let mut entries = Vec::with_capacity(file_count);
        for (index, path) in names.into_iter().enumerate() {
            let size = reader.read_u32()?;
            let offset = reader.position();
            entries.push(BundleEntry {
                index,
                path,
                offset,
                size,
            });
            reader.seek(offset + u64::from(size))?;
        }

        Ok(Self { reader, entries })
    }
}

impl<R: Read + Seek> Bundle for LvBndlFile<R> {
    fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    fn read_data(&mut self, entry: &BundleEntry) -> Result<Option<Vec<u8>>> {
        self.reader.seek(entry.offset)?;
        self.reader.read_bytes(entry.size as usize).map(Some)
    }
}

/// Split a name table whose entries are each padded to a 4-byte boundary.
/// A trailing unterminated run is also a name.
fn split_names(table: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < table.len() {
        if table[i] == 0 {
            names.push(String::from_utf8_lossy(&table[start..i]).into_owned());
            let rem = (i + 1) % 4;
            if rem != 0 {
                i += 4 - rem;
            }
            start = i + 1;
        }
        i += 1;
    }
    if start < table.len() {
        names.push(String::from_utf8_lossy(&table[start..]).into_owned());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteReader;

    #[test]
    fn test_split_aligned_names() {
        assert_eq!(split_names(b"ab\0\0cdefg\0\0\0hi"), vec!["ab", "cdefg", "hi"]);
        assert_eq!(split_names(b"abc\0"), vec!["abc"]);
        assert!(split_names(b"").is_empty());
    }

    #[test]
    fn test_level_bundle() {
        let names = b"one\0two\0";
        let mut data = Vec::new();
        data.extend_from_slice(b"LVRS");
        for v in [1i32, 2, names.len() as i32] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(names);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(b"xy");
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(b"z");

        let mut bundle = LvBndlFile::from_reader(ByteReader::from_bytes(data)).unwrap();
        assert_eq!(bundle.entries().len(), 2);
        assert_eq!(bundle.entries()[1].index, 1);
        let two = bundle.find("two").unwrap().clone();
        assert_eq!(bundle.read_data(&two).unwrap().unwrap(), b"z");
    }

    #[test]
    fn test_name_count_mismatch() {
        let mut data = Vec::new();
        data.extend_from_slice(b"LVRS");
        for v in [1i32, 3, 4] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(b"one\0");
        assert!(matches!(
            LvBndlFile::from_reader(ByteReader::from_bytes(data)),
            Err(Error::CountMismatch { expected: 3, found: 1, .. })
        ));
    }
}
