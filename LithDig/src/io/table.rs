//! Offset-addressed side tables

use glam::{Quat, Vec2, Vec3};

use super::reader::{ByteReader, Endian, StringEncoding};
use crate::error::{Error, Result};

/// An immutable byte blob addressed by offsets stored elsewhere.
///
/// The table owns its own cursor, so lookups never move the cursor of the
/// stream that holds the offsets.
pub struct OffsetTable {
    reader: ByteReader,
}

impl OffsetTable {
    #[must_use]
    pub fn new(data: Vec<u8>, endian: Endian) -> Self {
        Self {
            reader: ByteReader::from_bytes_with_endian(data, endian),
        }
    }

    /// Table size in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.reader.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// Raw table bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.reader.data()
    }

    /// Run `decode` with the table cursor placed at `offset`.
    pub fn at<T>(&mut self, offset: i32, decode: impl FnOnce(&mut ByteReader) -> Result<T>) -> Result<T> {
        let position = u64::try_from(offset).map_err(|_| Error::NegativeLength(i64::from(offset)))?;
        self.reader.seek(position)?;
        decode(&mut self.reader)
    }

    /// Null-terminated single-byte string at `offset`.
    pub fn string_at(&mut self, offset: i32) -> Result<String> {
        self.at(offset, |r| r.read_cstring(None, StringEncoding::SingleByte))
    }

    /// Null-terminated UTF-16 string at `offset`.
    pub fn wstring_at(&mut self, offset: i32) -> Result<String> {
        self.at(offset, |r| r.read_cstring(None, StringEncoding::Utf16))
    }

    pub fn vec2_at(&mut self, offset: i32) -> Result<Vec2> {
        self.at(offset, ByteReader::read_vec2)
    }

    pub fn vec3_at(&mut self, offset: i32) -> Result<Vec3> {
        self.at(offset, ByteReader::read_vec3)
    }

    /// Quaternion stored W, X, Y, Z at `offset`.
    pub fn quat_at(&mut self, offset: i32) -> Result<Quat> {
        self.at(offset, ByteReader::read_quat_wxyz)
    }

    /// Split the whole table into its null-terminated strings.
    #[must_use]
    pub fn strings(&self) -> Vec<String> {
        let mut data = self.bytes();
        if data.last() == Some(&0) {
            data = &data[..data.len() - 1];
        }
        if data.is_empty() {
            return Vec::new();
        }
        data.split(|&b| b == 0)
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_offset() {
        let mut table = OffsetTable::new(b"\0first\0second\0".to_vec(), Endian::Little);
        assert_eq!(table.string_at(7).unwrap(), "second");
        assert_eq!(table.string_at(1).unwrap(), "first");
        assert_eq!(table.string_at(0).unwrap(), "");
        assert!(table.string_at(-4).is_err());
        assert!(table.string_at(100).is_err());
    }

    #[test]
    fn test_strings() {
        let table = OffsetTable::new(b"a\0bc\0\0d\0".to_vec(), Endian::Little);
        assert_eq!(table.strings(), vec!["a", "bc", "", "d"]);
    }
}
