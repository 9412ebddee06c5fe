//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Seekable byte cursor with switchable byte order

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use super::math::{BoundingBox, Plane, Rgba32};
use crate::error::{Error, Result};

/// Byte order used for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Byte order of the host.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }

    /// The opposite byte order.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }
}

/// Character width for null-terminated strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// One byte per character, terminated by a single zero byte.
    #[default]
    SingleByte,
    /// Two bytes per character (UTF-16LE), terminated by a zero pair.
    Utf16,
}

/// Binary reader over any `Read + Seek` source.
///
/// Tracks its own cursor and the total source length so every read can be
/// bounds-checked before touching the source. Reads never return partial
/// data: a read that would cross the end fails with [`Error::UnexpectedEof`].
#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
    position: u64,
    length: u64,
    endian: Endian,
}

/// Reader over an owned in-memory buffer.
pub type ByteReader = BinaryReader<Cursor<Vec<u8>>>;

impl BinaryReader<Cursor<Vec<u8>>> {
    /// Wrap an owned buffer (little-endian).
    #[must_use]
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::from_bytes_with_endian(data, Endian::Little)
    }

    /// Wrap an owned buffer with an explicit byte order.
    #[must_use]
    pub fn from_bytes_with_endian(data: Vec<u8>, endian: Endian) -> Self {
        let length = data.len() as u64;
        Self {
            inner: Cursor::new(data),
            position: 0,
            length,
            endian,
        }
    }

    /// Load a whole file into memory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    /// Borrow the underlying buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.inner.get_ref()
    }
}

impl BinaryReader<BufReader<File>> {
    /// Open a file for buffered, seekable reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?), Endian::Little)
    }
}

macro_rules! read_primitive {
    ($name:ident, $le:ident, $be:ident, $ty:ty, $size:expr, $method:ident) => {
        #[doc = concat!("Read a `", stringify!($ty), "` in the reader's byte order.")]
        pub fn $name(&mut self) -> Result<$ty> {
            match self.endian {
                Endian::Little => self.$le(),
                Endian::Big => self.$be(),
            }
        }

        #[doc = concat!("Read a little-endian `", stringify!($ty), "` regardless of the reader's byte order.")]
        pub fn $le(&mut self) -> Result<$ty> {
            self.ensure($size)?;
            let value = self.inner.$method::<LittleEndian>()?;
            self.position += $size;
            Ok(value)
        }

        #[doc = concat!("Read a big-endian `", stringify!($ty), "` regardless of the reader's byte order.")]
        pub fn $be(&mut self) -> Result<$ty> {
            self.ensure($size)?;
            let value = self.inner.$method::<BigEndian>()?;
            self.position += $size;
            Ok(value)
        }
    };
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Wrap a source, measuring its length. The cursor starts at the
    /// source's current position.
    ///
    /// # Errors
    /// Returns an error if the source cannot be seeked.
    pub fn new(mut inner: R, endian: Endian) -> Result<Self> {
        let position = inner.stream_position()?;
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(position))?;
        Ok(Self {
            inner,
            position,
            length,
            endian,
        })
    }

    /// Current byte order.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Change the byte order for subsequent reads.
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total length of the source.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the source is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes left between the cursor and the end.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    /// Whether the cursor is at or past the end.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.position >= self.length
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// Returns an error if the underlying seek fails.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Move the cursor relative to its current position.
    ///
    /// # Errors
    /// Returns an error if the target position would be negative.
    pub fn skip(&mut self, delta: i64) -> Result<()> {
        let target = self
            .position
            .checked_add_signed(delta)
            .ok_or(Error::NegativeLength(self.position as i64 + delta))?;
        self.seek(target)
    }

    /// Consume the reader, returning the source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn ensure(&self, count: u64) -> Result<()> {
        if self.position.saturating_add(count) > self.length {
            return Err(Error::UnexpectedEof {
                position: self.position,
                requested: count,
                length: self.length,
            });
        }
        Ok(())
    }

    // ==================== Integers ====================

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.inner.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    /// Read one signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    read_primitive!(read_u16, read_u16_le, read_u16_be, u16, 2, read_u16);
    read_primitive!(read_i16, read_i16_le, read_i16_be, i16, 2, read_i16);
    read_primitive!(read_u32, read_u32_le, read_u32_be, u32, 4, read_u32);
    read_primitive!(read_i32, read_i32_le, read_i32_be, i32, 4, read_i32);
    read_primitive!(read_u64, read_u64_le, read_u64_be, u64, 8, read_u64);
    read_primitive!(read_i64, read_i64_le, read_i64_be, i64, 8, read_i64);
    read_primitive!(read_f32, read_f32_le, read_f32_be, f32, 4, read_f32);

    /// Read an `i32` count or length, rejecting negative values.
    pub fn read_count(&mut self) -> Result<usize> {
        to_len(i64::from(self.read_i32()?))
    }

    /// Peek one byte without advancing. `None` at end of stream.
    pub fn peek_u8(&mut self) -> Result<Option<u8>> {
        if self.is_eof() {
            return Ok(None);
        }
        let value = self.read_u8()?;
        self.skip(-1)?;
        Ok(Some(value))
    }

    /// Peek an `i32` without advancing.
    pub fn peek_i32(&mut self) -> Result<i32> {
        let value = self.read_i32()?;
        self.skip(-4)?;
        Ok(value)
    }

    // ==================== Byte spans ====================

    /// Read exactly `count` bytes into a new buffer.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure(count as u64)?;
        let mut buffer = vec![0u8; count];
        self.inner.read_exact(&mut buffer)?;
        self.position += count as u64;
        Ok(buffer)
    }

    /// Read a byte span whose length was decoded as a signed value.
    pub fn read_bytes_signed(&mut self, count: i64) -> Result<Vec<u8>> {
        let count = to_len(count)?;
        self.read_bytes(count)
    }

    /// Read everything from the cursor to the end.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let count = usize::try_from(self.remaining())
            .map_err(|_| Error::NotImplemented("stream larger than address space".into()))?;
        self.read_bytes(count)
    }

    /// Read a homogeneous array of fixed-layout records by copying bytes
    /// straight into the output buffer.
    ///
    /// # Errors
    /// Fails on truncation, or when the reader's byte order differs from the
    /// host's (records cannot be byte-swapped generically).
    pub fn read_array<T: Pod>(&mut self, count: usize) -> Result<Vec<T>> {
        if self.endian != Endian::native() {
            return Err(Error::NotImplemented(
                "struct array read with non-native byte order".into(),
            ));
        }
        let size = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(Error::NegativeLength(-1))?;
        self.ensure(size as u64)?;
        let mut out = vec![<T as Zeroable>::zeroed(); count];
        self.inner.read_exact(bytemuck::cast_slice_mut(&mut out))?;
        self.position += size as u64;
        Ok(out)
    }

    /// Read an `i32` count followed by that many records.
    pub fn read_counted_array<T: Pod>(&mut self) -> Result<Vec<T>> {
        let count = self.read_count()?;
        self.read_array(count)
    }

    /// Advance to the next multiple of `alignment`, returning the padding
    /// consumed. An alignment of 0 consumes nothing.
    pub fn align(&mut self, alignment: u64) -> Result<u64> {
        if alignment == 0 {
            return Ok(0);
        }
        let padding = alignment - self.position % alignment;
        if padding == alignment {
            return Ok(0);
        }
        self.seek(self.position + padding)?;
        Ok(padding)
    }

    // ==================== Strings ====================

    /// Read a null-terminated string.
    ///
    /// With a `budget`, at most that many bytes are examined and the cursor
    /// always ends up `budget` bytes past where it started, wherever the
    /// terminator was found. A zero budget reads nothing.
    pub fn read_cstring(&mut self, budget: Option<usize>, encoding: StringEncoding) -> Result<String> {
        if budget == Some(0) {
            return Ok(String::new());
        }
        let start = self.position;
        let mut bytes = Vec::new();
        let mut consumed = 0usize;
        loop {
            match encoding {
                StringEncoding::SingleByte => {
                    let b = self.read_u8()?;
                    consumed += 1;
                    if b == 0 {
                        break;
                    }
                    bytes.push(b);
                }
                StringEncoding::Utf16 => {
                    let lo = self.read_u8()?;
                    let hi = self.read_u8()?;
                    consumed += 2;
                    if lo == 0 && hi == 0 {
                        break;
                    }
                    bytes.push(lo);
                    bytes.push(hi);
                }
            }
            if budget.is_some_and(|max| consumed >= max) {
                break;
            }
        }
        if let Some(max) = budget {
            self.seek(start + max as u64)?;
        }
        Ok(decode_string(&bytes, encoding))
    }

    /// Read a fixed-length single-byte string with trailing NULs trimmed.
    pub fn read_string(&mut self, length: usize) -> Result<String> {
        if length == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_bytes(length)?;
        let text = decode_string(&bytes, StringEncoding::SingleByte);
        Ok(text.trim_end_matches('\0').to_string())
    }

    /// Read a string prefixed by an 8-bit length.
    pub fn read_string_u8(&mut self) -> Result<String> {
        let length = self.read_u8()?;
        self.read_string(length as usize)
    }

    /// Read a string prefixed by an unsigned 16-bit length.
    pub fn read_string_u16(&mut self) -> Result<String> {
        let length = self.read_u16()?;
        self.read_string(length as usize)
    }

    /// Read a string prefixed by a signed 16-bit length.
    pub fn read_string_i16(&mut self) -> Result<String> {
        let length = to_len(i64::from(self.read_i16()?))?;
        self.read_string(length)
    }

    /// Read a string prefixed by a signed 32-bit length.
    pub fn read_string_i32(&mut self) -> Result<String> {
        let length = self.read_count()?;
        self.read_string(length)
    }

    // ==================== Math ====================

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Read a quaternion stored X, Y, Z, W.
    pub fn read_quat(&mut self) -> Result<Quat> {
        let v = self.read_vec4()?;
        Ok(Quat::from_xyzw(v.x, v.y, v.z, v.w))
    }

    /// Read a quaternion stored W, X, Y, Z.
    pub fn read_quat_wxyz(&mut self) -> Result<Quat> {
        let v = self.read_vec4()?;
        Ok(Quat::from_xyzw(v.y, v.z, v.w, v.x))
    }

    /// Read a bounding box stored as min then max.
    pub fn read_bbox(&mut self) -> Result<BoundingBox> {
        Ok(BoundingBox {
            min: self.read_vec3()?,
            max: self.read_vec3()?,
        })
    }

    /// Read a plane stored as normal then distance.
    pub fn read_plane(&mut self) -> Result<Plane> {
        Ok(Plane {
            normal: self.read_vec3()?,
            distance: self.read_f32()?,
        })
    }

    /// Read a packed 32-bit RGBA color.
    pub fn read_rgba32(&mut self) -> Result<Rgba32> {
        Ok(Rgba32(self.read_u32()?))
    }

    /// Read a 4x4 matrix stored row by row.
    pub fn read_mat4_row_major(&mut self) -> Result<Mat4> {
        Ok(self.read_mat4_col_major()?.transpose())
    }

    /// Read a 4x4 matrix stored column by column.
    pub fn read_mat4_col_major(&mut self) -> Result<Mat4> {
        let mut values = [0f32; 16];
        for value in &mut values {
            *value = self.read_f32()?;
        }
        Ok(Mat4::from_cols_array(&values))
    }

    /// Read a 16-byte identifier.
    pub fn read_guid(&mut self) -> Result<[u8; 16]> {
        let bytes = self.read_bytes(16)?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&bytes);
        Ok(guid)
    }
}

/// Convert a decoded signed length to `usize`.
pub(crate) fn to_len(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::NegativeLength(value))
}

/// Convert a decoded `i32` count to `usize`.
pub(crate) fn to_len_i32(value: i32) -> Result<usize> {
    to_len(i64::from(value))
}

fn decode_string(bytes: &[u8], encoding: StringEncoding) -> String {
    match encoding {
        StringEncoding::SingleByte => String::from_utf8_lossy(bytes).into_owned(),
        StringEncoding::Utf16 => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_override() {
        let mut reader = ByteReader::from_bytes(vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(reader.read_i32().unwrap(), 1);
        assert_eq!(reader.read_i32_be().unwrap(), 1);

        reader.seek(0).unwrap();
        reader.set_endian(Endian::Big);
        assert_eq!(reader.read_u32().unwrap(), 0x0100_0000);
        assert_eq!(reader.read_u32_le().unwrap(), 0x0100_0000);
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut reader = ByteReader::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            reader.read_u32(),
            Err(Error::UnexpectedEof { position: 0, requested: 4, length: 3 })
        ));
        // Failed reads leave the cursor alone
        assert_eq!(reader.position(), 0);
        assert!(reader.read_bytes(4).is_err());
        assert_eq!(reader.read_bytes(3).unwrap(), vec![1, 2, 3]);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_align() {
        let mut reader = ByteReader::from_bytes(vec![0; 16]);
        assert_eq!(reader.align(4).unwrap(), 0);
        reader.seek(5).unwrap();
        assert_eq!(reader.align(4).unwrap(), 3);
        assert_eq!(reader.position(), 8);
        assert_eq!(reader.align(4).unwrap(), 0);
        reader.seek(9).unwrap();
        assert_eq!(reader.align(0).unwrap(), 0);
        assert_eq!(reader.position(), 9);
    }

    #[test]
    fn test_cstring_budget() {
        let mut reader = ByteReader::from_bytes(b"ab\0xyzw\0tail".to_vec());
        assert_eq!(reader.read_cstring(Some(6), StringEncoding::SingleByte).unwrap(), "ab");
        assert_eq!(reader.position(), 6);

        reader.seek(3).unwrap();
        assert_eq!(reader.read_cstring(None, StringEncoding::SingleByte).unwrap(), "xyzw");
        assert_eq!(reader.position(), 8);

        assert_eq!(reader.read_cstring(Some(0), StringEncoding::SingleByte).unwrap(), "");
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_cstring_budget_without_terminator() {
        let mut reader = ByteReader::from_bytes(b"abcdef".to_vec());
        assert_eq!(reader.read_cstring(Some(4), StringEncoding::SingleByte).unwrap(), "abcd");
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_utf16_cstring() {
        let mut reader = ByteReader::from_bytes(vec![b'H', 0, b'i', 0, 0, 0, 0xFF]);
        assert_eq!(reader.read_cstring(None, StringEncoding::Utf16).unwrap(), "Hi");
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn test_prefixed_strings() {
        let mut data = vec![3, 0];
        data.extend_from_slice(b"ab\0");
        data.extend_from_slice(&(-1i32).to_le_bytes());
        let mut reader = ByteReader::from_bytes(data);
        assert_eq!(reader.read_string_i16().unwrap(), "ab");
        assert!(matches!(reader.read_string_i32(), Err(Error::NegativeLength(-1))));
    }

    #[test]
    fn test_peek() {
        let mut reader = ByteReader::from_bytes(vec![7, 1, 0, 0, 0]);
        assert_eq!(reader.peek_u8().unwrap(), Some(7));
        assert_eq!(reader.position(), 0);
        reader.skip(1).unwrap();
        assert_eq!(reader.peek_i32().unwrap(), 1);
        assert_eq!(reader.position(), 1);
        reader.seek(5).unwrap();
        assert_eq!(reader.peek_u8().unwrap(), None);
    }

    #[test]
    fn test_read_array() {
        let mut data = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut reader = ByteReader::from_bytes(data);
        let points: Vec<Vec3> = reader.read_array(2).unwrap();
        assert_eq!(points, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_quaternion_orders() {
        let mut data = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut reader = ByteReader::from_bytes(data);
        assert_eq!(reader.read_quat().unwrap(), Quat::from_xyzw(1.0, 2.0, 3.0, 4.0));
        reader.seek(0).unwrap();
        assert_eq!(reader.read_quat_wxyz().unwrap(), Quat::from_xyzw(2.0, 3.0, 4.0, 1.0));
    }

    #[test]
    fn test_row_major_matrix() {
        let mut data = Vec::new();
        for i in 0..16 {
            data.extend_from_slice(&(i as f32).to_le_bytes());
        }
        let mut reader = ByteReader::from_bytes(data);
        let m = reader.read_mat4_row_major().unwrap();
        // first stored row becomes the x component of each column
        assert_eq!(m.x_axis.x, 0.0);
        assert_eq!(m.y_axis.x, 1.0);
        assert_eq!(m.w_axis.x, 3.0);
        assert_eq!(m.x_axis.y, 4.0);
    }
}
