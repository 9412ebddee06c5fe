//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Archive table decoding and payload reassembly

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, warn};

use super::{
    ArchFileEntry, ArchFolder, ArchHeader, FileEntry, FolderEntry, MAGIC, MAGIC_BE,
    MAX_BLOCK_LENGTH, SUPPORTED_VARIANTS, VERSION,
};
use crate::compression::inflate_zlib;
use crate::error::{Error, Result};
use crate::io::{BinaryReader, Endian, OffsetTable, read_magic, to_len_i32};

/// An open `.archNN` archive.
///
/// The folder and file tables are decoded once on open; payloads are read
/// lazily through [`ArchFile::read_data`].
#[derive(Debug)]
pub struct ArchFile<R: Read + Seek> {
    reader: BinaryReader<R>,
    variant: Option<u8>,
    header: ArchHeader,
    folders: Vec<ArchFolder>,
    files: Vec<ArchFileEntry>,
}

impl ArchFile<BufReader<File>> {
    /// Open an archive from disk.
    ///
    /// The two-digit extension suffix selects the sub-format; only `arch00`
    /// and `arch01` are decoded.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, uses an unsupported
    /// sub-format, or its tables are malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let variant = archive_variant(path);
        if let Some(v) = variant.filter(|v| !SUPPORTED_VARIANTS.contains(v)) {
            return Err(Error::NotImplemented(format!("arch{v:02} archives")));
        }
        let mut archive = Self::from_reader(BinaryReader::open(path)?)?;
        archive.variant = variant;
        debug!(
            "Opened {} ({} folders, {} files)",
            path.display(),
            archive.folders.len(),
            archive.files.len()
        );
        Ok(archive)
    }
}

impl<R: Read + Seek> ArchFile<R> {
    /// Decode the archive tables from a reader positioned at the magic.
    ///
    /// # Errors
    /// Returns an error on bad magic, unsupported version, truncation, or a
    /// missing root folder.
    pub fn from_reader(mut reader: BinaryReader<R>) -> Result<Self> {
        let magic = read_magic(&mut reader)?;
        if magic == MAGIC_BE {
            reader.set_endian(Endian::Big);
        } else if magic != MAGIC {
            return Err(Error::InvalidMagic {
                format: "archive",
                expected: "LTAR or RATL",
                found: magic,
            });
        }

        let version = reader.read_i32()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion {
                format: "archive",
                version: i64::from(version),
            });
        }

        let header = ArchHeader {
            name_table_length: reader.read_i32()?,
            folder_count: reader.read_i32()?,
            file_count: reader.read_i32()?,
            unknown: [reader.read_i32()?, reader.read_i32()?, reader.read_i32()?],
            guid: reader.read_guid()?,
        };

        let names = reader.read_bytes_signed(i64::from(header.name_table_length))?;
        let mut names = OffsetTable::new(names, reader.endian());

        let file_count = to_len_i32(header.file_count)?;
        let folder_count = to_len_i32(header.folder_count)?;

        let mut entries = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            entries.push(FileEntry::read(&mut reader)?);
        }
        let mut folder_entries = Vec::with_capacity(folder_count);
        for _ in 0..folder_count {
            folder_entries.push(FolderEntry::read(&mut reader)?);
        }

        let folders = build_folders(&folder_entries, &mut names)?;
        let files = build_files(&entries, &mut names)?;

        let mut archive = Self {
            reader,
            variant: None,
            header,
            folders,
            files,
        };
        archive.distribute_files()?;
        Ok(archive)
    }

    /// Assign consecutive file records to folders in table order.
    fn distribute_files(&mut self) -> Result<()> {
        let mut next = 0usize;
        for folder in &mut self.folders {
            let count = to_len_i32(folder.entry.file_count)?;
            for _ in 0..count {
                let file = self.files.get_mut(next).ok_or(Error::CountMismatch {
                    what: "archive files claimed by folders",
                    expected: next + 1,
                    found: next,
                })?;
                if file.entry.compressed_length > 0 {
                    file.folder = Some(folder.name.clone());
                }
                folder.files.push(next);
                next += 1;
            }
        }
        if next != self.files.len() {
            warn!("{} archive files are not owned by any folder", self.files.len() - next);
        }
        Ok(())
    }

    /// Sub-format number from the file extension, if opened from a path.
    #[must_use]
    pub fn variant(&self) -> Option<u8> {
        self.variant
    }

    #[must_use]
    pub fn header(&self) -> &ArchHeader {
        &self.header
    }

    /// Byte order of the archive.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.reader.endian()
    }

    #[must_use]
    pub fn folders(&self) -> &[ArchFolder] {
        &self.folders
    }

    #[must_use]
    pub fn files(&self) -> &[ArchFileEntry] {
        &self.files
    }

    /// Find a file by its folder-relative path (case-insensitive, either
    /// slash direction).
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&ArchFileEntry> {
        let wanted = normalize_path(path);
        self.files
            .iter()
            .find(|f| f.full_path().is_some_and(|p| normalize_path(&p) == wanted))
    }

    /// Read and reassemble a file's payload.
    ///
    /// Stored payloads are returned verbatim. Compressed payloads are a
    /// sequence of `(compressed, decompressed)` length headers each followed
    /// by a 4-byte aligned block; a block that fails to inflate is skipped.
    ///
    /// # Errors
    /// Returns an error for invalid offsets, implausible block lengths,
    /// truncation, or compressed data in a big-endian archive.
    pub fn read_data(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        if entry.compressed_length == 0 || entry.uncompressed_length == 0 {
            return Ok(Vec::new());
        }
        if entry.data_offset <= 0 || entry.compressed_length < 0 || entry.uncompressed_length < 0 {
            return Err(Error::invalid(
                "archive",
                format!(
                    "bad file entry: offset {}, lengths {}/{}",
                    entry.data_offset, entry.compressed_length, entry.uncompressed_length
                ),
            ));
        }

        self.reader.seek(entry.data_offset as u64)?;
        if entry.is_stored() {
            return self.reader.read_bytes_signed(entry.compressed_length);
        }

        let mut output = Vec::with_capacity(entry.uncompressed_length as usize);
        let mut consumed = 0i64;
        while consumed < entry.compressed_length {
            let block_offset = self.reader.position();
            let compressed = self.reader.read_i32()?;
            if self.reader.endian() == Endian::Big {
                return Err(Error::NotImplemented(
                    "block decompression of big-endian archives".into(),
                ));
            }
            let decompressed = self.reader.read_i32()?;
            if !(0..=MAX_BLOCK_LENGTH).contains(&compressed)
                || !(0..=MAX_BLOCK_LENGTH).contains(&decompressed)
            {
                return Err(Error::InvalidBlockLength {
                    offset: block_offset,
                    compressed,
                    decompressed,
                });
            }

            let block = self.reader.read_bytes(compressed as usize)?;
            let padding = self.reader.align(4)?;

            if compressed == decompressed {
                output.extend_from_slice(&block);
            } else {
                match inflate_zlib(&block, decompressed as usize) {
                    Ok(data) => output.extend_from_slice(&data),
                    Err(e) => warn!("Skipping block at {block_offset}: {e}"),
                }
            }
            consumed += i64::from(compressed) + 8 + padding as i64;
        }

        if consumed != entry.compressed_length {
            debug!(
                "Block stream consumed {consumed} bytes, entry declares {}",
                entry.compressed_length
            );
        }
        Ok(output)
    }

    /// Read a file's payload by folder-relative path.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be read. A missing path is
    /// `Ok(None)`.
    pub fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.find(path).map(|f| f.entry) else {
            return Ok(None);
        };
        self.read_data(&entry).map(Some)
    }

    /// Write every named file under `dest`, recreating the folder layout.
    /// Returns the number of files written.
    ///
    /// # Errors
    /// Returns an error if a payload cannot be read or written.
    pub fn extract_all(&mut self, dest: impl AsRef<Path>) -> Result<usize> {
        let dest = dest.as_ref();
        let targets: Vec<(String, FileEntry)> = self
            .files
            .iter()
            .filter_map(|f| f.full_path().map(|p| (p, f.entry)))
            .collect();

        for (path, entry) in &targets {
            let mut out = dest.to_path_buf();
            for part in path.split(['\\', '/']).filter(|p| !p.is_empty() && *p != "..") {
                out.push(part);
            }
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let data = self.read_data(entry)?;
            std::fs::write(&out, data)?;
        }
        Ok(targets.len())
    }
}

/// Resolve folder names by walking the first-child/next-sibling tree from
/// the root.
fn build_folders(entries: &[FolderEntry], names: &mut OffsetTable) -> Result<Vec<ArchFolder>> {
    let root = entries
        .iter()
        .position(|f| f.name_offset == 0)
        .ok_or(Error::ArchiveRootNotFound)?;

    let mut folders: Vec<ArchFolder> = entries
        .iter()
        .map(|&entry| ArchFolder {
            entry,
            ..ArchFolder::default()
        })
        .collect();

    let mut visited = vec![false; entries.len()];
    let mut stack = vec![root];
    while let Some(index) = stack.pop() {
        let folder = folders.get_mut(index).ok_or_else(|| {
            Error::invalid("archive", format!("folder index {index} out of range"))
        })?;
        if std::mem::replace(&mut visited[index], true) {
            return Err(Error::invalid("archive", format!("folder {index} visited twice")));
        }
        if folder.entry.name_offset != 0 {
            folder.name = names.string_at(folder.entry.name_offset)?;
        }
        for link in [folder.entry.next_sibling, folder.entry.first_child] {
            if link > -1 {
                stack.push(link as usize);
            }
        }
    }
    Ok(folders)
}

fn build_files(entries: &[FileEntry], names: &mut OffsetTable) -> Result<Vec<ArchFileEntry>> {
    entries
        .iter()
        .map(|&entry| {
            let name = if entry.compressed_length > 0 {
                Some(names.string_at(entry.name_offset)?)
            } else {
                None
            };
            Ok(ArchFileEntry {
                entry,
                name,
                folder: None,
            })
        })
        .collect()
}

/// Two-digit sub-format number from an `.archNN` extension.
fn archive_variant(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?;
    let digits = ext.get(ext.len().checked_sub(2)?..)?;
    digits.parse().ok()
}

fn normalize_path(path: &str) -> String {
    path.replace('/', "\\").trim_start_matches('\\').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteReader;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    struct ArchBuilder {
        names: Vec<u8>,
        files: Vec<FileEntry>,
        folders: Vec<FolderEntry>,
        payload: Vec<u8>,
    }

    impl ArchBuilder {
        fn new() -> Self {
            Self {
                names: vec![0],
                files: Vec::new(),
                folders: Vec::new(),
                payload: Vec::new(),
            }
        }

        fn name(&mut self, name: &str) -> i32 {
            let offset = self.names.len() as i32;
            self.names.extend_from_slice(name.as_bytes());
            self.names.push(0);
            offset
        }

        fn header_size(&self) -> usize {
            4 + 4 + 6 * 4 + 16 + self.names.len() + self.files.len() * 32 + self.folders.len() * 16
        }

        fn build(&self) -> Vec<u8> {
            let base = self.header_size() as i64;
            let mut out = Vec::new();
            out.extend_from_slice(b"LTAR");
            for v in [3, self.names.len() as i32, self.folders.len() as i32, self.files.len() as i32, 1, 0, 1] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.extend_from_slice(&[0xAB; 16]);
            out.extend_from_slice(&self.names);
            for f in &self.files {
                out.extend_from_slice(&f.name_offset.to_le_bytes());
                out.extend_from_slice(&(f.data_offset + base).to_le_bytes());
                out.extend_from_slice(&f.compressed_length.to_le_bytes());
                out.extend_from_slice(&f.uncompressed_length.to_le_bytes());
                out.extend_from_slice(&f.flags.to_le_bytes());
            }
            for f in &self.folders {
                for v in [f.name_offset, f.first_child, f.next_sibling, f.file_count] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            out.extend_from_slice(&self.payload);
            out
        }
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_single_stored_file() {
        let mut b = ArchBuilder::new();
        let name = b.name("readme.txt");
        b.files.push(FileEntry {
            name_offset: name,
            data_offset: 0,
            compressed_length: 10,
            uncompressed_length: 10,
            flags: 0,
        });
        b.folders.push(FolderEntry {
            name_offset: 0,
            first_child: -1,
            next_sibling: -1,
            file_count: 1,
        });
        b.payload.extend_from_slice(b"0123456789");

        let mut archive = ArchFile::from_reader(ByteReader::from_bytes(b.build())).unwrap();
        assert_eq!(archive.files().len(), 1);
        assert_eq!(archive.header().unknown, [1, 0, 1]);
        let entry = archive.files()[0].entry;
        assert_eq!(archive.read_data(&entry).unwrap(), b"0123456789");
        assert_eq!(archive.files()[0].full_path().as_deref(), Some("readme.txt"));
    }

    #[test]
    fn test_folder_tree_and_paths() {
        let mut b = ArchBuilder::new();
        let models = b.name("Models");
        let props = b.name("Models\\Props");
        let chair = b.name("chair.ltb");
        let lamp = b.name("lamp.ltb");
        for (name, len) in [(chair, 4), (0, 0), (lamp, 4)] {
            b.files.push(FileEntry {
                name_offset: name,
                data_offset: 0,
                compressed_length: len,
                uncompressed_length: len,
                flags: 0,
            });
        }
        b.payload.extend_from_slice(b"data");
        b.folders.push(FolderEntry { name_offset: 0, first_child: 1, next_sibling: -1, file_count: 0 });
        b.folders.push(FolderEntry { name_offset: models, first_child: 2, next_sibling: -1, file_count: 1 });
        b.folders.push(FolderEntry { name_offset: props, first_child: -1, next_sibling: -1, file_count: 2 });

        let archive = ArchFile::from_reader(ByteReader::from_bytes(b.build())).unwrap();
        let names: Vec<_> = archive.folders().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["", "Models", "Models\\Props"]);
        assert_eq!(archive.folders()[2].files, vec![1, 2]);

        assert_eq!(archive.files()[0].full_path().as_deref(), Some("Models\\chair.ltb"));
        // Empty files keep their slot but get no name
        assert_eq!(archive.files()[1].name, None);
        assert_eq!(archive.files()[2].full_path().as_deref(), Some("Models\\Props\\lamp.ltb"));
        assert!(archive.find("models/props/LAMP.ltb").is_some());

        for file in archive.files() {
            if file.entry.compressed_length > 0 {
                assert!(file.name.is_some());
            }
        }
    }

    #[test]
    fn test_block_compressed_file() {
        let first = b"abcabcabcabcabcabcabcabc".repeat(4);
        let packed = zlib(&first);
        let raw = b"xyz";

        let mut payload = Vec::new();
        payload.extend_from_slice(&(packed.len() as i32).to_le_bytes());
        payload.extend_from_slice(&(first.len() as i32).to_le_bytes());
        payload.extend_from_slice(&packed);
        while payload.len() % 4 != 0 {
            payload.push(0);
        }
        payload.extend_from_slice(&3i32.to_le_bytes());
        payload.extend_from_slice(&3i32.to_le_bytes());
        payload.extend_from_slice(raw);

        let mut b = ArchBuilder::new();
        let name = b.name("a.bin");
        b.files.push(FileEntry {
            name_offset: name,
            data_offset: 0,
            compressed_length: payload.len() as i64 + 1,
            uncompressed_length: (first.len() + 3) as i64,
            flags: 9,
        });
        b.folders.push(FolderEntry { name_offset: 0, first_child: -1, next_sibling: -1, file_count: 1 });
        // The header size depends on the name table, so align the payload start
        let pad = (4 - b.header_size() % 4) % 4;
        b.payload.extend(std::iter::repeat_n(0u8, pad));
        b.files[0].data_offset = pad as i64;
        b.payload.extend_from_slice(&payload);
        b.payload.push(0);

        let mut archive = ArchFile::from_reader(ByteReader::from_bytes(b.build())).unwrap();
        let entry = archive.files()[0].entry;
        let mut expected = first.clone();
        expected.extend_from_slice(raw);
        assert_eq!(archive.read_data(&entry).unwrap(), expected);
    }

    #[test]
    fn test_corrupt_block_is_skipped() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&4i32.to_le_bytes());
        payload.extend_from_slice(&40i32.to_le_bytes());
        payload.extend_from_slice(b"junk");
        payload.extend_from_slice(&2i32.to_le_bytes());
        payload.extend_from_slice(&2i32.to_le_bytes());
        payload.extend_from_slice(b"ok\0\0");

        let mut data = vec![0u8; 8];
        data.extend_from_slice(&payload);
        let mut archive = ArchFile {
            reader: ByteReader::from_bytes(data),
            variant: None,
            header: ArchHeader::default(),
            folders: Vec::new(),
            files: Vec::new(),
        };
        let entry = FileEntry {
            name_offset: 0,
            data_offset: 8,
            compressed_length: payload.len() as i64,
            uncompressed_length: 42,
            flags: 9,
        };
        assert_eq!(archive.read_data(&entry).unwrap(), b"ok");
    }

    #[test]
    fn test_bad_block_length() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&200_000i32.to_le_bytes());
        data.extend_from_slice(&4i32.to_le_bytes());
        let mut archive = ArchFile {
            reader: ByteReader::from_bytes(data),
            variant: None,
            header: ArchHeader::default(),
            folders: Vec::new(),
            files: Vec::new(),
        };
        let entry = FileEntry {
            name_offset: 0,
            data_offset: 8,
            compressed_length: 12,
            uncompressed_length: 20,
            flags: 9,
        };
        assert!(matches!(
            archive.read_data(&entry),
            Err(Error::InvalidBlockLength { compressed: 200_000, .. })
        ));
    }

    #[test]
    fn test_big_endian_header() {
        let mut out = Vec::new();
        out.extend_from_slice(b"RATL");
        for v in [3i32, 1, 1, 0, 0, 0, 0] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&[0; 16]);
        out.push(0);
        for v in [0i32, -1, -1, 0] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        let archive = ArchFile::from_reader(ByteReader::from_bytes(out)).unwrap();
        assert_eq!(archive.endian(), Endian::Big);
        assert_eq!(archive.folders().len(), 1);
        assert_eq!(archive.folders()[0].entry.first_child, -1);
    }

    #[test]
    fn test_big_endian_blocks_not_implemented() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&4i32.to_be_bytes());
        data.extend_from_slice(&8i32.to_be_bytes());
        let mut reader = ByteReader::from_bytes(data);
        reader.set_endian(Endian::Big);
        let mut archive = ArchFile {
            reader,
            variant: None,
            header: ArchHeader::default(),
            folders: Vec::new(),
            files: Vec::new(),
        };
        let entry = FileEntry {
            name_offset: 0,
            data_offset: 8,
            compressed_length: 12,
            uncompressed_length: 20,
            flags: 9,
        };
        assert!(matches!(archive.read_data(&entry), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_bad_magic_and_missing_root() {
        let result = ArchFile::from_reader(ByteReader::from_bytes(b"NOPE\x03\0\0\0".to_vec()));
        assert!(matches!(result, Err(Error::InvalidMagic { .. })));

        let mut b = ArchBuilder::new();
        let name = b.name("sub");
        b.folders.push(FolderEntry { name_offset: name, first_child: -1, next_sibling: -1, file_count: 0 });
        let result = ArchFile::from_reader(ByteReader::from_bytes(b.build()));
        assert!(matches!(result, Err(Error::ArchiveRootNotFound)));
    }

    #[test]
    fn test_variant_from_extension() {
        assert_eq!(archive_variant(Path::new("FEAR_1.Arch00")), Some(0));
        assert_eq!(archive_variant(Path::new("Game.arch06")), Some(6));
        assert_eq!(archive_variant(Path::new("noext")), None);
    }
}
