//! Error types for `LithDig`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `LithDig` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ==================== Stream Errors ====================
    /// A read would run past the end of the stream.
    #[error("unexpected end of stream at {position}/{length}: cannot read {requested} bytes")]
    UnexpectedEof {
        /// Cursor position when the read was attempted.
        position: u64,
        /// Number of bytes requested.
        requested: u64,
        /// Total length of the stream.
        length: u64,
    },

    /// A length prefix or count decoded as a negative number.
    #[error("negative length: {0}")]
    NegativeLength(i64),

    // ==================== Header Errors ====================
    /// The file does not start with the expected magic bytes.
    #[error("invalid {format} magic: expected {expected}, found {found:?}")]
    InvalidMagic {
        /// Format being decoded.
        format: &'static str,
        /// Expected magic.
        expected: &'static str,
        /// Bytes actually found.
        found: [u8; 4],
    },

    /// The version field holds a value this library does not decode.
    #[error("unsupported {format} version: {version}")]
    UnsupportedVersion {
        /// Format being decoded.
        format: &'static str,
        /// The version number found in the file.
        version: i64,
    },

    // ==================== Structure Errors ====================
    /// A structural invariant of the format does not hold.
    #[error("invalid {format} data: {message}")]
    InvalidFormat {
        /// Format being decoded.
        format: &'static str,
        /// Description of what is invalid.
        message: String,
    },

    /// A decoded count disagrees with a count declared elsewhere in the file.
    #[error("{what}: expected {expected}, found {found}")]
    CountMismatch {
        /// What was being counted.
        what: &'static str,
        /// Declared count.
        expected: usize,
        /// Count actually decoded.
        found: usize,
    },

    /// The format variant is known to exist but is not decoded.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    // ==================== Archive Errors ====================
    /// No folder entry has a zero name offset.
    #[error("archive has no root folder")]
    ArchiveRootNotFound,

    /// A compressed block header holds implausible lengths.
    #[error("bad block at offset {offset}: compressed {compressed}, decompressed {decompressed}")]
    InvalidBlockLength {
        /// Stream offset of the block header.
        offset: u64,
        /// Compressed block length.
        compressed: i32,
        /// Decompressed block length.
        decompressed: i32,
    },

    // ==================== Material Library Errors ====================
    /// A material property has a type tag outside the known set.
    #[error("unknown material property type: {0}")]
    UnknownPropertyType(i16),

    // ==================== Game Database Errors ====================
    /// A stored name hash does not match the hash of the decoded name.
    #[error("hash mismatch for '{name}': stored {stored:#010X}, computed {computed:#010X}")]
    HashMismatch {
        /// The decoded name.
        name: String,
        /// Hash stored in the file.
        stored: i32,
        /// Hash computed from the name.
        computed: i32,
    },

    /// An attribute has a type tag outside the known set.
    #[error("unknown attribute type: {0}")]
    UnknownAttributeType(i32),

    // ==================== World Errors ====================
    /// A physics shape has a type tag outside the known set.
    #[error("unknown physics shape type: {0}")]
    UnknownShapeType(i32),

    /// A vertex property slot combination that is not decoded.
    #[error("unhandled vertex slot: usage {usage}, format {format}, index {index}")]
    UnknownVertexSlot {
        /// Raw usage tag.
        usage: u8,
        /// Raw format tag.
        format: u8,
        /// Usage index.
        index: u8,
    },

    /// A world object property has a type tag outside the known set.
    #[error("unknown object property type: {0}")]
    UnknownObjectPropertyType(i32),

    /// A world sibling file of a split layout is missing.
    #[error("split world file not found: {}", path.display())]
    SplitFileMissing {
        /// Expected path of the sibling file.
        path: PathBuf,
    },

    /// A world decode stage failed.
    #[error("{} ({stage}): {source}", path.display())]
    World {
        /// The world file being decoded.
        path: PathBuf,
        /// Stage that failed.
        stage: &'static str,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },
}

/// Result type for `LithDig` operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidFormat`].
    pub(crate) fn invalid(format: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            format,
            message: message.into(),
        }
    }
}
