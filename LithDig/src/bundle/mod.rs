//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! LT5 bundle readers (`.bndl`, `.lvbndl`)
//!
//! Both formats are a name table followed by a run of `(size, payload)`
//! records. They share the [`Bundle`] contract so the world decoder can
//! resolve embedded resources without caring which kind it opened.

mod bndl;
mod lvbndl;

pub use bndl::BndlFile;
pub use lvbndl::LvBndlFile;

use crate::error::Result;

/// `.bndl` magic
pub const BNDL_MAGIC: [u8; 4] = *b"BNDL";

/// `.bndl` version
pub const BNDL_VERSION: i32 = 3;

/// Marker value found in place of the magic in a known empty bundle form
pub const BNDL_EMPTY_MARKER: i32 = 15;

/// Invalid `.bndl` files shorter than this are treated as empty
pub const BNDL_MIN_LENGTH: u64 = 100;

/// `.lvbndl` magic
pub const LVBNDL_MAGIC: [u8; 4] = *b"LVRS";

/// `.lvbndl` version
pub const LVBNDL_VERSION: i32 = 1;

/// One file inside a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleEntry {
    pub index: usize,
    pub path: String,
    /// Absolute payload offset; 0 when the entry has no payload
    pub offset: u64,
    pub size: u32,
}

impl BundleEntry {
    /// Whether the entry is a name-only placeholder.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.offset != 0
    }
}

/// Common contract of the bundle formats.
pub trait Bundle {
    /// All entries, in file order.
    fn entries(&self) -> &[BundleEntry];

    /// Read an entry's payload. `Ok(None)` for entries without payload.
    ///
    /// # Errors
    /// Returns an error if the payload runs past the end of the file.
    fn read_data(&mut self, entry: &BundleEntry) -> Result<Option<Vec<u8>>>;

    /// Find an entry by path (case-insensitive).
    fn find(&self, path: &str) -> Option<&BundleEntry> {
        self.entries()
            .iter()
            .find(|e| e.path.eq_ignore_ascii_case(path))
    }
}
