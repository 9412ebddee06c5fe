//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Attribute name hashing and the reverse lookup wordlist

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Environment variable naming the attribute-name wordlist.
pub const HASH_NAMES_ENV: &str = "LITHDIG_HASH_NAMES";

#[rustfmt::skip]
const SBOX: [u8; 256] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x25, 0x3A, 0x33, 0x3C, 0x3D, 0x3E, 0x40, 0x32, 0x42, 0x43, 0x41, 0x28, 0x36, 0x27, 0x37, 0x34,
    0x1B, 0x1C, 0x1D, 0x1E, 0x1F, 0x20, 0x21, 0x22, 0x23, 0x24, 0x31, 0x30, 0x38, 0x29, 0x39, 0x35,
    0x3B, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x2C, 0x2A, 0x2D, 0x3F, 0x26,
    0x44, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x2E, 0x2B, 0x2F, 0x45, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Hash a name the way game databases do: `h = sbox[c] + 919 * h` over
/// each character code, wrapping.
///
/// The S-box maps upper and lower case letters to the same value, so the
/// hash ignores ASCII case while still distinguishing punctuation.
#[must_use]
pub fn calc_hash(name: &str) -> i32 {
    name.chars().fold(0i32, |acc, c| {
        let code = SBOX.get(c as usize).copied().unwrap_or(0);
        i32::from(code).wrapping_add(acc.wrapping_mul(919))
    })
}

/// Reverse lookup from attribute name hash to name.
///
/// Built once by the caller and passed by reference to every game database
/// decode.
#[derive(Debug, Clone, Default)]
pub struct HashNameTable {
    names: HashMap<i32, String>,
}

impl HashNameTable {
    /// An empty table; every hash renders as a placeholder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from wordlist text: one name per line, `//` comment lines and
    /// blank lines ignored, surrounding whitespace trimmed.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut table = Self::new();
        for line in text.lines() {
            if line.starts_with("//") {
                continue;
            }
            table.insert(line.trim());
        }
        table
    }

    /// Load a wordlist file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_text(&std::fs::read_to_string(path)?);
        debug!("Loaded {} hashed names from {}", table.len(), path.display());
        Ok(table)
    }

    /// Load the wordlist named by `LITHDIG_HASH_NAMES`, or an empty table if
    /// the variable is unset.
    ///
    /// # Errors
    /// Returns an error if the variable is set but the file cannot be read.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(HASH_NAMES_ENV) {
            Some(path) => Self::load(crate::world::expand_home(&PathBuf::from(path))),
            None => Ok(Self::new()),
        }
    }

    /// Add a name.
    pub fn insert(&mut self, name: &str) {
        if !name.is_empty() {
            self.names.insert(calc_hash(name), name.to_string());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name for a hash, or `0x%08X` when unknown.
    #[must_use]
    pub fn name(&self, hash: i32) -> String {
        self.names
            .get(&hash)
            .cloned()
            .unwrap_or_else(|| format!("0x{hash:08X}"))
    }
}
