//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! World loading options

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Environment variable naming the game install directory.
pub const GAME_DIR_ENV: &str = "LITHDIG_GAME_DIR";

/// Content folders searched for bundles after the install directory (FEAR 2).
pub const FEAR2_CONTENT_DIRS: [&str; 3] = ["DLC01", "DLC02", "DLC03"];

/// Game titles built on Jupiter EX / LT5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Game {
    #[default]
    Fear,
    Condemned,
    District187,
    Fear2,
}

impl Game {
    /// Per-title XOR mask applied to the world model counts.
    #[must_use]
    pub fn count_mask(self) -> i32 {
        match self {
            Self::Fear => 399,
            Self::Condemned => 0,
            Self::District187 => 246,
            Self::Fear2 => 0,
        }
    }

    /// Extra content folders searched for bundles by default.
    #[must_use]
    pub fn content_dirs(self) -> Vec<PathBuf> {
        match self {
            Self::Fear2 => FEAR2_CONTENT_DIRS.iter().map(PathBuf::from).collect(),
            _ => Vec::new(),
        }
    }
}

/// The two world format generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorldVersion {
    /// Jupiter EX (`.world00p`)
    Fear,
    /// LT5 (`.wld`)
    Loki,
}

impl WorldVersion {
    #[must_use]
    pub fn is_loki(self) -> bool {
        self == Self::Loki
    }
}

/// Numeric version field values for each world generation.
///
/// The defaults are placeholders; callers who know the values found in
/// their files inject them here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCodes {
    pub fear: i32,
    pub loki: i32,
}

impl Default for VersionCodes {
    fn default() -> Self {
        Self { fear: 111, loki: 128 }
    }
}

impl VersionCodes {
    /// Map a raw version field.
    #[must_use]
    pub fn classify(&self, raw: i32) -> Option<WorldVersion> {
        if raw == self.fear {
            Some(WorldVersion::Fear)
        } else if raw == self.loki {
            Some(WorldVersion::Loki)
        } else {
            None
        }
    }

    #[must_use]
    pub fn code(&self, version: WorldVersion) -> i32 {
        match version {
            WorldVersion::Fear => self.fear,
            WorldVersion::Loki => self.loki,
        }
    }
}

/// Options for [`WorldFile::open`](super::WorldFile::open).
#[derive(Debug, Clone, Default)]
pub struct WorldLoadOptions {
    pub game: Game,
    /// Install directory external streams and bundles resolve against;
    /// the world file's own directory when unset
    pub game_dir: Option<PathBuf>,
    /// Extra folders (relative to the install directory) searched for
    /// bundles; the title's defaults when unset
    pub content_dirs: Option<Vec<PathBuf>>,
    pub version_codes: VersionCodes,
    /// Merge attributes from the paired `.gamedb` into LT5 objects
    pub merge_game_db: bool,
}

impl WorldLoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            merge_game_db: true,
            ..Self::default()
        }
    }

    /// Options with the install directory taken from `LITHDIG_GAME_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::new();
        options.game_dir = std::env::var_os(GAME_DIR_ENV).map(|dir| expand_home(Path::new(&dir)));
        options
    }

    #[must_use]
    pub fn with_game(mut self, game: Game) -> Self {
        self.game = game;
        self
    }

    #[must_use]
    pub fn with_game_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.game_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_content_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.content_dirs = Some(dirs);
        self
    }

    #[must_use]
    pub fn with_version_codes(mut self, codes: VersionCodes) -> Self {
        self.version_codes = codes;
        self
    }

    #[must_use]
    pub fn with_game_db_merge(mut self, merge: bool) -> Self {
        self.merge_game_db = merge;
        self
    }

    pub(crate) fn effective_content_dirs(&self) -> Vec<PathBuf> {
        self.content_dirs
            .clone()
            .unwrap_or_else(|| self.game.content_dirs())
    }
}

/// Expand a leading `~` to the home directory.
pub(crate) fn expand_home(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
