//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Resolution of external meshes and prefabs
//!
//! Jupiter EX streams are plain files under the install directory. LT5
//! streams live in bundles located through the files section; the first
//! bundle that lists a path owns it.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::options::WorldVersion;
use super::prefab::PrefabFile;
use crate::bundle::{BndlFile, Bundle, BundleEntry};
use crate::error::Result;
use crate::io::ByteReader;

#[derive(Debug)]
pub(crate) struct DataResolver {
    version: WorldVersion,
    game_dir: PathBuf,
    content_dirs: Vec<PathBuf>,
    bundles: IndexMap<String, BndlFile<BufReader<File>>>,
    missing_bundles: HashSet<String>,
    /// Lower-cased entry path to (bundle index, entry)
    contents: HashMap<String, (usize, BundleEntry)>,
    prefabs: HashMap<String, PrefabFile>,
}

/// Normalize a stored path to forward slashes.
pub(crate) fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

impl DataResolver {
    pub(crate) fn new(version: WorldVersion, game_dir: PathBuf, content_dirs: Vec<PathBuf>) -> Self {
        Self {
            version,
            game_dir,
            content_dirs,
            bundles: IndexMap::new(),
            missing_bundles: HashSet::new(),
            contents: HashMap::new(),
            prefabs: HashMap::new(),
        }
    }

    pub(crate) fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Cached bundle names, in load order.
    pub(crate) fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    fn locate_bundle(&self, name: &str) -> Option<PathBuf> {
        let relative = normalize_path(name);
        std::iter::once(self.game_dir.join(&relative))
            .chain(self.content_dirs.iter().map(|dir| self.game_dir.join(dir).join(&relative)))
            .find(|candidate| candidate.is_file())
    }

    /// Open a bundle and index its entries. Returns `false` when it was
    /// already cached or cannot be found.
    ///
    /// # Errors
    /// Returns an error if a bundle that exists fails to decode.
    pub(crate) fn cache_bundle(&mut self, name: &str) -> Result<bool> {
        let key = name.to_lowercase();
        if self.bundles.contains_key(&key) || self.missing_bundles.contains(&key) {
            return Ok(false);
        }
        let Some(path) = self.locate_bundle(name) else {
            warn!("Bundle not found: {name}");
            self.missing_bundles.insert(key);
            return Ok(false);
        };
        debug!("Caching bundle {}", path.display());
        let bundle = BndlFile::open(&path)?;
        let bundle_index = self.bundles.len();
        for entry in bundle.entries() {
            let entry_key = normalize_path(&entry.path).to_lowercase();
            if self.contents.contains_key(&entry_key) {
                warn!("'{}' in {name} is already provided by an earlier bundle", entry.path);
                continue;
            }
            self.contents.insert(entry_key, (bundle_index, entry.clone()));
        }
        self.bundles.insert(key, bundle);
        Ok(true)
    }

    /// Open an external data stream by its stored name. `Ok(None)` when it
    /// cannot be found.
    ///
    /// # Errors
    /// Returns an error if the stream exists but cannot be read.
    pub(crate) fn resolve(&mut self, name: &str) -> Result<Option<ByteReader>> {
        let relative = normalize_path(name);
        if !self.version.is_loki() {
            let path = self.game_dir.join(&relative);
            if !path.is_file() {
                warn!("World data stream not found: {}", path.display());
                return Ok(None);
            }
            return ByteReader::read_file(&path).map(Some);
        }

        let Some((bundle_index, entry)) = self.contents.get(&relative.to_lowercase()) else {
            warn!("World data stream not found in any bundle: {name}");
            return Ok(None);
        };
        let entry = entry.clone();
        let Some((_, bundle)) = self.bundles.get_index_mut(*bundle_index) else {
            return Ok(None);
        };
        match bundle.read_data(&entry)? {
            Some(data) => Ok(Some(ByteReader::from_bytes(data))),
            None => {
                warn!("World data stream has no payload: {name}");
                Ok(None)
            }
        }
    }

    /// Decode a prefab once and cache it by name.
    ///
    /// # Errors
    /// Returns an error if the prefab exists but fails to decode.
    pub(crate) fn read_prefab(&mut self, name: &str) -> Result<Option<&PrefabFile>> {
        let key = name.to_lowercase();
        if !self.prefabs.contains_key(&key) {
            let Some(mut reader) = self.resolve(name)? else {
                return Ok(None);
            };
            let prefab = PrefabFile::read(&mut reader, name)?;
            self.prefabs.insert(key.clone(), prefab);
        }
        Ok(self.prefabs.get(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_bundle(path: &Path, files: &[(&str, &[u8])]) {
        let mut names = vec![0u8];
        let mut offsets = Vec::new();
        for (name, _) in files {
            offsets.push(names.len() as i32);
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        let mut out = b"BNDL".to_vec();
        for v in [3i32, names.len() as i32, 0, 0, files.len() as i32] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&names);
        for ((_, data), offset) in files.iter().zip(offsets) {
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        // keep clear of the short-file fallback
        out.resize(out.len().max(128), 0);
        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn test_bundle_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("DLC01")).unwrap();
        write_bundle(&dir.path().join("a.bndl"), &[("Meshes\\Crate.mesh", &b"first"[..])]);
        write_bundle(
            &dir.path().join("DLC01").join("b.bndl"),
            &[("meshes/crate.mesh", &b"second"[..]), ("x.prfb", &b"x"[..])],
        );

        let mut resolver = DataResolver::new(
            WorldVersion::Loki,
            dir.path().to_path_buf(),
            vec![PathBuf::from("DLC01")],
        );
        assert!(resolver.cache_bundle("a.bndl").unwrap());
        assert!(resolver.cache_bundle("b.bndl").unwrap());
        assert!(!resolver.cache_bundle("A.BNDL").unwrap());
        assert!(!resolver.cache_bundle("missing.bndl").unwrap());
        assert_eq!(resolver.bundle_names().collect::<Vec<_>>(), vec!["a.bndl", "b.bndl"]);

        let mut stream = resolver.resolve("meshes\\CRATE.mesh").unwrap().unwrap();
        assert_eq!(stream.read_remaining().unwrap(), b"first");
        assert!(resolver.resolve("x.prfb").unwrap().is_some());
        assert!(resolver.resolve("nothing.mesh").unwrap().is_none());
    }

    #[test]
    fn test_plain_file_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Worlds")).unwrap();
        std::fs::write(dir.path().join("Worlds").join("a.mesh"), b"abc").unwrap();
        let mut resolver = DataResolver::new(WorldVersion::Fear, dir.path().to_path_buf(), Vec::new());
        let mut stream = resolver.resolve("Worlds\\a.mesh").unwrap().unwrap();
        assert_eq!(stream.read_remaining().unwrap(), b"abc");
        assert!(resolver.resolve("Worlds\\b.mesh").unwrap().is_none());
    }

    #[test]
    fn test_missing_prefab() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = DataResolver::new(WorldVersion::Loki, dir.path().to_path_buf(), Vec::new());
        assert!(resolver.read_prefab("nope.inst").unwrap().is_none());
    }
}
