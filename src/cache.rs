//! Per-folder content hash index
//!
//! Answers "does this destination folder already hold a byte-identical
//! copy of this file?". Each folder is back-filled lazily: every call lists
//! the folder and hashes only the files not indexed yet, so repeat lookups
//! cost O(new files). Once a file name is indexed its hash is never
//! recomputed, and out-of-band changes to indexed files are not observed.
//!
//! The cache lives for the whole process and is never evicted. It has no
//! internal locking; it is owned by the single pipeline worker.

use crate::error::Result;
use crate::hash::{ContentHash, compute_file_hash};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Hashes known for one destination folder
#[derive(Debug, Default)]
struct FolderIndex {
    hashes: HashSet<ContentHash>,
    by_name: HashMap<OsString, ContentHash>,
}

impl FolderIndex {
    fn insert(&mut self, name: OsString, hash: ContentHash) {
        self.hashes.insert(hash);
        self.by_name.insert(name, hash);
    }

    /// Name of an indexed file with the given hash
    fn name_of(&self, hash: &ContentHash) -> Option<&OsString> {
        self.by_name
            .iter()
            .find_map(|(name, h)| (h == hash).then_some(name))
    }
}

/// Process-lifetime cache of content hashes keyed by destination folder
#[derive(Debug, Default)]
pub struct HashCache {
    folders: HashMap<PathBuf, FolderIndex>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `folder` already holds a file with the same content as `candidate`
    ///
    /// A folder that cannot be listed counts as empty.
    pub fn has_duplicate(&mut self, folder: &Path, candidate: &Path) -> Result<bool> {
        Ok(self.find_duplicate(folder, candidate)?.is_some())
    }

    /// Path of a file in `folder` whose content matches `candidate`, if any
    pub fn find_duplicate(&mut self, folder: &Path, candidate: &Path) -> Result<Option<PathBuf>> {
        let key = normalize_folder(folder);
        let index = self.folders.entry(key.clone()).or_default();
        backfill(&key, index);

        if index.hashes.is_empty() {
            return Ok(None);
        }

        let hash = compute_file_hash(candidate)?;
        if !index.hashes.contains(&hash) {
            trace!(?candidate, folder = ?key, "No matching content in folder");
            return Ok(None);
        }

        let existing = index
            .name_of(&hash)
            .map(|name| key.join(name))
            .unwrap_or(key);
        Ok(Some(existing))
    }

    /// Number of files indexed for `folder`
    pub fn indexed_count(&self, folder: &Path) -> usize {
        self.folders
            .get(&normalize_folder(folder))
            .map_or(0, |index| index.by_name.len())
    }

    /// Number of folders the cache has seen
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }
}

/// Hash every regular file in `folder` that is not indexed yet
fn backfill(folder: &Path, index: &mut FolderIndex) {
    let pending: Vec<(OsString, PathBuf)> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !index.by_name.contains_key(e.file_name()))
        .map(|e| (e.file_name().to_os_string(), e.into_path()))
        .collect();

    if pending.is_empty() {
        return;
    }

    debug!(?folder, count = pending.len(), "Indexing folder contents");

    let hashed: Vec<(OsString, Option<ContentHash>)> = pending
        .into_par_iter()
        .map(|(name, path)| {
            let hash = compute_file_hash(&path)
                .inspect_err(|e| warn!(?path, error = %e, "Failed to hash existing file"))
                .ok();
            (name, hash)
        })
        .collect();

    // Unreadable files stay unindexed and are retried on the next lookup
    for (name, hash) in hashed {
        if let Some(hash) = hash {
            index.insert(name, hash);
        }
    }
}

/// Absolute, lexically cleaned form of a folder path used as cache key
pub fn normalize_folder(folder: &Path) -> PathBuf {
    let absolute = std::path::absolute(folder).unwrap_or_else(|_| folder.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
