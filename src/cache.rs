//! Content-addressed JSON cache
//!
//! Maps a digest of the semantically relevant inputs to a JSON artifact under a
//! root directory (`<root>/<hash>.json`). Entries are never invalidated here;
//! clearing is an explicit operation. Used for both paper summaries and rule
//! condition evaluations.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A cached artifact together with the key it is stored under
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
}

/// Directory-backed content-addressed cache
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable identifier for the given key material (32 hex chars = 128 bits)
    pub fn key_for(key_material: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key_material);
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Load the artifact stored under `key`.
    ///
    /// A missing file is a miss (`Ok(None)`); a file that does not parse as `T`
    /// is an error, never a miss.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(&path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| Error::CorruptEntry { path, source })
    }

    /// Persist `value` under `key` (write to a temp file, then rename)
    pub fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::storage(&self.root, e))?;

        let content = serde_json::to_string_pretty(value)
            .map_err(|e| Error::storage(self.path_for(key), io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let tmp_path = self.root.join(format!(".{}.json.tmp", key));
        fs::write(&tmp_path, content).map_err(|e| Error::storage(&tmp_path, e))?;

        let path = self.path_for(key);
        fs::rename(&tmp_path, &path).map_err(|e| Error::storage(&path, e))?;
        Ok(())
    }

    /// Return the stored artifact for `key_material`, or run `compute` once,
    /// store its result and return it.
    pub fn get_or_compute<T, F>(&self, key_material: &[u8], compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = Self::key_for(key_material);

        if let Some(value) = self.load(&key)? {
            tracing::debug!(key = %key, root = %self.root.display(), "cache hit");
            return Ok(value);
        }

        tracing::debug!(key = %key, root = %self.root.display(), "cache miss");
        let value = compute()?;
        self.store(&key, &value)?;
        Ok(value)
    }

    /// All stored artifacts, sorted by key
    pub fn entries<T: DeserializeOwned>(&self) -> Result<Vec<CacheEntry<T>>> {
        let mut keys = self.keys()?;
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.load(&key)? {
                entries.push(CacheEntry { key, value });
            }
        }
        Ok(entries)
    }

    /// Remove every file in the cache directory. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::storage(&self.root, e)),
        };

        let mut removed = 0;
        for entry in dir {
            let path = entry.map_err(|e| Error::storage(&self.root, e))?.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|e| Error::storage(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(&self.root, e)),
        };

        let mut keys = Vec::new();
        for entry in dir {
            let path = entry.map_err(|e| Error::storage(&self.root, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    keys.push(stem.to_string());
                }
            }
        }
        Ok(keys)
    }
}
