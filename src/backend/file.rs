//! On-disk backend
//!
//! Entries are small JSON documents under a configured directory, one file
//! per key:
//!
//! ```json
//! { "created_at": "...", "expires_at": "...", "value": "<base64>" }
//! ```
//!
//! The file name is the SHA-256 hex of the (already namespaced) key plus a
//! kind-specific suffix. Plain `file` entries end in `.cache`;
//! `compiled-file` entries end in `.compiled.cache` so the invalidation
//! sweep can hand them to the host's compiled-code invalidation hook. Both
//! suffixes match the sweep's `*.cache` glob.
//!
//! Writes go through a temp file and rename so readers never observe a
//! partial entry. No locking is layered on top of the filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

use super::{Backend, BackendKind};

/// Suffix for plain file entries.
pub const FILE_SUFFIX: &str = ".cache";

/// Suffix for compiled-file entries.
pub const COMPILED_SUFFIX: &str = ".compiled.cache";

/// On-disk entry document.
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    /// When the entry was written
    created_at: DateTime<Utc>,

    /// When the entry stops being servable
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,

    /// Base64 of the stored bytes
    value: String,
}

impl FileEntry {
    fn new(value: &[u8], ttl: Option<Duration>) -> Self {
        let created_at = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| created_at + ttl);
        Self {
            created_at,
            expires_at,
            value: BASE64.encode(value),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// Filesystem-backed cache storage.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    kind: BackendKind,
    suffix: &'static str,
}

impl FileBackend {
    /// Open a plain `file` backend rooted at `dir`, creating the directory
    /// if necessary.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open_kind(dir, BackendKind::File, FILE_SUFFIX)
    }

    /// Open a `compiled-file` backend rooted at `dir`.
    pub fn open_compiled(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open_kind(dir, BackendKind::CompiledFile, COMPILED_SUFFIX)
    }

    fn open_kind(
        dir: impl Into<PathBuf>,
        kind: BackendKind,
        suffix: &'static str,
    ) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::new(kind, e))?;
        Ok(Self { dir, kind, suffix })
    }

    /// Directory this backend stores entries under.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}{}", hex::encode(digest), self.suffix))
    }

    fn io_err(&self, e: io::Error) -> StorageError {
        StorageError::new(self.kind, e)
    }
}

impl Backend for FileBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        let entry: FileEntry = serde_json::from_str(&content).map_err(|e| {
            StorageError::invalid_data(self.kind, format!("corrupt cache entry: {}", e))
        })?;

        if entry.is_expired() {
            // Expired entries are reaped on read; removal failure is not a
            // reason to fail the lookup.
            let _ = fs::remove_file(&path);
            return Ok(None);
        }

        let value = BASE64.decode(&entry.value).map_err(|e| {
            StorageError::invalid_data(self.kind, format!("corrupt cache payload: {}", e))
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
        let entry = FileEntry::new(value, ttl);
        let json = serde_json::to_string(&entry).map_err(|e| {
            StorageError::invalid_data(self.kind, format!("unserializable entry: {}", e))
        })?;

        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &path).map_err(|e| self.io_err(e))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| self.io_err(e))?;
        for entry in entries {
            let entry = entry.map_err(|e| self.io_err(e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // `.compiled.cache` also ends with `.cache`; a plain file
            // backend must not clear a compiled sibling's entries.
            let foreign = self.kind == BackendKind::File && name.ends_with(COMPILED_SUFFIX);
            if name.ends_with(self.suffix) && !foreign {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(self.io_err(e)),
                }
            }
        }
        Ok(())
    }
}
