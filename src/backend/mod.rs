//! Cache storage backends
//!
//! A backend is a capability-tagged storage unit implementing the cache
//! contract: get / set / delete / clear. Keys arrive already namespaced by
//! the owning [`crate::pool::Cache`]; backends never see the prefix as a
//! separate concept.
//!
//! Concrete kinds:
//! - `memory`: process-memory map, cleared on process exit, never fails
//! - `file`: on-disk entries under a configured directory
//! - `compiled-file`: file kind whose entries participate in the secondary
//!   compiled-code invalidation step of the sweep
//! - `shared-memory`: process-wide shared segment, gated by a host extension

mod file;
mod memory;
mod shm;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use shm::SharedMemoryBackend;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StorageError};

/// A concrete storage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Process-memory map
    Memory,
    /// Plain on-disk entries
    File,
    /// On-disk entries subject to compiled-code invalidation
    CompiledFile,
    /// Shared keyed segment provided by a host extension
    SharedMemory,
}

impl BackendKind {
    /// Returns the configuration string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::CompiledFile => "compiled-file",
            BackendKind::SharedMemory => "shared-memory",
        }
    }

    /// Parse a configuration string into a kind.
    ///
    /// An unrecognized string is a [`ConfigError::UnknownStorage`]; this is
    /// where misconfigured storage values fail, eagerly, before any
    /// selection or construction happens.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "compiled-file" => Ok(BackendKind::CompiledFile),
            "shared-memory" => Ok(BackendKind::SharedMemory),
            other => Err(ConfigError::UnknownStorage(other.to_string())),
        }
    }

    /// Whether this kind stores entries on disk and therefore requires a
    /// configured path.
    pub fn is_file_based(&self) -> bool {
        matches!(self, BackendKind::File | BackendKind::CompiledFile)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The configured storage choice of a cache spec: either a concrete kind or
/// `auto`, to be resolved against runtime capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageChoice {
    /// Resolve to the best available kind at selection time
    #[default]
    Auto,
    /// An explicitly configured kind
    Kind(BackendKind),
}

impl StorageChoice {
    /// Parse a configuration string (`"auto"` or a kind name).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        if s == "auto" {
            Ok(StorageChoice::Auto)
        } else {
            BackendKind::parse(s).map(StorageChoice::Kind)
        }
    }

    /// Returns the configuration string for this choice.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageChoice::Auto => "auto",
            StorageChoice::Kind(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for StorageChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for StorageChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StorageChoice::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for StorageChoice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// The cache storage contract.
///
/// A miss on `get` is `Ok(None)`, never an error; errors are reserved for
/// actual storage failures. `ttl` bounds an entry's lifetime; `None` means
/// the entry lives until deleted, cleared, or evicted by the medium.
pub trait Backend: Send + Sync {
    /// The kind tag of this backend.
    fn kind(&self) -> BackendKind;

    /// Look up an entry. Expired entries are treated as missing.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store an entry, replacing any previous value for the key.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError>;

    /// Remove an entry. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every entry in this backend's physical store.
    fn clear(&self) -> Result<(), StorageError>;
}
