//! Error taxonomy for the cache core
//!
//! Two failure families exist:
//! - [`ConfigError`]: a misconfigured cache spec. Fatal at setup, surfaced to
//!   the caller configuring the cache, raised eagerly at spec validation or
//!   first construction.
//! - [`StorageError`]: an I/O failure from a concrete backend, propagated to
//!   the cache caller. A miss on `get` is never an error.
//!
//! Best-effort cleanup failures during the invalidation sweep belong to
//! neither family; they are collected into the sweep report and never
//! propagated (see [`crate::sweep`]).

use std::io;

use crate::backend::BackendKind;

/// A misconfigured cache spec.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured storage string names no known backend kind.
    #[error("unknown cache storage `{0}`")]
    UnknownStorage(String),

    /// A file-based kind was selected but the spec carries no path.
    #[error("cache storage missing: `{kind}` backend for cache `{name}` requires a path")]
    StorageMissing {
        /// Name of the cache whose spec is incomplete
        name: String,
        /// The file-based kind that was selected
        kind: BackendKind,
    },

    /// The sweep file pattern is not a valid glob.
    #[error("invalid cache sweep pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    /// The settings document could not be parsed.
    #[error("invalid cache settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings document could not be read.
    #[error("cannot read cache settings from {}: {source}", path.display())]
    Read {
        /// Path of the unreadable document
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// An I/O failure from a concrete backend.
///
/// Serialization faults inside an entry surface as
/// [`io::ErrorKind::InvalidData`].
#[derive(Debug, thiserror::Error)]
#[error("{kind} cache backend failure: {source}")]
pub struct StorageError {
    /// Kind of the backend that failed
    pub kind: BackendKind,
    /// Underlying I/O error
    #[source]
    pub source: io::Error,
}

impl StorageError {
    /// Wrap an I/O error with the failing backend kind.
    pub fn new(kind: BackendKind, source: io::Error) -> Self {
        Self { kind, source }
    }

    /// Wrap a non-I/O fault (e.g. a corrupt entry) as invalid data.
    pub fn invalid_data(kind: BackendKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            source: io::Error::new(io::ErrorKind::InvalidData, detail.into()),
        }
    }
}

/// Umbrella error for operations that can fail either way, such as
/// [`crate::pool::CachePool::get_or_create`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
