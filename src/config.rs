//! Cache configuration
//!
//! [`CacheSpec`] is the per-cache declaration (storage choice, optional
//! path, optional namespace prefix). [`CacheSettings`] is the document the
//! host feeds in: a name → spec mapping plus the global `nocache` flag and
//! the cache/temp directories the invalidation sweep operates on.
//!
//! Unknown storage strings fail deserialization immediately; a missing path
//! for a file-based kind fails later, at construction, once selection has
//! settled on the kind (an `auto` spec without a path is valid as long as
//! `auto` resolves to a non-file kind).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::StorageChoice;
use crate::error::ConfigError;

/// Declaration of one named cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Unique cache name; the memoization key
    #[serde(skip)]
    pub name: String,

    /// Desired storage kind, `auto` by default
    #[serde(default)]
    pub storage: StorageChoice,

    /// Directory for file-based kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Namespace prefix prepended to every key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl CacheSpec {
    /// Create a spec with `auto` storage and no path or prefix.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: StorageChoice::Auto,
            path: None,
            prefix: None,
        }
    }

    /// Set the storage choice.
    pub fn storage(mut self, storage: StorageChoice) -> Self {
        self.storage = storage;
        self
    }

    /// Set the directory for file-based kinds.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the namespace prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Host-provided cache settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Global no-cache override: every cache resolves to `memory`
    #[serde(default)]
    pub nocache: bool,

    /// Directory holding `*.cache` files, swept on invalidation
    pub cache_dir: PathBuf,

    /// Directory holding ephemeral top-level entries, swept on demand
    pub temp_dir: PathBuf,

    /// Named cache declarations
    #[serde(default)]
    pub caches: BTreeMap<String, CacheSpec>,
}

impl CacheSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut settings: CacheSettings = toml::from_str(content)?;
        for (name, spec) in settings.caches.iter_mut() {
            spec.name = name.clone();
        }
        Ok(settings)
    }

    /// Parse settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// The declared specs, with names filled from the map keys.
    pub fn specs(&self) -> impl Iterator<Item = &CacheSpec> {
        self.caches.values()
    }

    /// Look up one declared spec by name.
    pub fn spec(&self, name: &str) -> Option<&CacheSpec> {
        self.caches.get(name)
    }
}
