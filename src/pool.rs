//! Cache facade and pool
//!
//! [`Cache`] wraps one selected backend with a fixed namespace prefix and
//! exposes the stable cache API. [`CachePool`] hands out caches by name:
//! construction is lazy, happens exactly once per name for the lifetime of
//! the process, and is guarded by a mutex so concurrent first access never
//! builds two backends for the same name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{
    Backend, BackendKind, FileBackend, MemoryBackend, SharedMemoryBackend,
};
use crate::capabilities::RuntimeCapabilities;
use crate::config::CacheSpec;
use crate::error::{CacheError, ConfigError, StorageError};
use crate::select::select;

/// A named cache: a selected backend plus its namespace prefix.
///
/// The prefix is prepended to every key before it reaches physical storage
/// and cannot change after construction. On storage shared between caches
/// (the shared-memory segment), the prefix is the only isolation between
/// namespaces; `flush` still clears the whole physical store, matching the
/// underlying medium's semantics.
pub struct Cache {
    name: String,
    kind: BackendKind,
    prefix: Option<String>,
    backend: Box<dyn Backend>,
}

impl Cache {
    /// Cache name (the pool's memoization key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete kind selected for this cache.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Namespace prefix, if configured.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn namespaced(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        }
    }

    /// Look up an entry. A missing key is `Ok(None)`.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.backend.get(&self.namespaced(key))
    }

    /// Store an entry without a lifetime bound.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.backend.set(&self.namespaced(key), value, None)
    }

    /// Store an entry that expires after `ttl`.
    pub fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StorageError> {
        self.backend.set(&self.namespaced(key), value, Some(ttl))
    }

    /// Remove an entry. Removing a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.backend.delete(&self.namespaced(key))
    }

    /// Empty this cache's backing store.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.backend.clear()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Pool construction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of live cache instances
    pub instances: usize,
    /// Number of backend constructions performed; equals `instances` when
    /// the construct-once guarantee holds
    pub constructions: usize,
}

/// Factory and registry of named caches.
pub struct CachePool {
    caps: RuntimeCapabilities,
    no_cache: bool,
    caches: Mutex<HashMap<String, Arc<Cache>>>,
    constructions: Mutex<usize>,
}

impl CachePool {
    /// Create a pool over the process's capabilities.
    ///
    /// `no_cache` is the global override: when set, every cache resolves to
    /// the `memory` kind regardless of its spec.
    pub fn new(caps: RuntimeCapabilities, no_cache: bool) -> Self {
        Self {
            caps,
            no_cache,
            caches: Mutex::new(HashMap::new()),
            constructions: Mutex::new(0),
        }
    }

    /// The capabilities this pool selects against.
    pub fn capabilities(&self) -> &RuntimeCapabilities {
        &self.caps
    }

    /// Get the cache for `spec.name`, constructing it on first request.
    ///
    /// Idempotent per name for the process lifetime: later calls return the
    /// identical instance even if the spec contents differ. The memoization
    /// lock is held across construction, so concurrent first access yields
    /// exactly one backend.
    pub fn get_or_create(&self, spec: &CacheSpec) -> Result<Arc<Cache>, CacheError> {
        let mut caches = self.caches.lock();
        if let Some(cache) = caches.get(&spec.name) {
            return Ok(Arc::clone(cache));
        }

        let cache = Arc::new(self.construct(spec)?);
        *self.constructions.lock() += 1;
        debug!(name = %spec.name, kind = %cache.kind(), "constructed cache");
        caches.insert(spec.name.clone(), Arc::clone(&cache));
        Ok(cache)
    }

    fn construct(&self, spec: &CacheSpec) -> Result<Cache, CacheError> {
        let kind = select(spec, &self.caps, self.no_cache);

        let backend: Box<dyn Backend> = match kind {
            BackendKind::Memory => Box::new(MemoryBackend::new()),
            BackendKind::SharedMemory => Box::new(SharedMemoryBackend::attach()),
            BackendKind::File | BackendKind::CompiledFile => {
                let path = spec.path.as_ref().ok_or_else(|| ConfigError::StorageMissing {
                    name: spec.name.clone(),
                    kind,
                })?;
                if kind == BackendKind::File {
                    Box::new(FileBackend::open(path)?)
                } else {
                    Box::new(FileBackend::open_compiled(path)?)
                }
            }
        };

        Ok(Cache {
            name: spec.name.clone(),
            kind,
            prefix: spec.prefix.clone(),
            backend,
        })
    }

    /// Snapshot of every constructed cache, for the invalidation sweep.
    pub fn instances(&self) -> Vec<Arc<Cache>> {
        self.caches.lock().values().cloned().collect()
    }

    /// Construction counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            instances: self.caches.lock().len(),
            constructions: *self.constructions.lock(),
        }
    }
}

impl std::fmt::Debug for CachePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePool")
            .field("no_cache", &self.no_cache)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StorageChoice;
    use tempfile::TempDir;

    fn memory_pool() -> CachePool {
        CachePool::new(
            RuntimeCapabilities::from_kinds(vec![BackendKind::Memory]),
            false,
        )
    }

    #[test]
    fn prefix_isolates_caches_on_shared_storage() {
        let caps = RuntimeCapabilities::from_kinds(vec![BackendKind::SharedMemory]);
        let pool = CachePool::new(caps, false);

        let a = pool
            .get_or_create(&CacheSpec::new("pool_a").prefix("pool_a_"))
            .unwrap();
        let b = pool
            .get_or_create(&CacheSpec::new("pool_b").prefix("pool_b_"))
            .unwrap();

        a.set("k", b"from-a").unwrap();
        assert_eq!(b.get("k").unwrap(), None);
        assert_eq!(a.get("k").unwrap(), Some(b"from-a".to_vec()));
        a.delete("k").unwrap();
    }

    #[test]
    fn same_name_returns_identical_instance() {
        let pool = memory_pool();
        let first = pool.get_or_create(&CacheSpec::new("page")).unwrap();
        // Different spec contents, same name: memoized instance wins.
        let second = pool
            .get_or_create(&CacheSpec::new("page").prefix("other_"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.stats().constructions, 1);
    }

    #[test]
    fn distinct_names_get_distinct_instances() {
        let pool = memory_pool();
        let a = pool.get_or_create(&CacheSpec::new("a")).unwrap();
        let b = pool.get_or_create(&CacheSpec::new("b")).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.stats().instances, 2);
    }

    #[test]
    fn file_kind_without_path_fails_at_construction() {
        let caps = RuntimeCapabilities::from_kinds(vec![BackendKind::Memory, BackendKind::File]);
        let pool = CachePool::new(caps, false);
        let spec = CacheSpec::new("pages").storage(StorageChoice::Kind(BackendKind::File));

        let err = pool.get_or_create(&spec).unwrap_err();
        assert!(matches!(
            err,
            CacheError::Config(ConfigError::StorageMissing { ref name, .. }) if name == "pages"
        ));
        assert_eq!(pool.stats().instances, 0);
    }

    #[test]
    fn auto_spec_without_path_is_fine_for_non_file_kinds() {
        // auto resolves to memory here, so no path is required
        let pool = memory_pool();
        let cache = pool.get_or_create(&CacheSpec::new("sessions")).unwrap();
        assert_eq!(cache.kind(), BackendKind::Memory);
    }

    #[test]
    fn no_cache_pool_never_builds_file_backends() {
        let dir = TempDir::new().unwrap();
        let caps = RuntimeCapabilities::from_kinds(vec![BackendKind::Memory, BackendKind::File]);
        let pool = CachePool::new(caps, true);

        let cache = pool
            .get_or_create(
                &CacheSpec::new("pages")
                    .storage(StorageChoice::Kind(BackendKind::File))
                    .path(dir.path()),
            )
            .unwrap();
        assert_eq!(cache.kind(), BackendKind::Memory);

        cache.set("k", b"v").unwrap();
        // Nothing reached the directory.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn namespaced_keys_reach_physical_storage_with_prefix() {
        let dir = TempDir::new().unwrap();
        let caps = RuntimeCapabilities::from_kinds(vec![BackendKind::File]);
        let pool = CachePool::new(caps, false);

        let plain = pool
            .get_or_create(&CacheSpec::new("plain").path(dir.path()))
            .unwrap();
        let prefixed = pool
            .get_or_create(&CacheSpec::new("prefixed").path(dir.path()).prefix("p_"))
            .unwrap();

        plain.set("x", b"1").unwrap();
        prefixed.set("x", b"2").unwrap();

        // Same directory, two distinct entry files: the prefix changed the key.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
        assert_eq!(plain.get("x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(prefixed.get("x").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn concurrent_first_access_constructs_once() {
        use std::thread;

        let pool = Arc::new(memory_pool());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                pool.get_or_create(&CacheSpec::new("contended")).unwrap()
            }));
        }

        let caches: Vec<Arc<Cache>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for cache in &caches[1..] {
            assert!(Arc::ptr_eq(&caches[0], cache));
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                instances: 1,
                constructions: 1
            }
        );
    }
}
