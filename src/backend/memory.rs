//! Process-memory backend
//!
//! The guaranteed-available fallback: a map living in process memory,
//! cleared on process exit. Operations never fail.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::StorageError;

use super::{Backend, BackendKind};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process map backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether the backend holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_before_any_set() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("x").unwrap(), None);
    }

    #[test]
    fn set_get_delete() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v", None).unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"v".to_vec()));

        backend.delete("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let backend = MemoryBackend::new();
        backend.delete("missing").unwrap();
    }

    #[test]
    fn clear_empties_the_store() {
        let backend = MemoryBackend::new();
        backend.set("a", b"1", None).unwrap();
        backend.set("b", b"2", None).unwrap();
        assert_eq!(backend.len(), 2);

        backend.clear().unwrap();
        assert!(backend.is_empty());
        assert_eq!(backend.get("a").unwrap(), None);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let backend = MemoryBackend::new();
        backend
            .set("k", b"v", Some(Duration::from_nanos(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_value() {
        let backend = MemoryBackend::new();
        backend.set("k", b"old", None).unwrap();
        backend.set("k", b"new", None).unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"new".to_vec()));
    }
}
