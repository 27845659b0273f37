//! Shared-memory backend
//!
//! Stands in for a host shared-memory extension: every handle created with
//! [`SharedMemoryBackend::attach`] sees the same process-wide segment, so
//! distinct named caches share physical storage and rely on their namespace
//! prefix for isolation. As with the real extension, `clear()` flushes the
//! whole segment, not just one namespace.
//!
//! The registry only advertises this kind when the host reports the gating
//! extension at a sufficient version (see [`crate::capabilities`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::StorageError;

use super::{Backend, BackendKind};

#[derive(Debug, Clone)]
struct ShmEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl ShmEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type Segment = RwLock<HashMap<String, ShmEntry>>;

static PROCESS_SEGMENT: Lazy<Arc<Segment>> = Lazy::new(Arc::default);

/// Handle onto a shared keyed segment.
#[derive(Debug, Clone)]
pub struct SharedMemoryBackend {
    segment: Arc<Segment>,
}

impl SharedMemoryBackend {
    /// Attach to the process-wide segment shared by all attached handles.
    pub fn attach() -> Self {
        Self {
            segment: Arc::clone(&PROCESS_SEGMENT),
        }
    }

    /// Create a handle onto its own private segment. Useful when callers
    /// need isolation from the process-wide segment, e.g. in tests.
    pub fn with_private_segment() -> Self {
        Self {
            segment: Arc::default(),
        }
    }

    /// Number of live (non-expired) entries in the segment.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.segment
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether the segment holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Backend for SharedMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SharedMemory
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Instant::now();
        {
            let segment = self.segment.read();
            match segment.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: reap under the write lock.
        self.segment.write().remove(key);
        Ok(None)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StorageError> {
        let entry = ShmEntry {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.segment.write().insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.segment.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.segment.write().clear();
        Ok(())
    }
}
