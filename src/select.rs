//! Backend selection
//!
//! Resolves a cache spec's storage choice to a concrete kind. Pure and
//! deterministic: the same (spec, capabilities, no-cache flag) inputs always
//! yield the same kind, and re-selection never happens after a cache is
//! constructed.

use crate::backend::{BackendKind, StorageChoice};
use crate::capabilities::RuntimeCapabilities;
use crate::config::CacheSpec;

/// Pick the concrete backend kind for a spec.
///
/// Priority order, first match wins:
/// 1. `global_no_cache` forces `memory`, overriding everything including an
///    explicitly configured kind, so dev/test runs never touch persistent
///    storage.
/// 2. `auto`, or an explicit kind the runtime does not support, resolves to
///    the highest-priority available kind (last of the ordered list).
/// 3. An explicit, supported kind passes through unchanged.
pub fn select(
    spec: &CacheSpec,
    caps: &RuntimeCapabilities,
    global_no_cache: bool,
) -> BackendKind {
    if global_no_cache {
        return BackendKind::Memory;
    }

    match spec.storage {
        StorageChoice::Auto => caps.best(),
        StorageChoice::Kind(kind) if !caps.is_supported(kind) => caps.best(),
        StorageChoice::Kind(kind) => kind,
    }
}
