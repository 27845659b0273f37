//! cachelane - pluggable cache core
//!
//! A cache abstraction with backend negotiation, namespacing, and
//! coordinated invalidation:
//!
//! - [`backend`]: the storage contract and its concrete kinds (memory,
//!   file, compiled-file, shared-memory)
//! - [`capabilities`]: which kinds this process can use, probed once and
//!   passed down
//! - [`select`]: deterministic resolution of a spec's storage choice
//! - [`pool`]: lazy, construct-once-per-name cache instances
//! - [`sweep`]: best-effort flush/purge bound to the terminate signal
//! - [`render`]: the template-renderer collaborator seam

pub mod backend;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod render;
pub mod select;
pub mod sweep;

pub use backend::{Backend, BackendKind, StorageChoice};
pub use capabilities::{HostExtension, ProbePolicy, RuntimeCapabilities};
pub use config::{CacheSettings, CacheSpec};
pub use error::{CacheError, ConfigError, StorageError};
pub use lifecycle::ShutdownHooks;
pub use pool::{Cache, CachePool, PoolStats};
pub use render::{CachedRenderer, RenderError, Renderer};
pub use select::select;
pub use sweep::{ClearOptions, InvalidationCoordinator, SweepReport};
