//! Coordinated invalidation
//!
//! At process terminate (or on demand), the coordinator flushes every
//! registered cache, removes matching files from the cache directory, and
//! optionally empties the top level of the temp directory. The whole sweep
//! is best-effort: a failed flush or deletion is recorded in the report and
//! the sweep moves on to the next unit, never aborting mid-pass.
//!
//! When the host exposes a compiled-code invalidation hook, the coordinator
//! invokes it for every file it removes so stale pre-parsed representations
//! are recomputed. Hook failures are the host's concern; the hook signature
//! has no error channel.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::lifecycle::ShutdownHooks;
use crate::pool::CachePool;

/// Default glob for cache-directory files.
pub const DEFAULT_PATTERN: &str = "*.cache";

/// Terminate priority of the sweep; very late, after ordinary hooks.
pub const TERMINATE_PRIORITY: i32 = -512;

/// Independent sweep toggles. The default is the "empty options" case:
/// flush caches, leave the temp directory alone. Fields missing from a
/// config document take their defaults, so an empty document means
/// cache-on as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearOptions {
    /// Flush caches and remove matching cache-directory files
    pub cache: bool,

    /// Delete depth-0, non-dot-file entries of the temp directory
    pub temp: bool,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            cache: true,
            temp: false,
        }
    }
}

impl ClearOptions {
    /// Flush caches only.
    pub fn cache_only() -> Self {
        Self {
            cache: true,
            temp: false,
        }
    }

    /// Empty the temp directory only.
    pub fn temp_only() -> Self {
        Self {
            cache: false,
            temp: true,
        }
    }

    /// Both branches.
    pub fn all() -> Self {
        Self {
            cache: true,
            temp: true,
        }
    }
}

/// Outcome of one sweep. Failures here are diagnostics, not errors: the
/// sweep already moved past them.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Caches flushed
    pub flushed: usize,
    /// Files removed from the cache and temp directories
    pub removed: usize,
    /// Entries skipped (directories, dot files)
    pub skipped: usize,
    /// Non-fatal failures encountered along the way
    pub errors: Vec<String>,
}

impl SweepReport {
    fn record(&mut self, detail: String) {
        warn!("{detail}");
        self.errors.push(detail);
    }
}

/// Best-effort compiled-code invalidation callback.
pub type CodeCacheHook = Box<dyn Fn(&Path) + Send + Sync>;

/// Flushes caches and purges cache/temp directories at terminate.
pub struct InvalidationCoordinator {
    pool: Arc<CachePool>,
    cache_dir: PathBuf,
    temp_dir: PathBuf,
    pattern: GlobMatcher,
    code_cache: Option<CodeCacheHook>,
    registered: AtomicBool,
}

impl InvalidationCoordinator {
    /// Create a coordinator over a pool and its directories, matching
    /// cache-directory files against the default `*.cache` glob.
    pub fn new(
        pool: Arc<CachePool>,
        cache_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        let pattern = Glob::new(DEFAULT_PATTERN)
            .expect("default pattern is a valid glob")
            .compile_matcher();
        Self {
            pool,
            cache_dir: cache_dir.into(),
            temp_dir: temp_dir.into(),
            pattern,
            code_cache: None,
            registered: AtomicBool::new(false),
        }
    }

    /// Replace the cache-directory file glob.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.pattern = Glob::new(pattern)?.compile_matcher();
        Ok(self)
    }

    /// Attach the host's compiled-code invalidation hook.
    pub fn with_code_cache_hook(
        mut self,
        hook: impl Fn(&Path) + Send + Sync + 'static,
    ) -> Self {
        self.code_cache = Some(Box::new(hook));
        self
    }

    /// Subscribe the sweep to the terminate signal at [`TERMINATE_PRIORITY`].
    ///
    /// Idempotent: only the first call registers; repeats are no-ops.
    pub fn register(self: &Arc<Self>, hooks: &ShutdownHooks, options: ClearOptions) {
        if self.registered.swap(true, Ordering::SeqCst) {
            return;
        }
        let coordinator = Arc::clone(self);
        hooks.on_terminate(TERMINATE_PRIORITY, move || {
            coordinator.sweep(options);
        });
    }

    /// Run the sweep now. Both branches are independent and may both run.
    pub fn sweep(&self, options: ClearOptions) -> SweepReport {
        let mut report = SweepReport::default();

        if options.cache {
            self.sweep_caches(&mut report);
        }
        if options.temp {
            self.sweep_temp(&mut report);
        }

        debug!(
            flushed = report.flushed,
            removed = report.removed,
            skipped = report.skipped,
            failures = report.errors.len(),
            "invalidation sweep finished"
        );
        report
    }

    /// Flush every registered cache, then remove matching cache-dir files.
    fn sweep_caches(&self, report: &mut SweepReport) {
        for cache in self.pool.instances() {
            match cache.flush() {
                Ok(()) => report.flushed += 1,
                Err(e) => report.record(format!("flush of cache `{}` failed: {e}", cache.name())),
            }
        }

        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                report.record(format!(
                    "cannot list cache dir {}: {e}",
                    self.cache_dir.display()
                ));
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.record(format!("cache dir entry unreadable: {e}"));
                    continue;
                }
            };
            if !self.pattern.is_match(entry.file_name()) {
                report.skipped += 1;
                continue;
            }
            // Attempt removal on anything matching; a directory or
            // otherwise undeletable entry becomes a recorded failure and
            // the sweep moves on.
            self.remove_file(&entry.path(), report);
        }
    }

    /// Delete depth-0, non-dot-file entries of the temp directory. Nested
    /// entries and directories survive.
    fn sweep_temp(&self, report: &mut SweepReport) {
        if !self.temp_dir.exists() {
            return;
        }

        let walker = WalkDir::new(&self.temp_dir).min_depth(1).max_depth(1);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.record(format!("temp dir entry unreadable: {e}"));
                    continue;
                }
            };
            let hidden = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'));
            if hidden || entry.file_type().is_dir() {
                report.skipped += 1;
                continue;
            }
            self.remove_file(entry.path(), report);
        }
    }

    fn remove_file(&self, path: &Path, report: &mut SweepReport) {
        match fs::remove_file(path) {
            Ok(()) => {
                report.removed += 1;
                if let Some(hook) = &self.code_cache {
                    hook(path);
                }
            }
            Err(e) => report.record(format!("cannot remove {}: {e}", path.display())),
        }
    }
}

impl std::fmt::Debug for InvalidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationCoordinator")
            .field("cache_dir", &self.cache_dir)
            .field("temp_dir", &self.temp_dir)
            .field("registered", &self.registered.load(Ordering::SeqCst))
            .finish()
    }
}
