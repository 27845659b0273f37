//! Process-terminate lifecycle plumbing
//!
//! Hosts register hooks with an ordering priority: higher priorities run
//! earlier, so a very negative priority (the invalidation sweep uses -512)
//! runs after ordinary shutdown work. `fire` runs the registered hooks
//! exactly once for the process; later calls are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Registry of prioritized terminate hooks.
#[derive(Default)]
pub struct ShutdownHooks {
    entries: Mutex<Vec<(i32, Hook)>>,
    fired: AtomicBool,
}

impl ShutdownHooks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook at the given priority. Higher priorities run
    /// earlier; ties run in registration order.
    pub fn on_terminate(&self, priority: i32, hook: impl Fn() + Send + Sync + 'static) {
        self.entries.lock().push((priority, Box::new(hook)));
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `fire` has already run.
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Run every registered hook in priority order, once per process.
    pub fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut entries = std::mem::take(&mut *self.entries.lock());
        // Stable sort keeps registration order within a priority.
        entries.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));

        debug!(hooks = entries.len(), "firing terminate hooks");
        for (_, hook) in entries {
            hook();
        }
    }

    /// Wire SIGINT/SIGTERM to `fire`.
    ///
    /// Must be called at most once per process; `ctrlc` rejects a second
    /// handler.
    pub fn install_signal_handler(self: &Arc<Self>) -> Result<(), ctrlc::Error> {
        let hooks = Arc::clone(self);
        ctrlc::set_handler(move || {
            hooks.fire();
        })
    }
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("entries", &self.len())
            .field("fired", &self.fired())
            .finish()
    }
}
