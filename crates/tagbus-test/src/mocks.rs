//! Mock host integrations.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tagbus::{Executor, Job, LifecycleScope, ScopeEndHook};

/// A host scope that ends when the test says so.
#[derive(Default)]
pub struct MockScope {
    hooks: Mutex<Vec<ScopeEndHook>>,
    ended: AtomicBool,
}

impl MockScope {
    /// Create a live scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// End the scope, running every registered hook once.
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
        let hooks = std::mem::take(
            &mut *self
                .hooks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for hook in hooks {
            hook();
        }
    }

    /// Whether [`end`](Self::end) was called.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Hooks waiting for the scope to end.
    #[must_use]
    pub fn pending_hooks(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for MockScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScope")
            .field("pending_hooks", &self.pending_hooks())
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl LifecycleScope for MockScope {
    fn on_scope_end(&self, hook: ScopeEndHook) {
        if self.is_ended() {
            // The scope is already gone: end it for the newcomer right away.
            hook();
            return;
        }
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }
}

/// Host executor that runs each job on the calling thread and counts them.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    executed: Arc<AtomicUsize>,
}

impl MockExecutor {
    /// Create an executor with a zero count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs executed so far, across clones.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl Executor for MockExecutor {
    fn execute(&self, job: Job) {
        self.executed.fetch_add(1, Ordering::SeqCst);
        job();
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock-executor"
    }
}
