//! Per-subscription delivery gate.
//!
//! A callback only starts while holding the read side of the gate and after
//! seeing the gate open. Closing is two steps: `mark_closed` flips the flag,
//! after which no callback can start, and `wait_idle` takes the write side,
//! which waits out any callback that already passed the check. The first
//! never blocks, so it can run under a registry lock.
//!
//! A thread that is itself running a callback never waits in `wait_idle`:
//! it could be waiting on a gate whose holder is waiting on it. The flag
//! alone still stops every later start.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

thread_local! {
    static DELIVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether the current thread is inside a callback.
pub(crate) fn in_delivery() -> bool {
    DELIVERY_DEPTH.with(|depth| depth.get() > 0)
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_add(1)));
        Self
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeliveryGate {
    closed: AtomicBool,
    in_flight: RwLock<()>,
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Run `f` if the gate is open. Returns `None` when closed.
    pub(crate) fn enter<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _held = self
            .in_flight
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let _depth = DepthGuard::enter();
        Some(f())
    }

    /// Stop every later start without waiting. Returns `true` for the call
    /// that closed the gate.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Wait until no callback that passed the check is still running.
    pub(crate) fn wait_idle(&self) {
        if !in_delivery() {
            drop(
                self.in_flight
                    .write()
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
    }

}
