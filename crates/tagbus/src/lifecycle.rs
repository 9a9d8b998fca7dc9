//! Tying subscriber lifetimes to host scopes.
//!
//! The bus never observes host lifecycles. A host that has a notion of
//! scope (a screen, a session, a request) implements [`LifecycleScope`] and
//! runs the hook it is handed when the scope ends; the hook unregisters the
//! bound subscriber. [`SubscriberGuard`] covers the plain RAII case.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::envelope::Tag;
use crate::error::BusResult;
use crate::event_type::EventType;
use crate::id::SubscriberId;
use crate::registry::Subscription;
use crate::scheduler::Scheduler;

/// Callback a scope must run once when it ends.
pub type ScopeEndHook = Box<dyn FnOnce() + Send + 'static>;

/// A host scope that can notify the bus when it ends.
pub trait LifecycleScope {
    /// Keep `hook` and run it when the scope ends.
    ///
    /// Running it after the bus is gone is harmless.
    fn on_scope_end(&self, hook: ScopeEndHook);
}

/// A subscriber identity that unregisters itself on drop.
///
/// ```rust,no_run
/// use tagbus::{EventBus, EventType};
///
/// let bus = EventBus::new().unwrap();
/// let guard = bus.guard();
/// guard
///     .subscribe(1, EventType::<String>::exact(), |s| println!("{s}"))
///     .unwrap();
/// drop(guard); // every subscription made through it is cancelled
/// ```
#[derive(Debug)]
pub struct SubscriberGuard {
    bus: EventBus,
    id: SubscriberId,
}

impl SubscriberGuard {
    /// Guard `id` on `bus`.
    #[must_use]
    pub fn new(bus: EventBus, id: SubscriberId) -> Self {
        Self { bus, id }
    }

    /// The guarded identity.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// [`EventBus::subscribe`] as this subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`](crate::BusError::Closed) after the bus
    /// was shut down.
    pub fn subscribe<T, F>(
        &self,
        tag: Tag,
        event_type: EventType<T>,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.bus.subscribe(self.id, tag, event_type, callback)
    }

    /// [`EventBus::subscribe_on`] as this subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`](crate::BusError::Closed) after the bus
    /// was shut down.
    pub fn subscribe_on<T, F>(
        &self,
        tag: Tag,
        event_type: EventType<T>,
        scheduler: Scheduler,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.bus
            .subscribe_on(self.id, tag, event_type, scheduler, callback)
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.bus.unregister(self.id);
    }
}
