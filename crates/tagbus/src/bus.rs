//! The event bus facade.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tagbus_config::{BusConfig, Config, DeliveryContext};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::envelope::{Envelope, Payload, TAG_DEFAULT, Tag};
use crate::error::{BusError, BusResult};
use crate::event_type::EventType;
use crate::id::SubscriberId;
use crate::lifecycle::{LifecycleScope, SubscriberGuard};
use crate::pipeline::Pipeline;
use crate::registry::{Subscription, SubscriptionHandle, SubscriptionRegistry};
use crate::scheduler::{Executor, MainContext, Scheduler};
use crate::stats::{BusStats, StatsCounters};

/// Tagged publish/subscribe event bus.
///
/// Producers [`post`](Self::post) values under a [`Tag`]; every live
/// subscription whose tag matches and whose [`EventType`] narrows the
/// payload receives it, in post order, on its [`Scheduler`]. Subscriptions
/// are grouped by [`SubscriberId`] and torn down together with
/// [`unregister`](Self::unregister).
///
/// Cloning is cheap and every clone drives the same bus. Dropping the last
/// clone cancels every subscription.
///
/// **WARNING:** a callback that captures a clone of its own bus keeps the
/// bus alive until that subscription is unregistered. Capture a
/// [`WeakEventBus`] when the subscription is meant to die with the bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Non-owning handle to an [`EventBus`].
#[derive(Clone)]
pub struct WeakEventBus {
    inner: Weak<BusInner>,
}

impl WeakEventBus {
    /// The bus, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

impl fmt::Debug for WeakEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventBus")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

struct BusInner {
    sender: broadcast::Sender<Envelope>,
    registry: SubscriptionRegistry,
    main: MainContext,
    owns_main: bool,
    dispatch: Handle,
    _runtime: Option<OwnedRuntime>,
    default_scheduler: DeliveryContext,
    stats: Arc<StatsCounters>,
    /// Held for reading across the check and the registry insert in
    /// `subscribe_on`, so shutdown never misses a subscription.
    closed: RwLock<bool>,
    capacity: usize,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        let cancelled = self.registry.cancel_everything();
        if self.owns_main {
            self.main.close();
        }
        debug!(cancelled, "Event bus dropped");
    }
}

/// Dispatch runtime created by the bus itself.
///
/// The bus may be dropped from inside an async context, where dropping a
/// runtime would panic, so it is shut down in the background instead.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// Builder for [`EventBus`].
#[derive(Debug, Default)]
pub struct EventBusBuilder {
    config: BusConfig,
    runtime: Option<Handle>,
    main: Option<MainContext>,
}

impl EventBusBuilder {
    /// Use these settings instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Run pipelines on an existing runtime instead of starting a
    /// dedicated dispatch runtime.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Use a host-provided main context instead of spawning a main thread.
    ///
    /// The bus does not close a context it did not create.
    #[must_use]
    pub fn main_context(mut self, main: MainContext) -> Self {
        self.main = Some(main);
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] if the settings are invalid, or
    /// [`BusError::Runtime`] if the dispatch runtime or main thread cannot
    /// be started.
    pub fn build(self) -> BusResult<EventBus> {
        let config = self.config;
        tagbus_config::validate::validate_bus(&config)?;

        let (dispatch, owned_runtime) = match self.runtime {
            Some(handle) => (handle, None),
            None => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(config.dispatch_threads)
                    .thread_name(config.dispatch_thread_name.clone())
                    .enable_all()
                    .build()?;
                (runtime.handle().clone(), Some(OwnedRuntime(Some(runtime))))
            },
        };

        let (main, owns_main) = match self.main {
            Some(main) => (main, false),
            None => (MainContext::spawn(config.main_thread_name.clone())?, true),
        };

        let (sender, _) = broadcast::channel(config.channel_capacity);

        info!(
            capacity = config.channel_capacity,
            default_scheduler = %config.default_scheduler,
            main_context = %main.name(),
            dedicated_runtime = owned_runtime.is_some(),
            "Event bus started"
        );

        Ok(EventBus {
            inner: Arc::new(BusInner {
                sender,
                registry: SubscriptionRegistry::new(),
                main,
                owns_main,
                dispatch,
                _runtime: owned_runtime,
                default_scheduler: config.default_scheduler,
                stats: Arc::new(StatsCounters::default()),
                closed: RwLock::new(false),
                capacity: config.channel_capacity,
            }),
        })
    }
}

impl EventBus {
    /// Start a bus with default settings, its own dispatch runtime and
    /// main thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Runtime`] if a thread cannot be started.
    pub fn new() -> BusResult<Self> {
        Self::builder().build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Start a bus from a loaded configuration.
    ///
    /// # Errors
    ///
    /// See [`EventBusBuilder::build`].
    pub fn from_config(config: &Config) -> BusResult<Self> {
        Self::builder().config(config.bus.clone()).build()
    }

    /// A handle that does not keep the bus alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Post `event` under [`TAG_DEFAULT`].
    ///
    /// Returns the number of pipeline receivers the envelope was handed to,
    /// before tag or type filtering. A pipeline cancelled moments ago may
    /// still be counted until its task exits.
    pub fn post<T: Any + Send + Sync>(&self, event: T) -> usize {
        self.post_tagged(TAG_DEFAULT, event)
    }

    /// Post `event` under `tag`.
    ///
    /// Never waits on subscriber processing. With no matching subscription
    /// the event is dropped silently. Returns the receiver count, as
    /// [`post`](Self::post) does.
    pub fn post_tagged<T: Any + Send + Sync>(&self, tag: Tag, event: T) -> usize {
        self.publish(Envelope::new(tag, event))
    }

    /// Post an already type-erased payload.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidArgument`] if `payload` is `None`.
    pub fn post_erased(&self, tag: Tag, payload: Option<Payload>) -> BusResult<usize> {
        let payload = payload
            .ok_or_else(|| BusError::InvalidArgument("payload must not be absent".to_owned()))?;
        Ok(self.publish(Envelope::from_payload(tag, payload)))
    }

    fn publish(&self, envelope: Envelope) -> usize {
        self.inner.stats.record_posted();
        let tag = envelope.tag();

        if let Ok(count) = self.inner.sender.send(envelope) {
            trace!(tag, receiver_count = count, "Envelope posted");
            count
        } else {
            // No live subscription
            trace!(tag, "No receivers for envelope");
            0
        }
    }

    /// Subscribe on the configured default delivery context.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn subscribe<T, F>(
        &self,
        subscriber: SubscriberId,
        tag: Tag,
        event_type: EventType<T>,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let scheduler = Scheduler::from(self.inner.default_scheduler);
        self.subscribe_on(subscriber, tag, event_type, scheduler, callback)
    }

    /// Subscribe `subscriber` to envelopes posted under `tag` whose payload
    /// narrows through `event_type`, running `callback` on `scheduler`.
    ///
    /// Repeated calls for one subscriber accumulate; they are cancelled
    /// together by [`unregister`](Self::unregister). Envelopes posted
    /// before this call are never delivered to the new subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn subscribe_on<T, F>(
        &self,
        subscriber: SubscriberId,
        tag: Tag,
        event_type: EventType<T>,
        scheduler: Scheduler,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.register(subscriber, tag, event_type, scheduler, callback, None)
    }

    /// [`subscribe`](Self::subscribe), tying the subscriber group to
    /// `scope` when this call creates the group or the group is not bound
    /// yet. Ending the scope unregisters the subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn subscribe_scoped<T, F>(
        &self,
        subscriber: SubscriberId,
        scope: &dyn LifecycleScope,
        tag: Tag,
        event_type: EventType<T>,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let scheduler = Scheduler::from(self.inner.default_scheduler);
        self.subscribe_scoped_on(subscriber, scope, tag, event_type, scheduler, callback)
    }

    /// [`subscribe_on`](Self::subscribe_on) with the scope binding of
    /// [`subscribe_scoped`](Self::subscribe_scoped).
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn subscribe_scoped_on<T, F>(
        &self,
        subscriber: SubscriberId,
        scope: &dyn LifecycleScope,
        tag: Tag,
        event_type: EventType<T>,
        scheduler: Scheduler,
        callback: F,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.register(subscriber, tag, event_type, scheduler, callback, Some(scope))
    }

    fn register<T, F>(
        &self,
        subscriber: SubscriberId,
        tag: Tag,
        event_type: EventType<T>,
        scheduler: Scheduler,
        callback: F,
        scope: Option<&dyn LifecycleScope>,
    ) -> BusResult<Subscription>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let closed = self
            .inner
            .closed
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(BusError::Closed);
        }

        let handle = Arc::new(SubscriptionHandle::new(subscriber, tag, event_type.name()));
        let receiver = self.inner.sender.subscribe();
        let (runtime, hop) = self.resolve(scheduler);

        let placement = self
            .inner
            .registry
            .put(subscriber, Arc::clone(&handle), scope.is_some());
        let pipeline = Pipeline::new(
            Arc::clone(&handle),
            event_type,
            Arc::new(callback),
            hop,
            receiver,
            Arc::clone(&self.inner.stats),
        );
        runtime.spawn(pipeline.run());
        drop(closed);

        debug!(
            subscriber = %subscriber,
            subscription = %handle.id(),
            tag,
            new_group = placement.created,
            "Subscribed"
        );

        if let Some(scope) = scope {
            if placement.bind {
                self.attach_scope(subscriber, scope);
            } else {
                info!(
                    subscriber = %subscriber,
                    "Subscriber group already bound, scope not attached"
                );
            }
        }
        Ok(Subscription::new(handle))
    }

    /// Where the pipeline task runs, and the context its callbacks hop to.
    fn resolve(&self, scheduler: Scheduler) -> (Handle, Option<Arc<dyn Executor>>) {
        match scheduler {
            Scheduler::Main => {
                let main: Arc<dyn Executor> = Arc::new(self.inner.main.clone());
                (self.inner.dispatch.clone(), Some(main))
            },
            Scheduler::Inline => (self.inner.dispatch.clone(), None),
            Scheduler::Runtime(handle) => (handle, None),
            Scheduler::Executor(executor) => (self.inner.dispatch.clone(), Some(executor)),
        }
    }

    /// Cancel every subscription owned by `subscriber`.
    ///
    /// Returns how many were cancelled; unknown subscribers are a no-op.
    /// Once this returns, no callback of `subscriber` can start. A callback
    /// already running on another thread has finished by then, except when
    /// this is called from inside a callback.
    pub fn unregister(&self, subscriber: SubscriberId) -> usize {
        self.inner.registry.cancel_all(subscriber)
    }

    /// Tie `subscriber`'s existing group to a host scope: when the scope
    /// ends, the hook it was given unregisters the subscriber.
    ///
    /// Binding happens once per subscriber group. Returns `false`, and
    /// registers no hook, if the subscriber has no subscriptions or its
    /// group was already bound.
    pub fn bind_scope<S>(&self, subscriber: SubscriberId, scope: &S) -> bool
    where
        S: LifecycleScope + ?Sized,
    {
        if !self.inner.registry.bind_scope(subscriber) {
            info!(
                subscriber = %subscriber,
                "No unbound subscriber group, scope not attached"
            );
            return false;
        }
        self.attach_scope(subscriber, scope);
        true
    }

    fn attach_scope<S>(&self, subscriber: SubscriberId, scope: &S)
    where
        S: LifecycleScope + ?Sized,
    {
        let bus = self.downgrade();
        scope.on_scope_end(Box::new(move || {
            if let Some(bus) = bus.upgrade() {
                let cancelled = bus.unregister(subscriber);
                debug!(subscriber = %subscriber, cancelled, "Scope ended");
            }
        }));
        info!(subscriber = %subscriber, "Lifecycle scope attached");
    }

    /// A fresh subscriber identity that unregisters itself when dropped.
    #[must_use]
    pub fn guard(&self) -> SubscriberGuard {
        SubscriberGuard::new(self.clone(), SubscriberId::new())
    }

    /// Cancel every subscription and reject further subscribes.
    ///
    /// Closes the main context if the bus created it. Posting stays
    /// possible and reaches nobody. Returns how many subscriptions were
    /// cancelled; `0` on repeated calls.
    pub fn shutdown(&self) -> usize {
        {
            let mut closed = self
                .inner
                .closed
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return 0;
            }
            *closed = true;
        }

        let cancelled = self.inner.registry.cancel_everything();
        if self.inner.owns_main {
            self.inner.main.close();
        }
        info!(cancelled, "Event bus shut down");
        cancelled
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self
            .inner
            .closed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of subscribers with a group.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Total live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.subscription_count()
    }

    /// Whether `subscriber` has a group.
    #[must_use]
    pub fn has_subscriber(&self, subscriber: SubscriberId) -> bool {
        self.inner.registry.contains(subscriber)
    }

    /// Subscriptions currently owned by `subscriber`.
    #[must_use]
    pub fn subscriptions(&self, subscriber: SubscriberId) -> Vec<Subscription> {
        self.inner.registry.subscriptions_of(subscriber)
    }

    /// Snapshot of the delivery counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.inner.stats.snapshot()
    }

    /// The subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// The main context [`Scheduler::Main`] delivers on.
    #[must_use]
    pub fn main_context(&self) -> &MainContext {
        &self.inner.main
    }

    /// Context used by [`subscribe`](Self::subscribe).
    #[must_use]
    pub fn default_scheduler(&self) -> DeliveryContext {
        self.inner.default_scheduler
    }

    /// Broadcast ring buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.inner.capacity)
            .field("default_scheduler", &self.inner.default_scheduler)
            .field("main", &self.inner.main)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubscriptionState;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn inline_bus() -> EventBus {
        EventBus::builder()
            .config(BusConfig {
                default_scheduler: DeliveryContext::Inline,
                ..BusConfig::default()
            })
            .runtime(Handle::current())
            .build()
            .unwrap()
    }

    fn forward<T: Clone + Send + Sync + 'static>(
        tx: mpsc::UnboundedSender<T>,
    ) -> impl Fn(Arc<T>) + Send + Sync + 'static {
        move |value: Arc<T>| {
            let _ = tx.send((*value).clone());
        }
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tag_and_type_filtering() {
        let bus = inline_bus();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber = SubscriberId::new();

        bus.subscribe(subscriber, 5, EventType::<String>::exact(), forward(tx))
            .unwrap();

        assert_eq!(bus.post_tagged(5, "hello".to_string()), 1);
        bus.post_tagged(6, "world".to_string());
        bus.post_tagged(5, 42_i32);
        bus.post_tagged(5, "last".to_string());

        assert_eq!(next(&mut rx).await, "hello");
        assert_eq!(next(&mut rx).await, "last");
        assert_eq!(bus.stats().filtered, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_post_counts_receivers_before_filtering() {
        let bus = inline_bus();
        assert_eq!(bus.post_tagged(1, 1_i32), 0);

        bus.subscribe(SubscriberId::new(), 1, EventType::<i32>::exact(), |_| {})
            .unwrap();
        bus.subscribe(SubscriberId::new(), 2, EventType::<String>::exact(), |_| {})
            .unwrap();

        // Both pipelines receive the envelope; only one will deliver it.
        assert_eq!(bus.post_tagged(1, 2_i32), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_post_uses_default_tag() {
        let bus = inline_bus();
        let (tx, mut rx) = mpsc::unbounded_channel();

        bus.subscribe(
            SubscriberId::new(),
            TAG_DEFAULT,
            EventType::<u64>::exact(),
            forward(tx),
        )
        .unwrap();

        bus.post(7_u64);
        assert_eq!(next(&mut rx).await, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unregister_cancels_group() {
        let bus = inline_bus();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber = SubscriberId::new();

        let first = bus
            .subscribe(subscriber, 1, EventType::<i32>::exact(), forward(tx.clone()))
            .unwrap();
        bus.subscribe(subscriber, 2, EventType::<i32>::exact(), forward(tx))
            .unwrap();
        assert_eq!(bus.subscription_count(), 2);

        bus.post_tagged(1, 10_i32);
        assert_eq!(next(&mut rx).await, 10);

        assert_eq!(bus.unregister(subscriber), 2);
        assert_eq!(bus.unregister(subscriber), 0);
        assert_eq!(first.state(), SubscriptionState::Cancelled);
        assert!(!bus.has_subscriber(subscriber));
        bus.post_tagged(1, 11_i32);

        // Every sender lived in a cancelled pipeline, so the channel closes.
        let rest = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(rest, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_post_erased_rejects_absent_payload() {
        let bus = inline_bus();
        let err = bus.post_erased(1, None).unwrap_err();
        assert!(matches!(err, BusError::InvalidArgument(_)));
        assert_eq!(bus.stats().posted, 0);

        let payload: Payload = Arc::new(3_u8);
        assert_eq!(bus.post_erased(1, Some(payload)).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_main_scheduler_runs_on_main_thread() {
        let bus = EventBus::builder()
            .config(BusConfig {
                main_thread_name: "bus-main-test".to_owned(),
                ..BusConfig::default()
            })
            .runtime(Handle::current())
            .build()
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        bus.subscribe(SubscriberId::new(), 1, EventType::<()>::exact(), move |_| {
            let name = std::thread::current().name().map(str::to_owned);
            let _ = tx.send(name);
        })
        .unwrap();

        bus.post_tagged(1, ());
        assert_eq!(next(&mut rx).await.as_deref(), Some("bus-main-test"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manual_main_context_waits_for_pump() {
        let (main, mut pump) = MainContext::manual("host-loop");
        let bus = EventBus::builder()
            .runtime(Handle::current())
            .main_context(main)
            .build()
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        bus.subscribe(SubscriberId::new(), 1, EventType::<i32>::exact(), move |v| {
            sink.lock().unwrap().push(*v);
        })
        .unwrap();
        bus.post_tagged(1, 1_i32);
        bus.post_tagged(1, 2_i32);

        let mut ran: usize = 0;
        timeout(Duration::from_secs(5), async {
            while ran < 2 {
                ran = ran.saturating_add(pump.run_pending());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);

        // A host-provided context stays open after shutdown.
        bus.shutdown();
        assert!(bus.main_context().is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_executor_scheduler() {
        struct Counting {
            jobs: Arc<Mutex<usize>>,
        }

        impl Executor for Counting {
            fn execute(&self, job: crate::scheduler::Job) {
                let mut jobs = self.jobs.lock().unwrap();
                *jobs = jobs.saturating_add(1);
                drop(jobs);
                job();
            }
        }

        let bus = inline_bus();
        let jobs = Arc::new(Mutex::new(0_usize));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = Scheduler::executor(Counting {
            jobs: Arc::clone(&jobs),
        });

        bus.subscribe_on(
            SubscriberId::new(),
            3,
            EventType::<String>::exact(),
            executor,
            forward(tx),
        )
        .unwrap();
        bus.post_tagged(3, "via executor".to_string());

        assert_eq!(next(&mut rx).await, "via executor");
        assert_eq!(*jobs.lock().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_rejects_subscribe() {
        let bus = inline_bus();
        let subscription = bus
            .subscribe(SubscriberId::new(), 1, EventType::<i32>::exact(), |_| {})
            .unwrap();

        assert_eq!(bus.shutdown(), 1);
        assert_eq!(bus.shutdown(), 0);
        assert!(bus.is_shut_down());
        assert_eq!(subscription.state(), SubscriptionState::Cancelled);
        assert!(!bus.main_context().is_open());

        let err = bus
            .subscribe(SubscriberId::new(), 1, EventType::<i32>::exact(), |_| {})
            .unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_cancels_subscriptions() {
        let bus = inline_bus();
        let subscription = bus
            .subscribe(SubscriberId::new(), 1, EventType::<i32>::exact(), |_| {})
            .unwrap();
        let weak = bus.downgrade();

        drop(bus);
        assert!(weak.upgrade().is_none());
        assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_guard_unregisters_on_drop() {
        let bus = inline_bus();
        let guard = bus.guard();
        let id = guard.id();

        guard
            .subscribe(1, EventType::<i32>::exact(), |_| {})
            .unwrap();
        assert!(bus.has_subscriber(id));

        drop(guard);
        assert!(!bus.has_subscriber(id));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let err = EventBus::builder()
            .config(BusConfig {
                channel_capacity: 0,
                ..BusConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, BusError::Config(_)));
    }

    #[test]
    fn test_dedicated_runtime_outside_async_context() {
        let bus = EventBus::new().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        bus.subscribe_on(
            SubscriberId::new(),
            1,
            EventType::<i32>::exact(),
            Scheduler::Inline,
            move |v| {
                let name = std::thread::current().name().map(str::to_owned);
                let _ = tx.send((*v, name));
            },
        )
        .unwrap();
        bus.post_tagged(1, 9_i32);

        let (value, thread) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(value, 9);
        assert_eq!(thread.as_deref(), Some("tagbus-dispatch"));
    }
}
