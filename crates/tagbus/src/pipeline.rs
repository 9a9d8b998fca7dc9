//! Per-subscription delivery pipeline.
//!
//! Each subscription owns a broadcast receiver and a task that drains it in
//! order: tag filter, type narrowing, then hand-off to the delivery context.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};

use crate::envelope::{Envelope, Tag};
use crate::error::BusError;
use crate::event_type::EventType;
use crate::registry::SubscriptionHandle;
use crate::scheduler::Executor;
use crate::stats::StatsCounters;

/// A subscriber callback, shared with the delivery context.
pub(crate) type Callback<T> = Arc<dyn Fn(Arc<T>) + Send + Sync + 'static>;

pub(crate) struct Pipeline<T: ?Sized> {
    handle: Arc<SubscriptionHandle>,
    event_type: EventType<T>,
    callback: Callback<T>,
    /// Context the callback hops to. `None` runs it on the pipeline task.
    hop: Option<Arc<dyn Executor>>,
    receiver: broadcast::Receiver<Envelope>,
    stats: Arc<StatsCounters>,
}

impl<T: ?Sized + Send + Sync + 'static> Pipeline<T> {
    pub(crate) fn new(
        handle: Arc<SubscriptionHandle>,
        event_type: EventType<T>,
        callback: Callback<T>,
        hop: Option<Arc<dyn Executor>>,
        receiver: broadcast::Receiver<Envelope>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            handle,
            event_type,
            callback,
            hop,
            receiver,
            stats,
        }
    }

    /// Drain the receiver until the subscription is cancelled or the bus
    /// sender is gone.
    pub(crate) async fn run(mut self) {
        if !self.handle.activate() {
            trace!(subscription = %self.handle.id(), "Cancelled before start");
            return;
        }
        debug!(
            subscription = %self.handle.id(),
            subscriber = %self.handle.subscriber(),
            tag = self.handle.tag(),
            event_type = %self.event_type.name(),
            "Subscription active"
        );

        let token = self.handle.token().clone();
        loop {
            let received = tokio::select! {
                biased;
                () = token.cancelled() => break,
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(envelope) => self.dispatch(&envelope),
                Err(RecvError::Lagged(count)) => {
                    warn!(
                        subscription = %self.handle.id(),
                        skipped = count,
                        "Subscription lagged, events dropped"
                    );
                    self.stats.record_lagged(count);
                },
                Err(RecvError::Closed) => break,
            }
        }

        trace!(subscription = %self.handle.id(), "Pipeline stopped");
    }

    fn dispatch(&self, envelope: &Envelope) {
        if envelope.tag() != self.handle.tag() {
            self.stats.record_filtered();
            return;
        }

        let Some(event) = self.event_type.narrow(envelope.payload()) else {
            trace!(
                subscription = %self.handle.id(),
                tag = envelope.tag(),
                event_type = %self.event_type.name(),
                "Payload type mismatch, dropped"
            );
            self.stats.record_filtered();
            return;
        };

        let tag = envelope.tag();
        match &self.hop {
            None => deliver(&self.handle, &self.callback, &self.stats, tag, event),
            Some(executor) => {
                let handle = Arc::clone(&self.handle);
                let callback = Arc::clone(&self.callback);
                let stats = Arc::clone(&self.stats);
                executor.execute(Box::new(move || {
                    deliver(&handle, &callback, &stats, tag, event);
                }));
            },
        }
    }
}

/// Invoke `callback` behind the subscription's gate, containing panics.
fn deliver<T: ?Sized>(
    handle: &SubscriptionHandle,
    callback: &Callback<T>,
    stats: &StatsCounters,
    tag: Tag,
    event: Arc<T>,
) {
    let outcome = handle
        .gate()
        .enter(|| panic::catch_unwind(AssertUnwindSafe(|| callback(event))));

    match outcome {
        None => trace!(subscription = %handle.id(), "Subscription cancelled, delivery skipped"),
        Some(Ok(())) => stats.record_delivered(),
        Some(Err(panic)) => {
            stats.record_failed();
            let error = BusError::CallbackFailure {
                subscriber: handle.subscriber().to_string(),
                tag,
                message: panic_message(panic.as_ref()),
            };
            warn!(
                subscription = %handle.id(),
                error = %error,
                "Subscriber callback panicked"
            );
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
