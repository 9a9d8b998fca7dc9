//! Delivery recording and polling helpers.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// How long the polling helpers wait by default.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One recorded callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    /// The delivered value.
    pub value: T,
    /// Name of the thread the callback ran on.
    pub thread: Option<String>,
}

/// Thread-safe capture of delivered payloads, in delivery order.
///
/// Clones share the same log.
pub struct Recorder<T> {
    deliveries: Arc<Mutex<Vec<Delivery<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            deliveries: Arc::clone(&self.deliveries),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as delivered on the current thread.
    pub fn record(&self, value: T) {
        let thread = thread::current().name().map(str::to_owned);
        self.lock().push(Delivery { value, thread });
    }

    /// A subscriber callback that records every payload.
    pub fn callback(&self) -> impl Fn(Arc<T>) + Send + Sync + 'static
    where
        T: Sync,
    {
        let recorder = self.clone();
        move |value: Arc<T>| recorder.record((*value).clone())
    }

    /// A subscriber callback for a view type, recording `map(view)`.
    pub fn callback_with<U, F>(&self, map: F) -> impl Fn(Arc<U>) + Send + Sync + 'static
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(&U) -> T + Send + Sync + 'static,
    {
        let recorder = self.clone();
        move |view: Arc<U>| recorder.record(map(view.as_ref()))
    }

    /// Recorded values, in delivery order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.lock().iter().map(|d| d.value.clone()).collect()
    }

    /// Recorded deliveries, in delivery order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery<T>> {
        self.lock().clone()
    }

    /// Wait until at least `len` deliveries were recorded, up to
    /// [`DEFAULT_WAIT`]. Returns whether that happened.
    pub async fn wait_for_len(&self, len: usize) -> bool {
        wait_until(DEFAULT_WAIT, || self.len() >= len).await
    }
}

impl<T> Recorder<T> {
    /// Number of recorded deliveries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Delivery<T>>> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Poll `condition` until it holds or `timeout` elapses. Returns whether it
/// held.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now()
        .checked_add(timeout)
        .unwrap_or_else(Instant::now);
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Poll `check` until it yields a value or `timeout` elapses.
pub async fn wait_for<R>(timeout: Duration, mut check: impl FnMut() -> Option<R>) -> Option<R> {
    let mut found = None;
    wait_until(timeout, || {
        found = check();
        found.is_some()
    })
    .await;
    found
}

/// Give pipelines a moment to process anything already posted.
///
/// Used to assert that something did *not* happen.
pub async fn settle() {
    sleep(Duration::from_millis(50)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recorder_captures_order_and_thread() {
        let recorder = Recorder::<u32>::new();
        let callback = recorder.callback();
        callback(Arc::new(1));
        callback(Arc::new(2));

        assert_eq!(recorder.values(), vec![1, 2]);
        let current = thread::current().name().map(str::to_owned);
        assert_eq!(recorder.deliveries()[0].thread, current);
    }

    #[tokio::test]
    async fn test_callback_with_maps_views() {
        let recorder = Recorder::<usize>::new();
        let callback = recorder.callback_with(|s: &str| s.len());
        callback(Arc::from("four"));
        assert_eq!(recorder.values(), vec![4]);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(20), || false).await);
        assert!(wait_until(Duration::from_millis(20), || true).await);
    }

    #[tokio::test]
    async fn test_wait_for_returns_value() {
        let mut calls = 0_u32;
        let found = wait_for(DEFAULT_WAIT, || {
            calls = calls.saturating_add(1);
            (calls >= 3).then_some(calls)
        })
        .await;
        assert_eq!(found, Some(3));
    }
}
