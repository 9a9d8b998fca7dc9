//! Delivery contexts: where a subscriber callback runs.
//!
//! Every context runs the jobs of one subscription in the order they were
//! handed over, which is what keeps per-subscription delivery in post order.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tagbus_config::DeliveryContext;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A unit of work handed to a delivery context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A host-provided execution context.
///
/// Implementations must run jobs handed over by one caller in FIFO order.
/// They may run them on any thread, and later than `execute` returns.
pub trait Executor: Send + Sync {
    /// Run `job` on this context.
    fn execute(&self, job: Job);

    /// Optional name for debugging.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "executor"
    }
}

/// Where a subscription's callback runs.
#[derive(Clone)]
pub enum Scheduler {
    /// The bus's single designated main context.
    Main,
    /// Directly on the delivery pipeline task, on the bus dispatch runtime.
    Inline,
    /// On the pipeline task, spawned onto this runtime instead of the
    /// dispatch runtime.
    Runtime(Handle),
    /// Handed to a host executor.
    Executor(Arc<dyn Executor>),
}

impl Scheduler {
    /// Wrap a host executor.
    pub fn executor(executor: impl Executor + 'static) -> Self {
        Self::Executor(Arc::new(executor))
    }
}

impl From<DeliveryContext> for Scheduler {
    fn from(context: DeliveryContext) -> Self {
        match context {
            DeliveryContext::Main => Self::Main,
            DeliveryContext::Inline => Self::Inline,
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("Main"),
            Self::Inline => f.write_str("Inline"),
            Self::Runtime(handle) => f.debug_tuple("Runtime").field(handle).finish(),
            Self::Executor(executor) => f.debug_tuple("Executor").field(&executor.name()).finish(),
        }
    }
}

/// A single-threaded FIFO context: the "main" thread of the bus.
///
/// Either backed by a dedicated thread ([`MainContext::spawn`]) or pumped by
/// the host from its own loop ([`MainContext::manual`]).
#[derive(Clone)]
pub struct MainContext {
    shared: Arc<MainShared>,
}

struct MainShared {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl MainContext {
    /// Start a dedicated thread named `name` that runs jobs until the
    /// context is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let (context, pump) = Self::manual(name);
        thread::Builder::new()
            .name(context.shared.name.clone())
            .spawn(move || pump.run_blocking())?;
        debug!(context = %context.shared.name, "Main context thread started");
        Ok(context)
    }

    /// Create a context whose jobs run only when the host drives the
    /// returned [`MainPump`].
    #[must_use]
    pub fn manual(name: impl Into<String>) -> (Self, MainPump) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let context = Self {
            shared: Arc::new(MainShared {
                name: name.into(),
                sender: Mutex::new(Some(sender)),
            }),
        };
        (context, MainPump { receiver })
    }

    /// Context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the context still accepts jobs.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop accepting jobs. Jobs already queued still run; a dedicated
    /// thread exits once they are drained.
    pub fn close(&self) {
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!(context = %self.shared.name, "Main context closed");
        }
    }
}

impl Executor for MainContext {
    fn execute(&self, job: Job) {
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let queued = sender.as_ref().is_some_and(|tx| tx.send(job).is_ok());
        if !queued {
            trace!(context = %self.shared.name, "Main context closed, job dropped");
        }
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}

impl fmt::Debug for MainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainContext")
            .field("name", &self.shared.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Host-side driver of a manual [`MainContext`].
#[derive(Debug)]
pub struct MainPump {
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl MainPump {
    /// Run every job queued right now. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran: usize = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran = ran.saturating_add(1);
        }
        ran
    }

    /// Run jobs as they arrive until the context is closed and drained.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            job();
        }
    }

    /// Blocking form of [`MainPump::run`], for a plain thread.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn run_blocking(mut self) {
        while let Some(job) = self.receiver.blocking_recv() {
            job();
        }
    }
}
