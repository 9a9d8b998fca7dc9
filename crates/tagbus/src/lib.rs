//! Tagbus - process-wide tagged publish/subscribe event bus.
//!
//! This crate provides:
//! - Tagged envelopes carrying any `Send + Sync` value
//! - Typed subscriptions filtered by tag and by payload type
//! - Delivery on a chosen context: the main thread, inline, a runtime or a
//!   host executor
//! - Bulk cancellation of every subscription owned by one subscriber
//! - A lazily started process-wide instance
//!
//! # Architecture
//!
//! Every posted envelope enters one broadcast channel. Each subscription
//! owns a receiver and a pipeline task that drops envelopes with another
//! tag, narrows the payload through its [`EventType`], then hands it to its
//! [`Scheduler`]. Subscriptions are grouped by [`SubscriberId`] in the
//! [`SubscriptionRegistry`], so [`EventBus::unregister`] tears a whole
//! group down at once. Once it returns, no callback of that subscriber
//! starts again.
//!
//! # Example
//!
//! ```rust,no_run
//! use tagbus::{EventBus, EventType, SubscriberId};
//!
//! let bus = EventBus::new().unwrap();
//! let screen = SubscriberId::new();
//!
//! bus.subscribe(screen, 5, EventType::<String>::exact(), |text| {
//!     println!("got {text}");
//! })
//! .unwrap();
//!
//! bus.post_tagged(5, "hello".to_string()); // delivered
//! bus.post_tagged(6, "world".to_string()); // other tag, dropped
//! bus.post_tagged(5, 42_i32); // other type, dropped
//!
//! bus.unregister(screen);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod envelope;
mod error;
mod event_type;
mod gate;
mod global;
mod id;
mod lifecycle;
mod pipeline;
mod registry;
mod scheduler;
mod stats;

pub use bus::{EventBus, EventBusBuilder, WeakEventBus};
pub use envelope::{Envelope, Payload, TAG_DEFAULT, Tag};
pub use error::{BusError, BusResult};
pub use event_type::EventType;
pub use global::{global, install_global, try_global};
pub use id::{SubscriberId, SubscriptionId};
pub use lifecycle::{LifecycleScope, ScopeEndHook, SubscriberGuard};
pub use registry::{Subscription, SubscriptionRegistry, SubscriptionState};
pub use scheduler::{Executor, Job, MainContext, MainPump, Scheduler};
pub use stats::BusStats;
pub use tagbus_config::{BusConfig, Config, DeliveryContext};
