//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tagbus::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust,no_run
//! use tagbus::prelude::*;
//!
//! let bus = EventBus::new().unwrap();
//! let guard = bus.guard();
//! guard
//!     .subscribe_on(1, EventType::<u32>::exact(), Scheduler::Inline, |n| {
//!         println!("{n}");
//!     })
//!     .unwrap();
//! bus.post_tagged(1, 7_u32);
//! ```

// Bus
pub use crate::{EventBus, EventBusBuilder, global, install_global};

// Events
pub use crate::{EventType, Payload, TAG_DEFAULT, Tag};

// Subscriptions
pub use crate::{SubscriberGuard, SubscriberId, Subscription, SubscriptionState};

// Delivery
pub use crate::{MainContext, Scheduler};

// Errors
pub use crate::{BusError, BusResult};
