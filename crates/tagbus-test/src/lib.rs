//! Tagbus Test - Shared test utilities for the tagbus event bus.
//!
//! This crate provides recorders, fixtures and mock host integrations that
//! can be used across tagbus crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tagbus-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use tagbus::{EventType, SubscriberId};
//! use tagbus_test::{Recorder, test_bus};
//!
//! #[tokio::test(flavor = "multi_thread")]
//! async fn test_delivery() {
//!     let bus = test_bus();
//!     let recorder = Recorder::<String>::new();
//!
//!     bus.subscribe(SubscriberId::new(), 1, EventType::exact(), recorder.callback())
//!         .unwrap();
//!     bus.post_tagged(1, "hello".to_string());
//!
//!     assert!(recorder.wait_for_len(1).await);
//!     assert_eq!(recorder.values(), vec!["hello".to_string()]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
