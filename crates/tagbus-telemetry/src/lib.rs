//! tagbus Telemetry - Logging setup for the tagbus event bus.
//!
//! The bus crates only emit `tracing` records. This crate installs the
//! global subscriber that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use tagbus_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tagbus_telemetry::TelemetryError> {
//! let config = LogConfig::new("warn")
//!     .with_bus_level("trace")
//!     .with_format(LogFormat::Json);
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{BUS_TARGET, LogConfig, LogFormat, LogTarget, setup_logging};
