#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the tagbus event bus.
//!
//! This crate provides a single [`Config`] type holding the [`BusConfig`]
//! section that shapes an event bus instance: the broadcast ring buffer
//! size, the dispatch runtime, and the default delivery context.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tagbus_config::Config;
//!
//! // Defaults, then the file, then `TAGBUS_*` environment overrides.
//! let config = Config::load_with_env(std::path::Path::new("tagbus.toml")).unwrap();
//! println!("channel capacity: {}", config.bus.channel_capacity);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`TAGBUS_CHANNEL_CAPACITY`,
//!    `TAGBUS_DISPATCH_THREADS`, `TAGBUS_DEFAULT_SCHEDULER`)
//! 2. **Config file** (any TOML file passed to [`Config::load_file`])
//! 3. **Embedded defaults** (`defaults.toml` compiled into the crate)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal tagbus crates**.
//! Conversion into runtime types (schedulers, runtimes) happens in the
//! `tagbus` crate when a bus is built.

/// Configuration error types.
pub mod error;
/// Configuration file loading and environment overrides.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_CHANNEL_CAPACITY, ENV_DEFAULT_SCHEDULER, ENV_DISPATCH_THREADS};
pub use types::*;

impl Config {
    /// Parse and validate a configuration from TOML text.
    ///
    /// Missing sections and fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the text is not valid TOML or the result
    /// fails validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        loader::parse_str(content, "<inline>")
    }

    /// Load configuration from a single file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Load configuration from a file, then apply `TAGBUS_*` environment
    /// overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed, an override cannot
    /// be parsed, or the final configuration fails validation.
    pub fn load_with_env(path: &std::path::Path) -> ConfigResult<Self> {
        let mut config = loader::load_file(path)?;
        loader::apply_env_overrides(&mut config, &loader::collect_env_vars())?;
        validate::validate(&config)?;
        Ok(config)
    }

    /// Defaults with `TAGBUS_*` environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an override cannot be parsed or the
    /// result fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        loader::apply_env_overrides(&mut config, &loader::collect_env_vars())?;
        validate::validate(&config)?;
        Ok(config)
    }
}
