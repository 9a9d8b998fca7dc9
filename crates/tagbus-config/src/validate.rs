//! Post-load configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{BusConfig, Config};

/// Upper bound for the broadcast ring buffer.
const MAX_CHANNEL_CAPACITY: usize = 1 << 20;

/// Upper bound for dispatch runtime workers.
const MAX_DISPATCH_THREADS: usize = 64;

/// Validate a fully loaded configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_bus(&config.bus)
}

/// Validate the `[bus]` section on its own, for callers that build a bus
/// from a [`BusConfig`] directly.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate_bus(bus: &BusConfig) -> ConfigResult<()> {
    if bus.channel_capacity == 0 || bus.channel_capacity > MAX_CHANNEL_CAPACITY {
        return Err(ConfigError::ValidationError {
            field: "bus.channel_capacity".to_owned(),
            message: format!("channel_capacity must be between 1 and {MAX_CHANNEL_CAPACITY}"),
        });
    }

    if bus.dispatch_threads == 0 || bus.dispatch_threads > MAX_DISPATCH_THREADS {
        return Err(ConfigError::ValidationError {
            field: "bus.dispatch_threads".to_owned(),
            message: format!("dispatch_threads must be between 1 and {MAX_DISPATCH_THREADS}"),
        });
    }

    if bus.main_thread_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.main_thread_name".to_owned(),
            message: "main_thread_name must not be empty".to_owned(),
        });
    }

    if bus.dispatch_thread_name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.dispatch_thread_name".to_owned(),
            message: "dispatch_thread_name must not be empty".to_owned(),
        });
    }

    Ok(())
}
