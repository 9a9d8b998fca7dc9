//! The process-wide bus.

use std::sync::OnceLock;

use tagbus_config::Config;
use tracing::warn;

use crate::bus::EventBus;

static GLOBAL: OnceLock<EventBus> = OnceLock::new();

/// The process-wide bus, started on first use.
///
/// Unless [`install_global`] ran first, it is built from the defaults plus
/// `TAGBUS_*` environment overrides, with its own dispatch runtime and main
/// thread. Invalid overrides are logged and ignored.
///
/// # Panics
///
/// Panics if the dispatch runtime or main thread cannot be started on
/// first use.
pub fn global() -> &'static EventBus {
    GLOBAL.get_or_init(|| {
        let config = Config::from_env().unwrap_or_else(|error| {
            warn!(%error, "Ignoring invalid event bus overrides");
            Config::default()
        });
        EventBus::from_config(&config).expect("failed to start the global event bus")
    })
}

/// The process-wide bus, if it was already started or installed.
#[must_use]
pub fn try_global() -> Option<&'static EventBus> {
    GLOBAL.get()
}

/// Make `bus` the process-wide bus.
///
/// # Errors
///
/// Gives `bus` back if a global bus already exists.
pub fn install_global(bus: EventBus) -> Result<(), EventBus> {
    GLOBAL.set(bus)
}
