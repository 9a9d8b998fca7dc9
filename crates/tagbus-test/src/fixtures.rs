//! Test fixtures: preconfigured buses and logging.

use tagbus::{BusConfig, DeliveryContext, EventBus, MainContext, MainPump};
use tagbus_telemetry::{LogConfig, LogFormat, LogTarget};
use tokio::runtime::Handle;

/// Name of the main thread spawned by [`test_bus`].
pub const TEST_MAIN_THREAD: &str = "tagbus-test-main";

/// Bus settings for tests: inline delivery by default and a recognisable
/// main thread name.
#[must_use]
pub fn test_config() -> BusConfig {
    BusConfig {
        default_scheduler: DeliveryContext::Inline,
        dispatch_threads: 1,
        main_thread_name: TEST_MAIN_THREAD.to_string(),
        ..BusConfig::default()
    }
}

/// A bus on the ambient tokio runtime using [`test_config`].
///
/// # Panics
///
/// Panics outside a tokio runtime, or if the main thread cannot start.
#[must_use]
pub fn test_bus() -> EventBus {
    test_bus_with(test_config())
}

/// A bus on the ambient tokio runtime with the given settings.
///
/// # Panics
///
/// Panics outside a tokio runtime, if `config` is invalid, or if the main
/// thread cannot start.
#[must_use]
pub fn test_bus_with(config: BusConfig) -> EventBus {
    EventBus::builder()
        .config(config)
        .runtime(Handle::current())
        .build()
        .expect("failed to build test bus")
}

/// A bus whose main context only runs when the test drives the returned
/// pump, like a host UI loop.
///
/// # Panics
///
/// Panics outside a tokio runtime.
#[must_use]
pub fn manual_main_bus() -> (EventBus, MainPump) {
    let (main, pump) = MainContext::manual("test-host-loop");
    let bus = EventBus::builder()
        .config(test_config())
        .runtime(Handle::current())
        .main_context(main)
        .build()
        .expect("failed to build test bus");
    (bus, pump)
}

/// Route logs through the test harness writer.
///
/// Safe to call from every test; only the first call installs a
/// subscriber. Honors `RUST_LOG` directives on top of the bus at `debug`.
pub fn init_test_logging() {
    let mut config = LogConfig::new("info")
        .with_format(LogFormat::Compact)
        .with_target(LogTarget::Test)
        .without_ansi();
    if let Ok(directives) = std::env::var("RUST_LOG") {
        config = config.with_directives_from(&directives);
    }
    // Another test already installed a subscriber.
    let _ = tagbus_telemetry::setup_logging(&config);
}
