//! Subscriber setup for bus logs.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{TelemetryError, TelemetryResult};

/// Target prefix shared by every record the bus crates emit.
pub const BUS_TARGET: &str = "tagbus";

fn init_err<E: std::fmt::Display>(e: E) -> TelemetryError {
    TelemetryError::InitError(e.to_string())
}

fn config_err<E: std::fmt::Display>(e: E) -> TelemetryError {
    TelemetryError::ConfigError(e.to_string())
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable records.
    #[default]
    Compact,
    /// One JSON object per record, fields included.
    Json,
}

/// Log output target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to stdout.
    Stdout,
    /// Log to stderr.
    #[default]
    Stderr,
    /// Log through the test harness capture (`fmt::TestWriter`).
    Test,
}

/// Logging configuration.
///
/// Two levels apply: `level` for everything, and `bus_level` for the bus
/// crates, so subscribe and unregister traffic can be watched without
/// turning the host application up too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Base filter (e.g., "info", "warn").
    #[serde(default = "default_level")]
    pub level: String,
    /// Level for records under [`BUS_TARGET`].
    #[serde(default = "default_bus_level")]
    pub bus_level: String,
    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
    /// Log target.
    #[serde(default)]
    pub target: LogTarget,
    /// Whether to include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Whether to include thread names, which tell the delivery context
    /// (main thread, dispatch worker, host executor) a callback ran on.
    #[serde(default = "default_true")]
    pub thread_names: bool,
    /// Whether to use ANSI colors.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Extra directives applied last (e.g., `tagbus::pipeline=trace`).
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_bus_level() -> String {
    "debug".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            bus_level: default_bus_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            timestamps: true,
            thread_names: true,
            ansi: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create a config with the given base level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Set the level for the bus crates.
    #[must_use]
    pub fn with_bus_level(mut self, level: impl Into<String>) -> Self {
        self.bus_level = level.into();
        self
    }

    /// Set the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a directive override.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Add every directive of a comma-separated list, as found in
    /// `RUST_LOG`. Blank entries are skipped.
    #[must_use]
    pub fn with_directives_from(mut self, list: &str) -> Self {
        self.directives.extend(
            list.split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
        );
        self
    }

    /// Disable timestamps.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Disable thread names.
    #[must_use]
    pub fn without_thread_names(mut self) -> Self {
        self.thread_names = false;
        self
    }

    /// Disable ANSI colors.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let bus = format!("{BUS_TARGET}={}", self.bus_level);
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(config_err)?
            .add_directive(bus.parse().map_err(config_err)?);

        for directive in &self.directives {
            filter = filter.add_directive(directive.parse().map_err(config_err)?);
        }

        Ok(filter)
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] for an unparsable level or
/// directive, and [`TelemetryError::InitError`] if a global subscriber is
/// already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;

    match config.target {
        LogTarget::Stdout => install(filter, config, std::io::stdout),
        LogTarget::Stderr => install(filter, config, std::io::stderr),
        LogTarget::Test => install(filter, config, fmt::TestWriter::new),
    }
}

fn install<W>(filter: EnvFilter, config: &LogConfig, writer: W) -> TelemetryResult<()>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(config.ansi)
        .with_thread_names(config.thread_names);

    // Each format yields a distinct layer type.
    match (config.format, config.timestamps) {
        (LogFormat::Compact, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .try_init()
            .map_err(init_err),
        (LogFormat::Compact, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact().without_time())
            .try_init()
            .map_err(init_err),
        (LogFormat::Json, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
            .map_err(init_err),
        (LogFormat::Json, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json().without_time())
            .try_init()
            .map_err(init_err),
    }
}
