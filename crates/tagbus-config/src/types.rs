//! Configuration types for the event bus.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[bus]` header produces a working bus.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus settings.
    pub bus: BusConfig,
}

/// Settings for one event bus instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Size of the shared broadcast ring buffer. Pipelines that fall more
    /// than this many envelopes behind skip the oldest ones.
    pub channel_capacity: usize,
    /// Worker threads of the dedicated dispatch runtime. Ignored when the
    /// bus is built on an existing runtime.
    pub dispatch_threads: usize,
    /// Delivery context used by `subscribe` when the caller names none.
    pub default_scheduler: DeliveryContext,
    /// Name of the dedicated main-context thread.
    pub main_thread_name: String,
    /// Name prefix for dispatch runtime worker threads.
    pub dispatch_thread_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            dispatch_threads: 2,
            default_scheduler: DeliveryContext::Main,
            main_thread_name: "tagbus-main".to_owned(),
            dispatch_thread_name: "tagbus-dispatch".to_owned(),
        }
    }
}

/// Named delivery contexts that can be chosen from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryContext {
    /// The single designated main context.
    #[default]
    Main,
    /// Directly on the delivery pipeline, on the dispatch runtime.
    Inline,
}

impl fmt::Display for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Inline => f.write_str("inline"),
        }
    }
}

impl FromStr for DeliveryContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "inline" => Ok(Self::Inline),
            other => Err(format!(
                "unknown delivery context '{other}'; expected one of: main, inline"
            )),
        }
    }
}
