//! Config file loading and environment overrides.
//!
//! `load_file` runs:
//! 1. Parse `defaults.toml` → base
//! 2. Merge the file's tables over the base
//! 3. Deserialize merged tree → `Config`
//! 4. Validate

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Overrides `bus.channel_capacity`.
pub const ENV_CHANNEL_CAPACITY: &str = "TAGBUS_CHANNEL_CAPACITY";
/// Overrides `bus.dispatch_threads`.
pub const ENV_DISPATCH_THREADS: &str = "TAGBUS_DISPATCH_THREADS";
/// Overrides `bus.default_scheduler`.
pub const ENV_DEFAULT_SCHEDULER: &str = "TAGBUS_DEFAULT_SCHEDULER";

/// Load a config from a specific file path, layered over the embedded
/// defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or if the
/// result fails validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    // Check size after reading to avoid TOCTOU between stat and read.
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let config = parse_str(&content, &path.display().to_string())?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Parse TOML text over the embedded defaults and validate the result.
pub(crate) fn parse_str(content: &str, origin: &str) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let overlay: toml::Value = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })?;
    merge_tables(&mut merged, overlay);

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: origin.to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Recursively merge `overlay` into `base`; overlay leaves win.
fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base_table.insert(key, value);
                    },
                }
            }
        },
        (slot, value) => *slot = value,
    }
}

/// Snapshot the `TAGBUS_*` variables of the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("TAGBUS_"))
        .collect()
}

/// Apply `TAGBUS_*` overrides from `env` onto `config`.
///
/// Returns the number of overrides applied. The caller re-validates.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a variable holds an unparsable value.
pub fn apply_env_overrides(
    config: &mut Config,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied: usize = 0;

    if let Some(raw) = env.get(ENV_CHANNEL_CAPACITY) {
        config.bus.channel_capacity = parse_env(ENV_CHANNEL_CAPACITY, raw)?;
        applied = applied.saturating_add(1);
    }
    if let Some(raw) = env.get(ENV_DISPATCH_THREADS) {
        config.bus.dispatch_threads = parse_env(ENV_DISPATCH_THREADS, raw)?;
        applied = applied.saturating_add(1);
    }
    if let Some(raw) = env.get(ENV_DEFAULT_SCHEDULER) {
        config.bus.default_scheduler =
            raw.parse().map_err(|message| ConfigError::EnvError {
                var: ENV_DEFAULT_SCHEDULER.to_owned(),
                message,
            })?;
        applied = applied.saturating_add(1);
    }

    if applied > 0 {
        debug!(count = applied, "applied environment overrides");
    }
    Ok(applied)
}

fn parse_env(var: &str, raw: &str) -> ConfigResult<usize> {
    raw.trim().parse().map_err(|e| ConfigError::EnvError {
        var: var.to_owned(),
        message: format!("'{raw}' is not a positive integer: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryContext;

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_str_overlays_defaults() {
        let config = parse_str(
            r#"
            [bus]
            channel_capacity = 64
            default_scheduler = "inline"
        "#,
            "<test>",
        )
        .unwrap();

        assert_eq!(config.bus.channel_capacity, 64);
        assert_eq!(config.bus.default_scheduler, DeliveryContext::Inline);
        assert_eq!(config.bus.main_thread_name, "tagbus-main");
    }

    #[test]
    fn test_parse_str_rejects_unknown_scheduler() {
        let result = parse_str("[bus]\ndefault_scheduler = \"io\"\n", "<test>");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/tagbus.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagbus.toml");
        std::fs::write(&path, "[bus]\ndispatch_threads = 4\n").unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.bus.dispatch_threads, 4);
        assert_eq!(config.bus.channel_capacity, 1024);
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&path, data).unwrap();

        let result = load_file(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        let env = HashMap::from([
            (ENV_CHANNEL_CAPACITY.to_owned(), "16".to_owned()),
            (ENV_DEFAULT_SCHEDULER.to_owned(), "inline".to_owned()),
        ]);

        let applied = apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(config.bus.channel_capacity, 16);
        assert_eq!(config.bus.default_scheduler, DeliveryContext::Inline);
        assert_eq!(config.bus.dispatch_threads, 2);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let mut config = Config::default();
        let env = HashMap::from([(ENV_DISPATCH_THREADS.to_owned(), "many".to_owned())]);

        let result = apply_env_overrides(&mut config, &env);
        assert!(matches!(result, Err(ConfigError::EnvError { var, .. }) if var == ENV_DISPATCH_THREADS));
    }
}
