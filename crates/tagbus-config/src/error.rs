use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path of the file.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The config text is not valid TOML for the expected schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// Path of the file, or a placeholder for inline text.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {message}")]
    EnvError {
        /// Environment variable name.
        var: String,
        /// What was wrong with the value.
        message: String,
    },

    /// A value is outside its accepted range.
    #[error("invalid config field {field}: {message}")]
    ValidationError {
        /// Dotted field path (e.g. `bus.channel_capacity`).
        field: String,
        /// What was wrong with the value.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
