//! Bus error types.

use thiserror::Error;

use crate::envelope::Tag;

/// Errors surfaced by the event bus.
///
/// A payload that does not narrow to a subscription's type is not an error:
/// it is filtered out silently. Unregistering an unknown subscriber is a
/// successful no-op.
#[derive(Debug, Error)]
pub enum BusError {
    /// A required argument was absent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A subscriber callback panicked. Contained at the delivery boundary
    /// and reported through logs; never returned to a producer.
    #[error("callback of {subscriber} failed on tag {tag}: {message}")]
    CallbackFailure {
        /// Owner of the failing subscription.
        subscriber: String,
        /// Tag of the envelope being delivered.
        tag: Tag,
        /// Panic message, when it was a string.
        message: String,
    },

    /// The bus was shut down and accepts no new subscriptions.
    #[error("event bus is shut down")]
    Closed,

    /// The dispatch runtime or the main-context thread could not start.
    #[error("failed to start delivery context: {0}")]
    Runtime(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] tagbus_config::ConfigError),
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
