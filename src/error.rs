//! Error types for appender attachment and notification

use thiserror::Error;

/// Failure raised by, or on behalf of, an appender
#[derive(Debug, Error)]
pub enum AppenderError {
    /// The type name had no registered factory and no ready-made instance was supplied
    #[error("appender '{type_name}' is not a usable appender")]
    InvalidAppender { type_name: String },

    /// A factory rejected its initialization arguments
    #[error("invalid configuration for appender '{type_name}': {source}")]
    InvalidConfig {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The appender panicked while being notified or refreshed
    #[error("appender '{type_name}' panicked: {message}")]
    Panicked { type_name: String, message: String },

    /// The display surface could not be written
    #[error("display surface error: {0}")]
    Surface(String),
}

pub type Result<T> = std::result::Result<T, AppenderError>;
