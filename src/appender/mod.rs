//! Appender capability contract
//!
//! An appender is a sink that receives every new entry of the logger it is attached
//! to. `notify` is required; `refresh` is an optional replay capability that the
//! logger invokes once on attach so a late appender can catch up on history.

pub mod display;
pub mod network;

pub use display::{
    BufferHost, BufferSurface, DisplayAppender, DisplayOptions, DisplaySurface, SurfaceHost,
};
pub use network::{HttpTransport, NetworkAppender, NetworkConfig, Transport};

use std::any::Any;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{AppenderError, Result};
use crate::logging::{LogEntry, Logger};

/// Converts a shared appender back into `Any` so callers can recover its concrete type
pub trait AsAny {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A log sink attached to a [`Logger`]
///
/// Methods take `&self`; appenders keep their mutable state behind their own lock.
pub trait Appender: AsAny + Send + Sync {
    /// Receive one newly written entry
    fn notify(&self, entry: &LogEntry) -> Result<()>;

    /// Whether this appender replays history through [`Appender::refresh`]
    fn can_refresh(&self) -> bool {
        false
    }

    /// Re-render or re-send the logger's buffered history
    fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Initialization passed to [`Logger::use_appender`]
#[derive(Clone, Default)]
pub enum AppenderInit {
    /// No arguments; the factory uses its defaults
    #[default]
    None,
    /// Arguments handed to the registered factory
    Args(serde_json::Value),
    /// A ready-made appender, used when the type name has no registered factory
    Instance(Arc<dyn Appender>),
}

impl AppenderInit {
    /// Wrap a ready-made appender
    pub fn instance<A: Appender + 'static>(appender: A) -> Self {
        AppenderInit::Instance(Arc::new(appender))
    }

    /// The JSON arguments, or `null` when none were given
    pub fn args(&self) -> serde_json::Value {
        match self {
            AppenderInit::Args(value) => value.clone(),
            _ => serde_json::Value::Null,
        }
    }
}

impl std::fmt::Debug for AppenderInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppenderInit::None => write!(f, "None"),
            AppenderInit::Args(value) => f.debug_tuple("Args").field(value).finish(),
            AppenderInit::Instance(_) => write!(f, "Instance(..)"),
        }
    }
}

/// Deserialize a factory's init arguments, falling back to defaults when none are given
pub fn parse_init<T>(type_name: &str, init: &AppenderInit) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match init.args() {
        serde_json::Value::Null => Ok(T::default()),
        args => serde_json::from_value(args).map_err(|source| AppenderError::InvalidConfig {
            type_name: type_name.to_string(),
            source,
        }),
    }
}

/// Builds an appender for a logger from its init arguments and the logger name
pub type AppenderFactory =
    Arc<dyn Fn(&Logger, &AppenderInit, &str) -> Result<Arc<dyn Appender>> + Send + Sync>;

/// Stand-in cached for a type name that resolved to neither a factory nor an instance
///
/// Every notification fails, so the misconfiguration shows up through the error
/// handler instead of being silently dropped.
#[derive(Debug)]
pub struct UnresolvedAppender {
    type_name: String,
}

impl UnresolvedAppender {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

impl Appender for UnresolvedAppender {
    fn notify(&self, _entry: &LogEntry) -> Result<()> {
        Err(AppenderError::InvalidAppender {
            type_name: self.type_name.clone(),
        })
    }
}

/// An appender failure reported out of band
#[derive(Debug)]
pub struct AppenderFailure<'a> {
    /// Name of the logger the appender is attached to
    pub logger: &'a str,
    /// Type name the appender is attached under
    pub appender: &'a str,
    pub error: AppenderError,
}

/// Receives appender failures that `log` and `use_appender` do not propagate
pub type ErrorHandler = Arc<dyn Fn(&AppenderFailure<'_>) + Send + Sync>;

/// Default handler: report through tracing
pub fn log_failure(failure: &AppenderFailure<'_>) {
    tracing::warn!(
        logger = %failure.logger,
        appender = %failure.appender,
        "Appender failed: {}",
        failure.error
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_appender_fails_notify() {
        let appender = UnresolvedAppender::new("mystery");
        let err = appender.notify(&LogEntry::untimed(1, "hello")).unwrap_err();
        assert!(matches!(
            err,
            AppenderError::InvalidAppender { ref type_name } if type_name == "mystery"
        ));
        assert!(!appender.can_refresh());
    }

    #[test]
    fn test_init_args_default_to_null() {
        assert!(AppenderInit::None.args().is_null());
        let init = AppenderInit::Args(serde_json::json!({ "url": "x" }));
        assert_eq!(init.args()["url"], "x");
    }

    #[test]
    fn test_into_any_recovers_concrete_type() {
        let appender: Arc<dyn Appender> = Arc::new(UnresolvedAppender::new("x"));
        let concrete = appender.into_any().downcast::<UnresolvedAppender>();
        assert!(concrete.is_ok());
    }
}
