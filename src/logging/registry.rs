//! Process-wide map of named loggers and appender factories

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::debug;

use super::buffer::DEFAULT_CAPACITY;
use super::lock;
use super::logger::Logger;
use crate::appender::{
    self, display, network, AppenderFactory, AppenderFailure, AppenderInit, BufferHost,
    ErrorHandler, HttpTransport, SurfaceHost, Transport,
};

/// Name used when a logger is requested without one
pub const DEFAULT_LOGGER_NAME: &str = "[default]";

/// Type name of the built-in network appender
pub const NETWORK_APPENDER: &str = "network";

/// Type name of the built-in display appender
pub const DISPLAY_APPENDER: &str = "display";

/// State every logger of a registry shares
pub(crate) struct Shared {
    factories: RwLock<HashMap<String, AppenderFactory>>,
    error_handler: RwLock<ErrorHandler>,
}

impl Shared {
    pub(crate) fn factory(&self, type_name: &str) -> Option<AppenderFactory> {
        self.factories
            .read()
            .ok()
            .and_then(|f| f.get(type_name).cloned())
    }

    pub(crate) fn report(&self, failure: &AppenderFailure<'_>) {
        let handler = self.error_handler.read().map(|h| Arc::clone(&*h)).ok();
        match handler {
            Some(handler) => handler(failure),
            None => appender::log_failure(failure),
        }
    }
}

/// Registry of named singleton loggers
///
/// Each name maps to exactly one [`Logger`] for the lifetime of the registry.
/// Creation parameters (capacity) only apply the first time a name is requested.
pub struct LoggerRegistry {
    loggers: Mutex<HashMap<String, Logger>>,
    shared: Arc<Shared>,
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerRegistry {
    /// Registry with the built-in appender types: `network` over HTTP and `display`
    /// over in-memory surfaces
    pub fn new() -> Self {
        Self::with_hosts(
            Arc::new(HttpTransport::new()),
            Arc::new(BufferHost::default()),
        )
    }

    /// Registry with the built-in appender types over the given capabilities
    pub fn with_hosts(transport: Arc<dyn Transport>, surfaces: Arc<dyn SurfaceHost>) -> Self {
        let registry = Self::empty();
        registry.register(NETWORK_APPENDER, network::factory(transport));
        registry.register(DISPLAY_APPENDER, display::factory(surfaces));
        registry
    }

    /// Registry without any appender types
    pub fn empty() -> Self {
        let handler: ErrorHandler = Arc::new(appender::log_failure);
        Self {
            loggers: Mutex::new(HashMap::new()),
            shared: Arc::new(Shared {
                factories: RwLock::new(HashMap::new()),
                error_handler: RwLock::new(handler),
            }),
        }
    }

    /// Get the logger with the given name, creating it with the default capacity
    pub fn get_logger(&self, name: &str) -> Logger {
        self.get_logger_sized(name, DEFAULT_CAPACITY)
    }

    /// Get the logger with the given name, creating it with `capacity` entries
    ///
    /// An empty name selects [`DEFAULT_LOGGER_NAME`]. `capacity` is ignored when the
    /// logger already exists.
    pub fn get_logger_sized(&self, name: &str, capacity: usize) -> Logger {
        let name = if name.is_empty() {
            DEFAULT_LOGGER_NAME
        } else {
            name
        };

        let mut loggers = lock(&self.loggers);
        if let Some(logger) = loggers.get(name) {
            return logger.clone();
        }

        let logger = Logger::new(name.to_string(), capacity, Arc::clone(&self.shared));
        debug!(
            "Created logger '{}' with capacity {}",
            name,
            logger.capacity()
        );
        loggers.insert(name.to_string(), logger.clone());
        logger
    }

    /// Get a logger and attach an appender to it
    ///
    /// Never fails: an appender that cannot be built is reported to the error
    /// handler and the logger is returned without it.
    pub fn get_logger_with_appender(
        &self,
        name: &str,
        capacity: Option<usize>,
        type_name: &str,
        init: AppenderInit,
    ) -> Logger {
        let logger = self.get_logger_sized(name, capacity.unwrap_or(DEFAULT_CAPACITY));
        if let Err(error) = logger.use_appender(type_name, init) {
            self.shared.report(&AppenderFailure {
                logger: logger.name(),
                appender: type_name,
                error,
            });
        }
        logger
    }

    /// The logger used when no name is given
    pub fn default_logger(&self) -> Logger {
        self.get_logger(DEFAULT_LOGGER_NAME)
    }

    /// Add or replace an appender type
    ///
    /// Only affects later `use_appender` calls; attached appenders are kept.
    pub fn register(&self, type_name: impl Into<String>, factory: AppenderFactory) {
        if let Ok(mut factories) = self.shared.factories.write() {
            factories.insert(type_name.into(), factory);
        }
    }

    /// Whether an appender type has a factory
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.shared.factory(type_name).is_some()
    }

    /// Replace the handler that receives appender failures
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&AppenderFailure<'_>) + Send + Sync + 'static,
    {
        if let Ok(mut current) = self.shared.error_handler.write() {
            *current = Arc::new(handler);
        }
    }

    /// Names of all loggers created so far, sorted
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.loggers).keys().cloned().collect();
        names.sort();
        names
    }
}

/// The process-wide registry, created on first use
pub fn registry() -> &'static LoggerRegistry {
    static REGISTRY: OnceLock<LoggerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(LoggerRegistry::new)
}
