//! Named loggers with bounded history
//!
//! A [`LoggerRegistry`] hands out one [`Logger`] per name. Each logger keeps its most
//! recent entries in a [`RingBuffer`] and forwards new ones to its appenders. The
//! `file_writer` submodule sets up the binary's own diagnostic log file.

mod buffer;
mod file_writer;
mod logger;
mod registry;

pub use buffer::{LogEntry, RingBuffer, DEFAULT_CAPACITY};
pub use file_writer::{init_file_logging, LogFileInfo, LoggingGuard};
pub use logger::{Logger, WeakLogger};
pub use registry::{
    registry, LoggerRegistry, DEFAULT_LOGGER_NAME, DISPLAY_APPENDER, NETWORK_APPENDER,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking appender poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
