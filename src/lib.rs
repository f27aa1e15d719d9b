//! ringlog - in-memory ring buffer logging with pluggable appenders
//!
//! Named loggers keep their most recent entries in a fixed-size ring buffer and fan
//! each new entry out to attached appenders. Two appenders are built in: `network`
//! forwards selected entries over HTTP, `display` renders a filterable live view.

pub mod app;
pub mod appender;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod tui;

pub use appender::{Appender, AppenderInit};
pub use error::{AppenderError, Result};
pub use logging::{registry, LogEntry, Logger, LoggerRegistry};
