//! Appender that forwards matching entries to a remote endpoint
//!
//! Each transmitted entry becomes one fire-and-forget POST whose body is the message
//! text. An include/exclude filter selects entries and a quota caps the total number
//! of transmissions for the lifetime of the appender.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Deserializer, Serialize};
use tokio::runtime::{Builder, Handle, Runtime};

use super::{parse_init, Appender, AppenderFactory, AppenderInit};
use crate::error::Result;
use crate::logging::{LogEntry, Logger, NETWORK_APPENDER};

/// Prefix of the final transmission before the quota runs out
pub const MAX_COUNT_MARKER: &str = "[MAX_ERROR_LOG_COUNT_REACHED] ";

/// Transmissions allowed when no quota is configured
pub const DEFAULT_MAX_COUNT: u32 = 5;

/// Endpoint used when no URL is configured
pub const DEFAULT_URL: &str = "logger";

/// Sends one request body to a URL without waiting for the outcome
pub trait Transport: Send + Sync {
    fn post(&self, url: &str, body: String);
}

/// HTTP transport spawning each POST onto a tokio runtime
///
/// Uses the caller's runtime when there is one, otherwise a shared background
/// runtime started on first use. Responses and failures are never inspected.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runtime for transmissions made outside any tokio runtime
fn background_runtime() -> Option<&'static Runtime> {
    static RUNTIME: OnceLock<Option<Runtime>> = OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("ringlog-http")
                .enable_all()
                .build()
                .map_err(|e| tracing::warn!("Failed to start HTTP runtime: {}", e))
                .ok()
        })
        .as_ref()
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, body: String) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => match background_runtime() {
                Some(runtime) => runtime.handle().clone(),
                None => {
                    tracing::debug!("No async runtime available, dropping transmission to {}", url);
                    return;
                }
            },
        };
        let request = self.client.post(url).body(body);
        handle.spawn(async move {
            let _ = request.send().await;
        });
    }
}

/// Network appender settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Patterns of which at least one must occur in a message; empty means all
    #[serde(default, deserialize_with = "deserialize_patterns")]
    pub include: Vec<String>,

    /// Patterns that suppress a message (only consulted when `include` is empty)
    #[serde(default, deserialize_with = "deserialize_patterns")]
    pub exclude: Vec<String>,

    /// Total transmissions allowed; zero selects the default
    #[serde(default = "default_max_count")]
    pub max_count: u32,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_max_count() -> u32 {
    DEFAULT_MAX_COUNT
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_count: default_max_count(),
        }
    }
}

/// Accepts either a list of patterns or one comma-separated string
fn deserialize_patterns<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Patterns {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Option::<Patterns>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Patterns::Joined(joined)) if joined.is_empty() => Vec::new(),
        Some(Patterns::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        Some(Patterns::List(list)) => list,
    })
}

/// Whether any pattern is the `*` wildcard or occurs in `message`
fn matches_any(patterns: &[String], message: &str) -> bool {
    patterns
        .iter()
        .any(|p| p == "*" || message.contains(p.as_str()))
}

/// Forwards entries over a [`Transport`] until its quota is used up
pub struct NetworkAppender {
    url: String,
    include: Vec<String>,
    exclude: Vec<String>,
    remaining: AtomicU32,
    transport: Arc<dyn Transport>,
}

impl NetworkAppender {
    pub fn new(config: NetworkConfig, transport: Arc<dyn Transport>) -> Self {
        let max_count = if config.max_count == 0 {
            DEFAULT_MAX_COUNT
        } else {
            config.max_count
        };
        Self {
            url: config.url,
            include: config.include,
            exclude: config.exclude,
            remaining: AtomicU32::new(max_count),
            transport,
        }
    }

    /// Whether the include/exclude lists select this message
    pub fn selects(&self, message: &str) -> bool {
        if self.include.is_empty() {
            !matches_any(&self.exclude, message)
        } else {
            matches_any(&self.include, message)
        }
    }

    /// Transmissions left before the appender goes quiet
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Appender for NetworkAppender {
    fn notify(&self, entry: &LogEntry) -> Result<()> {
        if !self.selects(&entry.message) {
            return Ok(());
        }

        // Take one unit of quota; an exhausted quota never refills
        let Ok(previous) = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        else {
            return Ok(());
        };

        let body = if previous == 1 {
            format!("{}{}", MAX_COUNT_MARKER, entry.message)
        } else {
            entry.message.clone()
        };
        self.transport.post(&self.url, body);
        Ok(())
    }
}

/// Factory for the built-in `network` appender type
pub fn factory(transport: Arc<dyn Transport>) -> AppenderFactory {
    Arc::new(move |_logger: &Logger, init: &AppenderInit, _name: &str| {
        let config: NetworkConfig = parse_init(NETWORK_APPENDER, init)?;
        Ok(Arc::new(NetworkAppender::new(config, Arc::clone(&transport))) as Arc<dyn Appender>)
    })
}
