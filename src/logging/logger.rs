//! Named logger: owns a ring buffer and fans entries out to its appenders

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::{debug, warn};

use super::buffer::{LogEntry, RingBuffer};
use super::lock;
use super::registry::Shared;
use crate::appender::{Appender, AppenderFailure, AppenderInit, UnresolvedAppender};
use crate::error::{AppenderError, Result};

/// Ring buffer plus the id counter, guarded together so ids follow write order
struct Store {
    buffer: RingBuffer,
    last_id: u64,
}

struct LoggerInner {
    name: String,
    store: Mutex<Store>,
    no_timestamp: AtomicBool,
    header: RwLock<Option<String>>,
    appenders: Mutex<HashMap<String, Arc<dyn Appender>>>,
    shared: Arc<Shared>,
}

/// Handle to a named logger
///
/// Clones share the same buffer and appenders. Loggers are created through a
/// [`LoggerRegistry`](super::LoggerRegistry) and live as long as it does.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

/// Non-owning handle, held by appenders that read back from their logger
#[derive(Clone)]
pub struct WeakLogger {
    inner: Weak<LoggerInner>,
}

impl WeakLogger {
    pub fn upgrade(&self) -> Option<Logger> {
        self.inner.upgrade().map(|inner| Logger { inner })
    }
}

impl Logger {
    pub(crate) fn new(name: String, capacity: usize, shared: Arc<Shared>) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                name,
                store: Mutex::new(Store {
                    buffer: RingBuffer::new(capacity),
                    last_id: 0,
                }),
                no_timestamp: AtomicBool::new(false),
                header: RwLock::new(None),
                appenders: Mutex::new(HashMap::new()),
                shared,
            }),
        }
    }

    /// Write a message and notify every attached appender
    ///
    /// Appender failures (including panics) are reported to the registry's error
    /// handler; they never reach the caller and never skip the remaining appenders.
    pub fn log(&self, message: impl Into<String>) {
        let entry = {
            let mut store = lock(&self.inner.store);
            store.last_id += 1;
            let entry = if self.timestamps_enabled() {
                LogEntry::new(store.last_id, message)
            } else {
                LogEntry::untimed(store.last_id, message)
            };
            store.buffer.append(entry.clone());
            entry
        };

        for (type_name, appender) in self.attached() {
            if let Err(error) = isolate(&type_name, || appender.notify(&entry)) {
                self.report(&type_name, error);
            }
        }
    }

    /// Attach an appender of the given type, or return the one already attached
    ///
    /// A registered factory for `type_name` builds the appender from `init`. Without
    /// one, `init` must carry a ready-made instance; otherwise an
    /// [`UnresolvedAppender`] is cached and every notification reports
    /// [`AppenderError::InvalidAppender`]. A newly attached appender that can refresh
    /// is refreshed once so it replays the buffered history.
    pub fn use_appender(&self, type_name: &str, init: AppenderInit) -> Result<Arc<dyn Appender>> {
        if let Some(existing) = lock(&self.inner.appenders).get(type_name) {
            return Ok(Arc::clone(existing));
        }

        // Built without holding the appender map so factories may use this logger
        let created: Arc<dyn Appender> = match (self.inner.shared.factory(type_name), init) {
            (Some(factory), init) => factory(self, &init, &self.inner.name)?,
            (None, AppenderInit::Instance(appender)) => appender,
            (None, _) => {
                warn!(
                    logger = %self.inner.name,
                    "No factory registered for appender type '{}'",
                    type_name
                );
                Arc::new(UnresolvedAppender::new(type_name))
            }
        };

        let (appender, inserted) = {
            let mut appenders = lock(&self.inner.appenders);
            match appenders.get(type_name) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    appenders.insert(type_name.to_string(), Arc::clone(&created));
                    (created, true)
                }
            }
        };

        if inserted {
            debug!(logger = %self.inner.name, "Attached appender '{}'", type_name);
            if appender.can_refresh() {
                if let Err(error) = isolate(type_name, || appender.refresh()) {
                    self.report(type_name, error);
                }
            }
        }

        Ok(appender)
    }

    /// Attach an appender and recover its concrete type
    ///
    /// Returns `None` when the appender attached under `type_name` is not a `T`.
    pub fn use_appender_as<T: Appender + 'static>(
        &self,
        type_name: &str,
        init: AppenderInit,
    ) -> Result<Option<Arc<T>>> {
        let appender = self.use_appender(type_name, init)?;
        Ok(appender.into_any().downcast::<T>().ok())
    }

    /// All buffered entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.inner.store).buffer.snapshot()
    }

    /// Number of buffered entries
    pub fn len(&self) -> usize {
        lock(&self.inner.store).buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.store).buffer.is_empty()
    }

    /// Id of the most recently written entry, if any
    pub fn last_id(&self) -> Option<u64> {
        lock(&self.inner.store).buffer.last_id()
    }

    /// Type names of the attached appenders
    pub fn appender_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.appenders).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        lock(&self.inner.store).buffer.capacity()
    }

    /// Static preamble a display may show above the entries
    pub fn header(&self) -> Option<String> {
        self.inner
            .header
            .read()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn set_header(&self, header: Option<String>) {
        if let Ok(mut current) = self.inner.header.write() {
            *current = header;
        }
    }

    /// Whether new entries are stamped with the current time
    pub fn timestamps_enabled(&self) -> bool {
        !self.inner.no_timestamp.load(Ordering::Relaxed)
    }

    /// Stop (or resume) stamping new entries
    pub fn set_no_timestamp(&self, no_timestamp: bool) {
        self.inner
            .no_timestamp
            .store(no_timestamp, Ordering::Relaxed);
    }

    pub fn downgrade(&self) -> WeakLogger {
        WeakLogger {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles refer to the same logger
    pub fn ptr_eq(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn attached(&self) -> Vec<(String, Arc<dyn Appender>)> {
        lock(&self.inner.appenders)
            .iter()
            .map(|(name, appender)| (name.clone(), Arc::clone(appender)))
            .collect()
    }

    fn report(&self, type_name: &str, error: AppenderError) {
        self.inner.shared.report(&AppenderFailure {
            logger: &self.inner.name,
            appender: type_name,
            error,
        });
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("capacity", &self.capacity())
            .field("appenders", &self.appender_names())
            .finish()
    }
}

/// Run an appender callback, turning a panic into an error
fn isolate(type_name: &str, f: impl FnOnce() -> Result<()>) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(AppenderError::Panicked {
            type_name: type_name.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
