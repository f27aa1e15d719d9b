//! Appender that keeps a live, filterable text view of a logger
//!
//! The view itself belongs to a host: a [`SurfaceHost`] opens a [`DisplaySurface`],
//! which only has to support appending a line and replacing all of its text. The
//! host's controls (filter input, timestamp checkbox, clear button) call back into
//! [`DisplayAppender::on_filter_input`], [`DisplayAppender::set_timestamps`] and
//! [`DisplayAppender::clear`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::{parse_init, Appender, AppenderFactory, AppenderInit};
use crate::error::Result;
use crate::logging::{lock, LogEntry, Logger, WeakLogger, DISPLAY_APPENDER};

/// Filter text a new view starts with
pub const DEFAULT_FILTER: &str = ".*";

/// How long filter edits must pause before the view is redrawn
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(200);

/// Text region a display appender renders into
pub trait DisplaySurface: Send {
    /// Add text after the current content
    fn append(&mut self, text: &str);

    /// Replace the whole content
    fn replace(&mut self, text: &str);

    /// False once the host has closed the view
    fn is_open(&self) -> bool {
        true
    }
}

/// Opens display surfaces, one per logger name
pub trait SurfaceHost: Send + Sync {
    fn open(&self, name: &str) -> Box<dyn DisplaySurface>;
}

#[derive(Debug, Default)]
struct BufferState {
    text: String,
    open: bool,
    redraws: usize,
}

/// In-memory surface whose clones share one text buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSurface {
    state: Arc<Mutex<BufferState>>,
}

impl BufferSurface {
    /// An open, empty surface
    pub fn new() -> Self {
        let surface = Self::default();
        surface.reopen();
        surface
    }

    pub fn text(&self) -> String {
        lock(&self.state).text.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.state).text.lines().map(str::to_string).collect()
    }

    /// Number of full redraws so far
    pub fn redraws(&self) -> usize {
        lock(&self.state).redraws
    }

    /// Mark the surface closed; appenders stop writing to it
    pub fn close(&self) {
        lock(&self.state).open = false;
    }

    fn reopen(&self) {
        lock(&self.state).open = true;
    }
}

impl DisplaySurface for BufferSurface {
    fn append(&mut self, text: &str) {
        lock(&self.state).text.push_str(text);
    }

    fn replace(&mut self, text: &str) {
        let mut state = lock(&self.state);
        state.text.clear();
        state.text.push_str(text);
        state.redraws += 1;
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

/// Host handing out [`BufferSurface`]s, kept so the application can read them
#[derive(Debug, Default)]
pub struct BufferHost {
    surfaces: Mutex<HashMap<String, BufferSurface>>,
}

impl BufferHost {
    /// The surface opened for `name`, if any
    pub fn surface(&self, name: &str) -> Option<BufferSurface> {
        lock(&self.surfaces).get(name).cloned()
    }
}

impl SurfaceHost for BufferHost {
    fn open(&self, name: &str) -> Box<dyn DisplaySurface> {
        let surface = lock(&self.surfaces)
            .entry(name.to_string())
            .or_default()
            .clone();
        surface.reopen();
        Box::new(surface)
    }
}

/// Coalesces rapid filter edits into one update
///
/// Every edit replaces the pending one and restarts the delay.
#[derive(Debug)]
pub struct FilterDebounce {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl FilterDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record an edit made at `now`
    pub fn push(&mut self, text: impl Into<String>, now: Instant) {
        self.pending = Some((text.into(), now));
    }

    /// Take the pending text once the delay has elapsed since the last edit
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let settled = matches!(
            &self.pending,
            Some((_, at)) if now.saturating_duration_since(*at) >= self.delay
        );
        if settled {
            self.pending.take().map(|(text, _)| text)
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Compile a case-insensitive filter, `None` when the pattern is invalid
fn compile_filter(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// Format one entry as a display line
///
/// `"<id>. [<HH:MM:SS.mmm>] <message>\n"`, the bracketed local time only when
/// `timestamps` is set and the entry carries one.
pub fn format_entry(entry: &LogEntry, timestamps: bool) -> String {
    match entry.timestamp.filter(|_| timestamps) {
        Some(ts) => format!(
            "{}. [{}] {}\n",
            entry.id,
            ts.with_timezone(&Local).format("%H:%M:%S%.3f"),
            entry.message
        ),
        None => format!("{}. {}\n", entry.id, entry.message),
    }
}

/// Display appender init arguments
///
/// A bare boolean is accepted as `show`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Open the view as soon as the appender is created
    pub show: bool,
    /// Start with timestamps shown
    pub timestamps: bool,
    /// Initial filter pattern
    pub filter: Option<String>,
    /// Filter debounce in milliseconds
    pub debounce_ms: Option<u64>,
}

struct DisplayState {
    surface: Option<Box<dyn DisplaySurface>>,
    /// Compiled filter; `None` until a pattern compiles, matching everything
    filter: Option<Regex>,
    pattern: String,
    timestamps: bool,
    /// Entries with ids up to here are hidden
    first_idx: u64,
    debounce: FilterDebounce,
}

impl DisplayState {
    fn matches(&self, text: &str) -> bool {
        self.filter.as_ref().map_or(true, |f| f.is_match(text))
    }

    fn shows(&self, entry: &LogEntry) -> bool {
        entry.id > self.first_idx && self.matches(&entry.message)
    }

    /// The open surface, dropping it if the host closed it
    fn open_surface(&mut self) -> Option<&mut Box<dyn DisplaySurface>> {
        if self.surface.as_ref().is_some_and(|s| !s.is_open()) {
            self.surface = None;
        }
        self.surface.as_mut()
    }

    fn apply_filter(&mut self, pattern: &str) {
        if let Some(filter) = compile_filter(pattern) {
            self.filter = Some(filter);
            self.pattern = pattern.to_string();
        }
    }
}

/// Live filterable view of a logger's entries
pub struct DisplayAppender {
    logger: WeakLogger,
    name: String,
    host: Arc<dyn SurfaceHost>,
    state: Mutex<DisplayState>,
}

impl DisplayAppender {
    /// Create a closed view of `logger`; call [`DisplayAppender::show`] to open it
    pub fn new(logger: &Logger, host: Arc<dyn SurfaceHost>, options: DisplayOptions) -> Self {
        let mut state = DisplayState {
            surface: None,
            filter: None,
            pattern: DEFAULT_FILTER.to_string(),
            timestamps: options.timestamps,
            first_idx: 0,
            debounce: FilterDebounce::new(
                options
                    .debounce_ms
                    .map(Duration::from_millis)
                    .unwrap_or(FILTER_DEBOUNCE),
            ),
        };
        if let Some(pattern) = options.filter.as_deref() {
            state.apply_filter(pattern);
        }

        Self {
            logger: logger.downgrade(),
            name: logger.name().to_string(),
            host,
            state: Mutex::new(state),
        }
    }

    /// Open the view (if not already open) and render the buffered entries
    pub fn show(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if state.open_surface().is_none() {
                state.surface = Some(self.host.open(&self.name));
            }
        }
        self.refresh()
    }

    /// Detach from the surface; notifications are ignored until the next `show`
    pub fn close(&self) {
        lock(&self.state).surface = None;
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open_surface().is_some()
    }

    /// Filter text changed in the host's input control
    pub fn on_filter_input(&self, text: &str) {
        self.on_filter_input_at(text, Instant::now());
    }

    /// Filter text changed at `now`; applied by a later [`DisplayAppender::poll_filter`]
    pub fn on_filter_input_at(&self, text: &str, now: Instant) {
        lock(&self.state).debounce.push(text, now);
    }

    /// Apply a settled filter edit and redraw
    ///
    /// Returns true when a pending edit was applied. An invalid pattern keeps the
    /// previous filter.
    pub fn poll_filter(&self, now: Instant) -> Result<bool> {
        let applied = {
            let mut state = lock(&self.state);
            match state.debounce.poll(now) {
                Some(pattern) => {
                    state.apply_filter(&pattern);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.refresh()?;
        }
        Ok(applied)
    }

    /// Whether a filter edit is waiting for its debounce delay
    pub fn filter_pending(&self) -> bool {
        lock(&self.state).debounce.is_pending()
    }

    /// Replace the filter immediately
    pub fn set_filter(&self, pattern: &str) -> Result<()> {
        lock(&self.state).apply_filter(pattern);
        self.refresh()
    }

    /// The pattern currently in effect
    pub fn filter_pattern(&self) -> String {
        lock(&self.state).pattern.clone()
    }

    /// Timestamp checkbox toggled
    pub fn set_timestamps(&self, timestamps: bool) -> Result<()> {
        lock(&self.state).timestamps = timestamps;
        self.refresh()
    }

    pub fn timestamps(&self) -> bool {
        lock(&self.state).timestamps
    }

    /// Hide everything logged so far; the entries stay in the logger
    pub fn clear(&self) -> Result<()> {
        if let Some(last_id) = self.logger.upgrade().and_then(|l| l.last_id()) {
            lock(&self.state).first_idx = last_id;
        }
        self.refresh()
    }

    /// Undo every `clear`
    pub fn unclear(&self) -> Result<()> {
        lock(&self.state).first_idx = 0;
        self.refresh()
    }

    /// Highest id hidden by `clear`
    pub fn first_idx(&self) -> u64 {
        lock(&self.state).first_idx
    }
}

impl Appender for DisplayAppender {
    fn notify(&self, entry: &LogEntry) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.shows(entry) {
            return Ok(());
        }
        let line = format_entry(entry, state.timestamps);
        if let Some(surface) = state.open_surface() {
            surface.append(&line);
        }
        Ok(())
    }

    fn can_refresh(&self) -> bool {
        true
    }

    fn refresh(&self) -> Result<()> {
        let Some(logger) = self.logger.upgrade() else {
            return Ok(());
        };
        // Read the logger before taking our own lock
        let entries = logger.entries();
        let header = logger.header();

        let mut state = lock(&self.state);
        if state.open_surface().is_none() {
            return Ok(());
        }

        let mut out = String::new();
        if let Some(header) = header.filter(|h| state.matches(h)) {
            out.push_str(&header);
            if !header.ends_with('\n') {
                out.push('\n');
            }
        }
        for entry in entries.iter().filter(|e| state.shows(e)) {
            out.push_str(&format_entry(entry, state.timestamps));
        }

        if let Some(surface) = state.open_surface() {
            surface.replace(&out);
        }
        Ok(())
    }
}

/// Factory for the built-in `display` appender type
pub fn factory(host: Arc<dyn SurfaceHost>) -> AppenderFactory {
    Arc::new(move |logger: &Logger, init: &AppenderInit, _name: &str| {
        let options = match init.args() {
            serde_json::Value::Bool(show) => DisplayOptions {
                show,
                ..DisplayOptions::default()
            },
            _ => parse_init(DISPLAY_APPENDER, init)?,
        };
        let show = options.show;
        let appender = Arc::new(DisplayAppender::new(logger, Arc::clone(&host), options));
        if show {
            appender.show()?;
        }
        Ok(appender as Arc<dyn Appender>)
    })
}
