//! Application state and main event loop
//!
//! Ties the watched command, the logger and its appenders, and the terminal UI
//! together. Command output arrives over a channel and is logged on this thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use tokio::sync::mpsc;

use crate::appender::{AppenderInit, BufferHost, BufferSurface, DisplayAppender, HttpTransport};
use crate::command::{self, CommandEvent, CommandEventReceiver};
use crate::config::Config;
use crate::logging::{Logger, LoggerRegistry, DISPLAY_APPENDER, NETWORK_APPENDER};
use crate::tui::{render_console, ConsoleView, Tui};

/// Lines moved by PageUp/PageDown
const PAGE_LINES: usize = 20;

/// Lines moved by one mouse wheel step
const WHEEL_LINES: usize = 3;

/// What a key press asks the event loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

/// The console: one logger, its display appender and the view around it
///
/// Holds no terminal, so it can be driven directly from tests.
pub struct Console {
    registry: LoggerRegistry,
    logger: Logger,
    display: Arc<DisplayAppender>,
    surface: BufferSurface,
    pub view: ConsoleView,
}

impl Console {
    /// Build the registry, logger and appenders described by `config`
    pub fn new(config: &Config) -> Result<Self> {
        let host = Arc::new(BufferHost::default());
        let registry = LoggerRegistry::with_hosts(Arc::new(HttpTransport::new()), host.clone());
        Self::with_registry(config, registry, host)
    }

    /// Build the console on an existing registry whose display factory opens
    /// surfaces on `host`
    pub fn with_registry(
        config: &Config,
        registry: LoggerRegistry,
        host: Arc<BufferHost>,
    ) -> Result<Self> {
        let logger = registry.get_logger_sized(&config.logger_name, config.capacity);
        logger.set_no_timestamp(config.no_timestamp);
        logger.set_header(config.header.clone());

        if let Some(network) = &config.network {
            let args = serde_json::to_value(network).context("Failed to encode network config")?;
            logger.use_appender(NETWORK_APPENDER, AppenderInit::Args(args))?;
            tracing::info!("Forwarding entries of '{}' to {}", logger.name(), network.url);
        }

        let args = serde_json::to_value(config.display_options())
            .context("Failed to encode display options")?;
        let display = logger
            .use_appender_as::<DisplayAppender>(DISPLAY_APPENDER, AppenderInit::Args(args))?
            .context("Display appender has an unexpected type")?;
        let surface = host
            .surface(logger.name())
            .context("Display surface was not opened")?;

        let view = ConsoleView::new(&display.filter_pattern(), display.timestamps());

        Ok(Self {
            registry,
            logger,
            display,
            surface,
            view,
        })
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn registry(&self) -> &LoggerRegistry {
        &self.registry
    }

    pub fn display(&self) -> &Arc<DisplayAppender> {
        &self.display
    }

    /// Text currently shown by the display appender
    pub fn text(&self) -> String {
        self.surface.text()
    }

    /// Log one event from the watched command
    pub fn handle_command_event(&mut self, event: CommandEvent) {
        match event {
            CommandEvent::Line(line) => self.logger.log(line),
            CommandEvent::Exited(status) => {
                self.logger.log(format!("[ringlog] command {}", status));
                self.view.status = Some(status);
            }
        }
    }

    /// Apply a settled filter edit; returns true when the text changed
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        Ok(self.display.poll_filter(now)?)
    }

    /// Handle a key press
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<KeyOutcome> {
        if key.kind != KeyEventKind::Press {
            return Ok(KeyOutcome::Continue);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(KeyOutcome::Quit);
        }
        if self.view.editing_filter {
            self.handle_filter_key(key);
            return Ok(KeyOutcome::Continue);
        }

        let line_count = self.surface.lines().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(KeyOutcome::Quit),
            KeyCode::Char('/') => self.view.editing_filter = true,
            KeyCode::Char('t') => {
                self.view.timestamps = !self.view.timestamps;
                self.display.set_timestamps(self.view.timestamps)?;
            }
            KeyCode::Char('c') => {
                self.display.clear()?;
                self.view.scroll_to_bottom(self.surface.lines().len());
            }
            KeyCode::Char('u') => self.display.unclear()?,
            KeyCode::Up | KeyCode::Char('k') => self.view.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.view.scroll_down(1, line_count),
            KeyCode::PageUp => self.view.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.view.scroll_down(PAGE_LINES, line_count),
            KeyCode::Char('g') | KeyCode::Home => self.view.scroll_to_top(),
            KeyCode::Char('G') | KeyCode::End => self.view.scroll_to_bottom(line_count),
            _ => {}
        }
        Ok(KeyOutcome::Continue)
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.view.editing_filter = false;
                return;
            }
            KeyCode::Backspace => {
                self.view.filter_input.pop();
            }
            KeyCode::Char(c) => self.view.filter_input.push(c),
            _ => return,
        }
        self.display.on_filter_input(&self.view.filter_input);
    }

    /// Handle mouse wheel scrolling
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.view.scroll_up(WHEEL_LINES),
            MouseEventKind::ScrollDown => {
                let line_count = self.surface.lines().len();
                self.view.scroll_down(WHEEL_LINES, line_count);
            }
            _ => {}
        }
    }
}

/// Main application: the console plus the terminal and the watched command
pub struct App {
    console: Console,
    tui: Tui,
    events: CommandEventReceiver,
    needs_render: bool,
}

impl App {
    /// Set up the console and start `program`
    pub async fn new(config: Config, program: &str, args: &[String]) -> Result<Self> {
        let console = Console::new(&config)?;
        let (sender, events) = mpsc::unbounded_channel();
        command::spawn_command(program, args, sender)?;
        tracing::info!("Watching '{}' with {} argument(s)", program, args.len());

        Ok(Self {
            console,
            tui: Tui::new()?,
            events,
            needs_render: true,
        })
    }

    /// Run until the user quits
    pub async fn run(&mut self) -> Result<()> {
        self.tui.enter()?;

        tracing::info!("ringlog started. Press '/' to filter, 'q' to quit.");

        let result = self.event_loop();

        self.tui.exit()?;

        result
    }

    fn event_loop(&mut self) -> Result<()> {
        let tick_rate = Duration::from_millis(50);

        loop {
            while let Ok(event) = self.events.try_recv() {
                self.console.handle_command_event(event);
                self.needs_render = true;
            }

            if self.console.tick(Instant::now())? {
                self.needs_render = true;
            }

            // Only render when something has changed
            if self.needs_render {
                self.render()?;
                self.needs_render = false;
            }

            if event::poll(tick_rate)? {
                match event::read()? {
                    Event::Key(key) => {
                        if self.console.handle_key(key)? == KeyOutcome::Quit {
                            break;
                        }
                        self.needs_render = true;
                    }
                    Event::Mouse(mouse) => {
                        self.console.handle_mouse(mouse);
                        self.needs_render = true;
                    }
                    Event::Resize(_, _) => self.needs_render = true,
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let console = &self.console;
        let text = console.text();
        let entry_count = console.logger().len();
        self.tui.draw(|frame| {
            render_console(
                frame,
                frame.size(),
                &console.view,
                console.logger().name(),
                entry_count,
                &text,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appender::Transport;
    use std::sync::Mutex;

    #[derive(Default)]
    struct NullTransport {
        posts: Mutex<Vec<String>>,
    }

    impl Transport for NullTransport {
        fn post(&self, _url: &str, body: String) {
            self.posts.lock().unwrap().push(body);
        }
    }

    fn console(config: Config) -> (Console, Arc<NullTransport>) {
        let transport = Arc::new(NullTransport::default());
        let host = Arc::new(BufferHost::default());
        let registry = LoggerRegistry::with_hosts(transport.clone(), host.clone());
        (
            Console::with_registry(&config, registry, host).unwrap(),
            transport,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn config() -> Config {
        Config {
            no_timestamp: true,
            ..Config::default()
        }
    }

    #[test]
    fn test_command_output_is_displayed() {
        let (mut console, _) = console(config());
        console.handle_command_event(CommandEvent::Line("compiling".to_string()));
        console.handle_command_event(CommandEvent::Exited("exited with code 0".to_string()));

        assert_eq!(
            console.text(),
            "1. compiling\n2. [ringlog] command exited with code 0\n"
        );
        assert_eq!(console.view.status.as_deref(), Some("exited with code 0"));
    }

    #[test]
    fn test_header_shown_first() {
        let (console, _) = console(Config {
            header: Some("build log".to_string()),
            ..config()
        });
        assert_eq!(console.text(), "build log\n");
    }

    #[test]
    fn test_clear_and_unclear_keys() {
        let (mut console, _) = console(config());
        console.logger().log("old");
        console.handle_key(key(KeyCode::Char('c'))).unwrap();
        console.logger().log("new");
        assert_eq!(console.text(), "2. new\n");

        console.handle_key(key(KeyCode::Char('u'))).unwrap();
        assert_eq!(console.text(), "1. old\n2. new\n");
    }

    #[test]
    fn test_filter_editing_is_debounced() {
        let (mut console, _) = console(config());
        console.logger().log("error: disk full");
        console.logger().log("info: ok");

        console.handle_key(key(KeyCode::Char('/'))).unwrap();
        assert!(console.view.editing_filter);
        console.handle_key(key(KeyCode::Backspace)).unwrap();
        console.handle_key(key(KeyCode::Backspace)).unwrap();
        for c in "ERROR".chars() {
            console.handle_key(key(KeyCode::Char(c))).unwrap();
        }
        assert_eq!(console.view.filter_input, "ERROR");
        assert!(console.display().filter_pending());
        assert_eq!(console.text(), "1. error: disk full\n2. info: ok\n");

        let settled = Instant::now() + Duration::from_millis(250);
        assert!(console.tick(settled).unwrap());
        assert_eq!(console.text(), "1. error: disk full\n");

        console.handle_key(key(KeyCode::Enter)).unwrap();
        assert!(!console.view.editing_filter);
    }

    #[test]
    fn test_quit_keys() {
        let (mut console, _) = console(config());
        assert_eq!(console.handle_key(key(KeyCode::Char('q'))).unwrap(), KeyOutcome::Quit);

        console.view.editing_filter = true;
        assert_eq!(console.handle_key(key(KeyCode::Char('q'))).unwrap(), KeyOutcome::Continue);
        assert_eq!(console.view.filter_input, ".*q");

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(console.handle_key(ctrl_c).unwrap(), KeyOutcome::Quit);
    }

    #[test]
    fn test_timestamp_toggle() {
        let (mut console, _) = console(Config::default());
        console.logger().log("stamped");
        assert_eq!(console.text(), "1. stamped\n");

        console.handle_key(key(KeyCode::Char('t'))).unwrap();
        assert!(console.view.timestamps);
        let text = console.text();
        assert!(text.starts_with("1. ["));
        assert!(text.ends_with("] stamped\n"));
    }

    #[test]
    fn test_network_appender_from_config() {
        let (console, transport) = console(Config {
            network: Some(crate::appender::NetworkConfig {
                url: "http://collector/log".to_string(),
                include: vec!["ERROR".to_string()],
                max_count: 2,
                ..Default::default()
            }),
            ..config()
        });
        console.logger().log("INFO fine");
        console.logger().log("ERROR one");
        console.logger().log("ERROR two");
        console.logger().log("ERROR three");

        let posts = transport.posts.lock().unwrap().clone();
        assert_eq!(posts.len(), 2);
        assert!(posts[1].starts_with("[MAX_ERROR_LOG_COUNT_REACHED] "));
        assert_eq!(
            console.logger().appender_names(),
            vec!["display".to_string(), "network".to_string()]
        );
        assert_eq!(console.registry().logger_names(), vec!["[default]".to_string()]);
    }

    #[test]
    fn test_scroll_keys() {
        let (mut console, _) = console(config());
        for i in 0..30 {
            console.logger().log(format!("line {}", i));
        }
        console.handle_key(key(KeyCode::Char('g'))).unwrap();
        assert!(!console.view.auto_scroll);
        assert_eq!(console.view.scroll, 0);

        console.handle_key(key(KeyCode::PageDown)).unwrap();
        assert_eq!(console.view.scroll, 20);

        console.handle_key(key(KeyCode::Char('G'))).unwrap();
        assert!(console.view.auto_scroll);
    }
}
