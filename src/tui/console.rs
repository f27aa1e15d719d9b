//! Console view
//!
//! Renders the text of a display surface with scrolling, plus the three controls the
//! display appender expects from its host: filter input, timestamp checkbox and clear.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};

/// Console view state owned by the application
#[derive(Debug, Clone)]
pub struct ConsoleView {
    /// First visible line when not following the tail
    pub scroll: usize,
    /// Follow new lines as they arrive
    pub auto_scroll: bool,
    /// Text of the filter input control
    pub filter_input: String,
    /// Whether keystrokes go to the filter input
    pub editing_filter: bool,
    /// State of the timestamp checkbox
    pub timestamps: bool,
    /// Status of the watched command, e.g. its exit code
    pub status: Option<String>,
}

impl ConsoleView {
    pub fn new(filter: &str, timestamps: bool) -> Self {
        Self {
            scroll: 0,
            auto_scroll: true,
            filter_input: filter.to_string(),
            editing_filter: false,
            timestamps,
            status: None,
        }
    }

    /// Scroll up by `lines` (disables auto-scroll)
    pub fn scroll_up(&mut self, lines: usize) {
        self.auto_scroll = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// Scroll down by `lines` without passing the last line
    pub fn scroll_down(&mut self, lines: usize, line_count: usize) {
        self.auto_scroll = false;
        self.scroll = (self.scroll + lines).min(line_count.saturating_sub(1));
    }

    /// Jump to the first line (disables auto-scroll)
    pub fn scroll_to_top(&mut self) {
        self.auto_scroll = false;
        self.scroll = 0;
    }

    /// Jump to the last line and follow new ones
    pub fn scroll_to_bottom(&mut self, line_count: usize) {
        self.auto_scroll = true;
        self.scroll = line_count.saturating_sub(1);
    }
}

/// First line to draw for the given viewport
pub fn effective_scroll(
    line_count: usize,
    visible_height: usize,
    scroll: usize,
    auto_scroll: bool,
) -> usize {
    if auto_scroll && line_count > visible_height {
        line_count - visible_height
    } else {
        scroll.min(line_count.saturating_sub(visible_height.max(1)))
    }
}

/// Render the console for one logger
pub fn render_console(
    frame: &mut Frame,
    area: Rect,
    view: &ConsoleView,
    logger_name: &str,
    entry_count: usize,
    text: &str,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    // Header
    let mut header = vec![
        Span::styled("ringlog", Style::default().fg(Color::Cyan).bold()),
        Span::raw(format!(" - {} ({} entries)", logger_name, entry_count)),
    ];
    if let Some(status) = &view.status {
        header.push(Span::styled(
            format!("  [{}]", status),
            Style::default().fg(Color::Yellow),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

    // Output region
    let lines: Vec<&str> = text.lines().collect();
    let content = chunks[1];
    let visible_height = content.height.saturating_sub(2) as usize;
    let first = effective_scroll(lines.len(), visible_height, view.scroll, view.auto_scroll);

    if lines.is_empty() {
        let empty = Paragraph::new("No log entries to show.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Output"));
        frame.render_widget(empty, content);
    } else {
        let shown: Vec<Line> = lines
            .iter()
            .skip(first)
            .take(visible_height)
            .map(|line| Line::raw(*line))
            .collect();
        let title = format!(
            "Output [{}-{} of {}]{}",
            first + 1,
            (first + shown.len()).min(lines.len()),
            lines.len(),
            if view.auto_scroll { " [auto-scroll]" } else { "" }
        );
        let output =
            Paragraph::new(shown).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(output, content);

        if lines.len() > visible_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));
            let mut scrollbar_state = ScrollbarState::new(lines.len())
                .position(first)
                .viewport_content_length(visible_height);
            let scrollbar_area = Rect {
                x: content.x + content.width - 1,
                y: content.y + 1,
                width: 1,
                height: content.height.saturating_sub(2),
            };
            frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
        }
    }

    // Toolbar: filter input, timestamp checkbox, clear button
    let filter_style = if view.editing_filter {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let checkbox = if view.timestamps { "[x]" } else { "[ ]" };
    let toolbar = Line::from(vec![
        Span::styled("Filter: ", filter_style.bold()),
        Span::styled(view.filter_input.as_str(), filter_style),
        Span::raw(if view.editing_filter { "_" } else { "" }),
        Span::raw(format!("   {} Timestamps   ", checkbox)),
        Span::styled("[Clear]", Style::default().fg(Color::Red)),
    ]);
    let toolbar = Paragraph::new(toolbar).block(Block::default().borders(Borders::ALL));
    frame.render_widget(toolbar, chunks[2]);

    // Footer with navigation help
    let footer_text = if view.editing_filter {
        "type to filter | Enter/Esc: done | Backspace: delete"
    } else {
        "/: filter | t: timestamps | c: clear | u: unclear | ↑/k ↓/j: scroll | g/G: top/bottom | q: quit"
    };
    let footer = Paragraph::new(footer_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);
}
