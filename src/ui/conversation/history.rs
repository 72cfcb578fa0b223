//! Conversation history display component

use crate::conversation::{Role, Turn};
use crate::events::{STOPPED_TEXT, SessionEvent, THINKING_TEXT};
use crate::streaming::reveal_prefix;
use crate::ui::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Prompts offered on the empty chat screen
pub const SUGGESTIONS: [&str; 4] = [
    "Explain how a hash map works, with a small example",
    "Write a haiku about a terminal at midnight",
    "Give me three ideas for a weekend side project",
    "Summarize the pros and cons of remote work",
];

/// How a displayed message should be styled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Done,
    /// Waiting for or revealing the reply
    InProgress,
    /// Reply stopped by the user
    Stopped,
    /// Request failed
    Error,
}

/// A single message in the conversation view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    pub role: Role,
    pub text: String,
    pub status: EntryStatus,
}

impl DisplayEntry {
    fn from_turn(turn: &Turn) -> Self {
        Self {
            role: turn.role(),
            text: turn.text().to_string(),
            status: EntryStatus::Done,
        }
    }
}

/// Conversation history display component.
///
/// Rebuilt from the turn sequence on load; stopped and failed replies only
/// live here, never in the conversation store.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: Vec<DisplayEntry>,
    palette: Palette,
    scroll_back: usize,
    /// Full text of the reply being revealed
    reveal_source: String,
    suggestion: Option<usize>,
}

impl ConversationHistory {
    pub fn new(palette: Palette) -> Self {
        Self {
            entries: Vec::new(),
            palette,
            scroll_back: 0,
            reveal_source: String::new(),
            suggestion: None,
        }
    }

    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Replace everything shown with `turns`
    pub fn load_turns(&mut self, turns: &[Turn]) {
        self.entries = turns.iter().map(DisplayEntry::from_turn).collect();
        self.scroll_to_bottom();
    }

    /// Text of the most recent finished model reply
    pub fn last_reply(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Model && entry.status == EntryStatus::Done)
            .map(|entry| entry.text.as_str())
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_back
    }

    /// The highlighted welcome suggestion, if any
    pub fn selected_suggestion(&self) -> Option<&'static str> {
        self.suggestion.map(|i| SUGGESTIONS[i])
    }

    /// Move the suggestion highlight, wrapping at either end
    pub fn move_suggestion(&mut self, delta: isize) {
        let len = SUGGESTIONS.len() as isize;
        let next = match self.suggestion {
            None if delta < 0 => len - 1,
            None => 0,
            Some(current) => (current as isize + delta).rem_euclid(len),
        };
        self.suggestion = Some(next as usize);
    }

    fn in_progress_mut(&mut self) -> Option<&mut DisplayEntry> {
        self.entries
            .last_mut()
            .filter(|entry| entry.status == EntryStatus::InProgress)
    }

    /// Reflect a session transition
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::UserTurn(turn) => {
                self.suggestion = None;
                self.entries.push(DisplayEntry::from_turn(turn));
                self.scroll_to_bottom();
            }
            SessionEvent::Pending => {
                self.entries.push(DisplayEntry {
                    role: Role::Model,
                    text: THINKING_TEXT.to_string(),
                    status: EntryStatus::InProgress,
                });
                self.scroll_to_bottom();
            }
            SessionEvent::Revealing { text } => {
                self.reveal_source.clone_from(text);
                if let Some(entry) = self.in_progress_mut() {
                    entry.text.clear();
                }
            }
            SessionEvent::Reveal { text } => {
                let shown = if self.reveal_source.is_empty() {
                    text.clone()
                } else {
                    reveal_prefix(&self.reveal_source, text).to_string()
                };
                if let Some(entry) = self.in_progress_mut() {
                    entry.text = shown;
                }
            }
            SessionEvent::Completed { text } => {
                if let Some(entry) = self.in_progress_mut() {
                    entry.text.clone_from(text);
                    entry.status = EntryStatus::Done;
                }
            }
            SessionEvent::Cancelled { .. } => {
                if let Some(entry) = self.in_progress_mut() {
                    entry.text = STOPPED_TEXT.to_string();
                    entry.status = EntryStatus::Stopped;
                }
            }
            SessionEvent::Failed { message } => {
                if let Some(entry) = self.in_progress_mut() {
                    entry.text = format!("Error: {message}");
                    entry.status = EntryStatus::Error;
                }
            }
            SessionEvent::Cleared => self.clear(),
        }
        if !matches!(event, SessionEvent::Revealing { .. } | SessionEvent::Reveal { .. }) {
            self.reveal_source.clear();
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reveal_source.clear();
        self.scroll_back = 0;
    }

    /// Render a single message into lines
    fn render_entry(&self, entry: &DisplayEntry, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (icon, name, color) = match entry.role {
            Role::User => ("👤", "You", self.palette.user),
            Role::Model => ("✨", "Gemini", self.palette.model),
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{icon} {name}"),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]));

        let style = match entry.status {
            EntryStatus::Done => Style::default().fg(self.palette.text),
            EntryStatus::InProgress => Style::default().fg(self.palette.muted),
            EntryStatus::Stopped | EntryStatus::Error => Style::default().fg(self.palette.error),
        };

        let content_lines = wrap_text(&entry.text, width.saturating_sub(2) as usize);
        let last = content_lines.len().saturating_sub(1);
        for (i, content_line) in content_lines.into_iter().enumerate() {
            let mut spans = vec![Span::raw("  "), Span::styled(content_line, style)];
            if entry.status == EntryStatus::InProgress && i == last {
                spans.push(Span::styled("▋", Style::default().fg(self.palette.accent)));
            }
            lines.push(Line::from(spans));
        }

        lines
    }
}

impl Widget for &ConversationHistory {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.palette.muted))
            .title(" 💬 Chat ");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.entries.is_empty() {
            let mut welcome_lines = vec![
                Line::from(vec![Span::styled(
                    "Hello there!",
                    Style::default().fg(self.palette.model).add_modifier(Modifier::BOLD),
                )]),
                Line::from(vec![Span::styled(
                    "How can I help you today?",
                    Style::default().fg(self.palette.text),
                )]),
                Line::from(""),
            ];
            for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
                let line = if self.suggestion == Some(i) {
                    Line::from(vec![Span::styled(
                        format!("▸ {suggestion}"),
                        Style::default().fg(self.palette.accent).add_modifier(Modifier::BOLD),
                    )])
                } else {
                    Line::from(vec![Span::styled(
                        format!("  {suggestion}"),
                        Style::default().fg(self.palette.text),
                    )])
                };
                welcome_lines.push(line);
            }
            welcome_lines.push(Line::from(""));
            welcome_lines.push(Line::from(vec![Span::styled(
                "Up/Down picks a suggestion, Enter sends it. /help lists commands.",
                Style::default().fg(self.palette.muted),
            )]));

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        let mut all_lines: Vec<Line> = Vec::new();
        for entry in &self.entries {
            all_lines.extend(self.render_entry(entry, inner_area.width));
            all_lines.push(Line::from(""));
        }

        // Bottom-anchored window, shifted up by the scroll offset
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_back = total.saturating_sub(height);
        let back = self.scroll_back.min(max_back);
        let end = total - back;
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current_line.chars().count() + word.chars().count() + 1;
            if current_line.is_empty() || needed <= width {
                if !current_line.is_empty() {
                    current_line.push(' ');
                }
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Theme;

    fn history() -> ConversationHistory {
        ConversationHistory::new(Palette::for_theme(Theme::Dark))
    }

    #[test]
    fn reveal_updates_the_thinking_slot_in_place() {
        let mut history = history();
        history.apply(&SessionEvent::UserTurn(Turn::user("Hello")));
        history.apply(&SessionEvent::Pending);
        assert_eq!(history.entries()[1].text, THINKING_TEXT);

        history.apply(&SessionEvent::Revealing {
            text: "Hi there".into(),
        });
        history.apply(&SessionEvent::Reveal { text: "Hi".into() });
        assert_eq!(history.entries()[1].text, "Hi");
        assert_eq!(history.entries()[1].status, EntryStatus::InProgress);

        history.apply(&SessionEvent::Completed {
            text: "Hi there".into(),
        });
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.last_reply(), Some("Hi there"));
    }

    #[test]
    fn stop_replaces_partial_text() {
        let mut history = history();
        history.apply(&SessionEvent::UserTurn(Turn::user("X")));
        history.apply(&SessionEvent::Pending);
        history.apply(&SessionEvent::Reveal { text: "half".into() });
        history.apply(&SessionEvent::Cancelled {
            partial: Some("half".into()),
        });

        let entry = &history.entries()[1];
        assert_eq!(entry.text, STOPPED_TEXT);
        assert_eq!(entry.status, EntryStatus::Stopped);
        assert_eq!(history.last_reply(), None);
    }

    #[test]
    fn failure_is_shown_as_error_text() {
        let mut history = history();
        history.apply(&SessionEvent::UserTurn(Turn::user("X")));
        history.apply(&SessionEvent::Pending);
        history.apply(&SessionEvent::Failed {
            message: "quota".into(),
        });
        assert_eq!(history.entries()[1].text, "Error: quota");
        assert_eq!(history.entries()[1].status, EntryStatus::Error);
    }

    #[test]
    fn load_turns_rebuilds_view() {
        let mut history = history();
        history.load_turns(&[Turn::user("a"), Turn::model("b")]);
        assert_eq!(history.entries().len(), 2);
        history.apply(&SessionEvent::Cleared);
        assert!(history.entries().is_empty());
    }

    #[test]
    fn wrap_respects_width_and_newlines() {
        assert_eq!(wrap_text("aa bb cc", 5), ["aa bb", "cc"]);
        assert_eq!(wrap_text("one\ntwo", 20), ["one", "two"]);
        assert_eq!(wrap_text("", 10), [""]);
    }

    #[test]
    fn reveal_frames_keep_line_breaks() {
        let mut history = history();
        history.apply(&SessionEvent::UserTurn(Turn::user("list")));
        history.apply(&SessionEvent::Pending);
        history.apply(&SessionEvent::Revealing {
            text: "Steps:\n1. one".into(),
        });
        history.apply(&SessionEvent::Reveal {
            text: "Steps: 1.".into(),
        });
        assert_eq!(history.entries()[1].text, "Steps:\n1.");
    }

    #[test]
    fn reading_back_survives_new_reveal_frames() {
        let mut history = history();
        history.load_turns(&[Turn::user("a"), Turn::model("b")]);
        history.apply(&SessionEvent::UserTurn(Turn::user("c")));
        history.apply(&SessionEvent::Pending);
        history.apply(&SessionEvent::Revealing {
            text: "one two".into(),
        });

        history.scroll_up(3);
        history.apply(&SessionEvent::Reveal { text: "one".into() });
        history.apply(&SessionEvent::Reveal {
            text: "one two".into(),
        });
        history.apply(&SessionEvent::Completed {
            text: "one two".into(),
        });
        assert_eq!(history.scroll_offset(), 3);

        history.apply(&SessionEvent::UserTurn(Turn::user("d")));
        assert_eq!(history.scroll_offset(), 0);
    }

    #[test]
    fn suggestion_highlight_wraps_and_resets_on_send() {
        let mut history = history();
        assert_eq!(history.selected_suggestion(), None);

        history.move_suggestion(-1);
        assert_eq!(history.selected_suggestion(), Some(SUGGESTIONS[3]));
        history.move_suggestion(1);
        assert_eq!(history.selected_suggestion(), Some(SUGGESTIONS[0]));

        history.apply(&SessionEvent::UserTurn(Turn::user(SUGGESTIONS[0])));
        assert_eq!(history.selected_suggestion(), None);
    }
}
