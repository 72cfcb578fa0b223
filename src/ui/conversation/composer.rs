use crate::ui::Palette;
use crate::ui::conversation::commands::{
    CommandEntry, ParsedCommand, command_entries, parse_slash_command,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Text being edited. The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

impl TextAreaState {
    fn byte_index(&self, cursor: usize) -> usize {
        self.content
            .char_indices()
            .nth(cursor)
            .map(|(index, _)| index)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn insert_str(&mut self, text: &str) {
        let at = self.byte_index(self.cursor);
        self.content.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.content.remove(at);
        true
    }

    fn delete(&mut self) -> bool {
        if self.cursor >= self.char_len() {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.content.remove(at);
        true
    }

    fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.content)
    }
}

/// Message input box with a slash-command palette
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    busy: bool,
    palette: Palette,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>, palette: Palette) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            busy: false,
            palette,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT)
                    || key.modifiers.contains(KeyModifiers::ALT)
                {
                    self.state.insert_str("\n");
                } else if self.show_command_palette
                    && parse_slash_command(&self.state.content).is_none()
                    && self.apply_selected_command()
                {
                    return ComposerResult::None;
                } else if !self.state.content.trim().is_empty() {
                    return self.submit();
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ComposerResult::None;
                }
                self.state.insert_str(c.encode_utf8(&mut [0; 4]));
                if c.is_whitespace() {
                    self.close_command_palette();
                } else {
                    self.sync_command_palette();
                }
            }
            KeyCode::Backspace => {
                if self.state.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.state.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => self.state.cursor = self.state.cursor.saturating_sub(1),
            KeyCode::Right => {
                self.state.cursor = (self.state.cursor + 1).min(self.state.char_len());
            }
            KeyCode::Home => self.state.cursor = 0,
            KeyCode::End => self.state.cursor = self.state.char_len(),
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text at the cursor
    pub fn handle_paste(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        self.state.insert_str(&normalized);
        self.close_command_palette();
    }

    fn submit(&mut self) -> ComposerResult {
        let content = self.state.take();
        self.close_command_palette();
        match parse_slash_command(&content) {
            Some(command) => ComposerResult::Command(command),
            None => ComposerResult::Submitted(content),
        }
    }

    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        let typing_command = content.starts_with('/') && !content.contains(char::is_whitespace);
        if !typing_command {
            self.close_command_palette();
            return;
        }
        if !self.show_command_palette {
            self.show_command_palette = true;
            self.selected_command = Some(0);
        }
        self.refresh_command_palette();
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = match self.filtered_commands.len() {
            0 => None,
            len => Some(self.selected_command.unwrap_or(0).min(len - 1)),
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        let len = self.filtered_commands.len() as isize;
        if len == 0 {
            self.selected_command = None;
            return;
        }
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        self.state.content = format!("/{} ", entry.keyword);
        self.state.cursor = self.state.char_len();
        self.close_command_palette();
        true
    }

    /// Busy changes the title to show that Esc stops the reply
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette
    }

    /// Put text back into the box, cursor at the end
    pub fn set_content(&mut self, text: impl Into<String>) {
        self.state.content = text.into();
        self.state.cursor = self.state.char_len();
        self.close_command_palette();
    }

    pub fn clear(&mut self) {
        self.state.take();
        self.close_command_palette();
    }

    fn title(&self) -> &'static str {
        if self.busy {
            " ⏳ Gemini is replying (Esc to stop) "
        } else {
            " ✏️  Message Gemini (Enter to send, Shift+Enter for a new line) "
        }
    }

    /// Rows needed to show the current text, borders included
    pub fn desired_height(&self, max: u16) -> u16 {
        let lines = self.state.content.split('\n').count().max(1) as u16;
        (lines + 2).clamp(3, max.max(3))
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = if self.busy {
            self.palette.muted
        } else {
            self.palette.accent
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .border_style(Style::default().fg(border));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(self.palette.muted),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            content.insert(self.state.byte_index(self.state.cursor), '▌');

            let lines: Vec<&str> = content.split('\n').collect();
            let height = inner_area.height as usize;
            let skip = lines.len().saturating_sub(height);
            for (i, line_text) in lines.iter().skip(skip).enumerate() {
                let line = Line::from(vec![Span::styled(
                    *line_text,
                    Style::default().fg(self.palette.text),
                )]);
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            let palette_height = (self.filtered_commands.len().min(6) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title(" Commands ")
                .border_style(Style::default().fg(self.palette.accent));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in self.filtered_commands.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.selected_command == Some(index) {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.palette.text)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled("  ", Style::default()),
                    Span::styled(entry.description, Style::default().fg(self.palette.muted)),
                ]);
                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}
