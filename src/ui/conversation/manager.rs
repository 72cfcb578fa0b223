use crate::conversation::Turn;
use crate::events::{LifecycleState, SessionEvent, Theme};
use crate::ui::Palette;
use crate::ui::conversation::commands::{ParsedCommand, SlashCommand, get_help_text};
use crate::ui::conversation::composer::{ComposerResult, ConversationComposer};
use crate::ui::conversation::history::ConversationHistory;
use crate::ui::conversation::status::StatusLine;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Text,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationAction {
    None,
    Submit(String),
    Command(ParsedCommand),
    /// Delete every chat, already confirmed by the user
    ClearHistory,
    Stop,
    Exit,
}

/// Owns the chat widgets and maps input to actions
pub struct ConversationManager {
    history: ConversationHistory,
    composer: ConversationComposer,
    status: StatusLine,
    theme: Theme,
    state: LifecycleState,
    show_help: bool,
    confirm_clear: bool,
}

impl ConversationManager {
    pub fn new(theme: Theme) -> Self {
        let palette = Palette::for_theme(theme);
        Self {
            history: ConversationHistory::new(palette),
            composer: ConversationComposer::new("Enter a prompt here", palette),
            status: StatusLine::new(theme),
            theme,
            state: LifecycleState::Idle,
            show_help: false,
            confirm_clear: false,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn status_mut(&mut self) -> &mut StatusLine {
        &mut self.status
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn is_help_visible(&self) -> bool {
        self.show_help
    }

    pub fn is_confirming_clear(&self) -> bool {
        self.confirm_clear
    }

    pub fn set_theme(&mut self, theme: Theme) {
        let palette = Palette::for_theme(theme);
        self.theme = theme;
        self.history.set_palette(palette);
        self.composer.set_palette(palette);
        self.status.set_theme(theme);
    }

    /// Show saved turns, e.g. after loading history from disk
    pub fn load_turns(&mut self, turns: &[Turn]) {
        self.history.load_turns(turns);
    }

    /// Track the session's state and mirror its transitions
    pub fn apply_event(&mut self, event: &SessionEvent, state: LifecycleState) {
        self.history.apply(event);
        self.set_state(state);
        if let SessionEvent::Failed { message } = event {
            self.status.error(message.clone());
        }
    }

    pub fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
        self.composer.set_busy(state.is_busy());
        self.status.set_state(state);
    }

    pub fn tick(&mut self) {
        self.status.tick();
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.show_help = false;
        self.composer.handle_paste(text);
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if self.show_help {
            self.show_help = false;
            return ConversationAction::None;
        }

        if self.confirm_clear {
            self.confirm_clear = false;
            return match key.code {
                KeyCode::Char('y' | 'Y') | KeyCode::Enter => ConversationAction::ClearHistory,
                _ => {
                    self.status.info("Chats kept");
                    ConversationAction::None
                }
            };
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') if ctrl => return ConversationAction::Exit,
            KeyCode::Char('c') if ctrl => {
                return if self.state.is_busy() {
                    ConversationAction::Stop
                } else if !self.composer.content().is_empty() {
                    self.composer.clear();
                    ConversationAction::None
                } else {
                    ConversationAction::Exit
                };
            }
            KeyCode::Esc if self.state.is_busy() && !self.composer.is_palette_open() => {
                return ConversationAction::Stop;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(5);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(5);
                return ConversationAction::None;
            }
            _ => {}
        }

        if self.suggestions_active() && key.modifiers.is_empty() {
            match key.code {
                KeyCode::Up => {
                    self.history.move_suggestion(-1);
                    return ConversationAction::None;
                }
                KeyCode::Down => {
                    self.history.move_suggestion(1);
                    return ConversationAction::None;
                }
                KeyCode::Enter if !self.state.is_busy() => {
                    if let Some(prompt) = self.history.selected_suggestion() {
                        return ConversationAction::Submit(prompt.to_string());
                    }
                }
                _ => {}
            }
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(input) => {
                if self.state.is_busy() {
                    self.composer.set_content(input);
                    self.status
                        .info("Wait for the reply to finish, or press Esc to stop it");
                    return ConversationAction::None;
                }
                ConversationAction::Submit(input)
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        }
    }

    /// Welcome suggestions take arrow keys only on an empty chat with an
    /// empty composer
    fn suggestions_active(&self) -> bool {
        self.history.entries().is_empty()
            && self.composer.content().is_empty()
            && !self.composer.is_palette_open()
    }

    /// Commands the widgets can answer themselves; the rest go to the app
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::Help => {
                self.show_help = true;
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
            SlashCommand::Stop => ConversationAction::Stop,
            other if self.state.is_busy() && !other.available_while_busy() => {
                self.status
                    .info(format!("/{} is unavailable while Gemini is replying", other.command()));
                ConversationAction::None
            }
            SlashCommand::Clear if self.history.entries().is_empty() => {
                self.status.info("No chats to delete");
                ConversationAction::None
            }
            SlashCommand::Clear => {
                self.confirm_clear = true;
                ConversationAction::None
            }
            _ => ConversationAction::Command(command),
        }
    }

    /// Render the conversation UI components
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.size();
        let palette = Palette::for_theme(self.theme);
        frame.render_widget(
            Block::default().style(Style::default().bg(palette.background)),
            area,
        );

        let composer_height = self.composer.desired_height(area.height / 3);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(composer_height),
                Constraint::Length(1),
            ])
            .split(area);

        frame.render_widget(&self.history, chunks[0]);
        frame.render_widget(&self.composer, chunks[1]);
        frame.render_widget(&self.status, chunks[2]);

        if self.show_help {
            self.render_help(frame, chunks[0], &palette);
        } else if self.confirm_clear {
            self.render_confirm_clear(frame, chunks[0], &palette);
        }
    }

    fn render_confirm_clear(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let width = area.width.min(36);
        let height = area.height.min(3);
        let popup = Rect {
            x: area.x + (area.width.saturating_sub(width)) / 2,
            y: area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        };

        let prompt = Paragraph::new("Delete all chats? (y/n)")
            .style(Style::default().fg(palette.text))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.error)),
            );

        frame.render_widget(Clear, popup);
        frame.render_widget(prompt, popup);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let text = get_help_text();
        let height = (text.lines().count() as u16 + 3).min(area.height);
        let width = area.width.saturating_sub(8).min(90);
        let popup = Rect {
            x: area.x + (area.width.saturating_sub(width)) / 2,
            y: area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        };

        let help = Paragraph::new(Text::raw(text))
            .style(Style::default().fg(palette.text))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Help (any key to close) ")
                    .border_style(Style::default().fg(palette.accent)),
            );

        frame.render_widget(Clear, popup);
        frame.render_widget(help, popup);
    }
}
