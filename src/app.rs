//! Interactive terminal chat: wires the session to the widgets and runs the
//! event loop.

use crate::attachment::AttachmentPreview;
use crate::clipboard::ClipboardHandle;
use crate::config::{API_KEY_ENV, Config};
use crate::conversation::ConversationStore;
use crate::error::SubmitError;
use crate::events::{SessionEvent, TuiEvent};
use crate::llm::GeminiClient;
use crate::session::ChatSession;
use crate::speech::{Speaker, SpeechToggle};
use crate::storage::StorageManager;
use crate::ui::conversation::{ConversationAction, ConversationManager, ParsedCommand, SlashCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{
        DisableBracketedPaste, EnableBracketedPaste, Event, EventStream,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
        supports_keyboard_enhancement,
    },
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const TICK_RATE: Duration = Duration::from_millis(100);

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize terminal
fn init_terminal() -> Result<(Tui, bool)> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;

    // Lets Shift+Enter arrive as its own key on terminals that support it
    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
    }

    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok((terminal, enhanced))
}

/// Restore terminal
fn restore_terminal(terminal: &mut Tui, enhanced: bool) -> Result<()> {
    if enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Everything the interactive chat owns
pub struct App {
    session: ChatSession,
    ui: ConversationManager,
    storage: StorageManager,
    speaker: Speaker,
    clipboard: ClipboardHandle,
    attachment: Option<AttachmentPreview>,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let storage = StorageManager::new(&config.data_dir);
        storage
            .ensure_directories()
            .context("Failed to prepare data directory")?;

        let client = GeminiClient::new(config)?;
        let store = ConversationStore::with_storage(storage.clone());
        let mut session = ChatSession::new(Arc::new(client), store, config.reveal_interval());
        session.restore_from_disk();

        let mut ui = ConversationManager::new(storage.load_theme());
        ui.load_turns(session.conversation().turns());
        if !config.has_api_key() {
            ui.status_mut().error(format!(
                "No API key: set {API_KEY_ENV} or api_key in config.toml"
            ));
        }

        Ok(Self {
            session,
            ui,
            storage,
            speaker: Speaker::new(),
            clipboard: ClipboardHandle::new(),
            attachment: None,
            should_quit: false,
        })
    }

    /// Take over the terminal until the user quits
    pub async fn run(&mut self) -> Result<()> {
        let (mut terminal, enhanced) = init_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        let restored = restore_terminal(&mut terminal, enhanced);

        self.speaker.stop();
        self.session.flush().await;
        result.and(restored)
    }

    async fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        let mut events = EventStream::new();
        let mut tick = tokio::time::interval(TICK_RATE);

        while !self.should_quit {
            terminal.draw(|frame| self.ui.render(frame))?;

            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(event)) => {
                        if let Some(event) = translate(event) {
                            self.handle_tui_event(event).await;
                        }
                    }
                    Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                    None => break,
                },
                Some(event) = self.session.next_event(), if self.session.has_work() => {
                    self.on_session_event(event);
                }
                _ = tick.tick() => self.ui.tick(),
            }
        }

        Ok(())
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        self.ui.apply_event(&event, self.session.state());
    }

    async fn handle_tui_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::Key(key) => {
                let action = self.ui.handle_key(key);
                self.handle_action(action).await;
            }
            TuiEvent::Paste(text) => self.ui.handle_paste(&text),
            TuiEvent::Resize(..) | TuiEvent::Draw => {}
        }
    }

    async fn handle_action(&mut self, action: ConversationAction) {
        match action {
            ConversationAction::None => {}
            ConversationAction::Submit(text) => self.submit(&text),
            ConversationAction::Command(command) => self.handle_command(command).await,
            ConversationAction::ClearHistory => {
                self.session.clear_history();
                self.ui.set_state(self.session.state());
                self.ui.status_mut().info("All chats deleted");
            }
            ConversationAction::Stop => self.stop(),
            ConversationAction::Exit => {
                self.session.cancel();
                self.should_quit = true;
            }
        }
    }

    fn submit(&mut self, text: &str) {
        match self.session.submit(text) {
            Ok(()) => {
                // The preview belongs to the prompt just sent
                if let Some(attachment) = self.attachment.take() {
                    tracing::debug!(file = %attachment.file_name, "Attachment released after send");
                    self.ui.status_mut().set_attachment(None);
                }
            }
            Err(SubmitError::EmptySubmission) => {}
            Err(SubmitError::AlreadyBusy) => {
                self.ui.status_mut().info("Gemini is still replying");
            }
        }
    }

    fn stop(&mut self) {
        if self.session.cancel() {
            self.ui.set_state(self.session.state());
        }
    }

    async fn handle_command(&mut self, command: ParsedCommand) {
        match command.command {
            // Answered by ConversationManager before reaching here
            SlashCommand::Stop | SlashCommand::Bye | SlashCommand::Help | SlashCommand::Clear => {}
            SlashCommand::Theme => self.toggle_theme(),
            SlashCommand::Copy => self.copy(command.argument()).await,
            SlashCommand::Speak => self.speak(),
            SlashCommand::Attach => self.attach(command.argument()).await,
            SlashCommand::Detach => {
                self.attachment = None;
                self.ui.status_mut().set_attachment(None);
                self.ui.status_mut().info("Attachment removed");
            }
        }
    }

    fn toggle_theme(&mut self) {
        let theme = self.ui.theme().toggle();
        self.ui.set_theme(theme);
        match self.storage.save_theme(theme) {
            Ok(()) => self
                .ui
                .status_mut()
                .info(format!("Switched to {} theme", theme.display_name())),
            Err(e) => {
                tracing::warn!("Failed to save theme: {e}");
                self.ui.status_mut().error("Theme changed but could not be saved");
            }
        }
    }

    async fn copy(&mut self, argument: Option<&str>) {
        let text = match argument {
            Some("all") => Some(self.session.conversation().rendered_markup().to_string()),
            Some("attachment") => match &self.attachment {
                Some(attachment) => match attachment.data_url().await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        self.ui.status_mut().error(format!("{e:#}"));
                        return;
                    }
                },
                None => None,
            },
            _ => self.ui.history().last_reply().map(str::to_string),
        };
        let Some(text) = text.filter(|text| !text.is_empty()) else {
            self.ui.status_mut().info("Nothing to copy yet");
            return;
        };

        match self.clipboard.copy(&text) {
            Ok(()) => self.ui.status_mut().info("Copied to clipboard"),
            Err(e) => self.ui.status_mut().error(format!("{e:#}")),
        }
    }

    fn speak(&mut self) {
        let text = self.ui.history().last_reply().unwrap_or_default().to_string();
        match self.speaker.toggle(&text) {
            Ok(SpeechToggle::Started) => self.ui.status_mut().info("Reading aloud (/speak to stop)"),
            Ok(SpeechToggle::Stopped) => self.ui.status_mut().info("Stopped reading"),
            Err(e) => self.ui.status_mut().error(format!("{e:#}")),
        }
    }

    async fn attach(&mut self, argument: Option<&str>) {
        let Some(raw) = argument else {
            self.ui.status_mut().info("Usage: /attach <path>");
            return;
        };

        match AttachmentPreview::load(expand_home(raw)).await {
            Ok(preview) => {
                tracing::info!(file = %preview.file_name, mime = preview.mime_type, "Attached file");
                self.ui.status_mut().set_attachment(Some(preview.summary()));
                self.attachment = Some(preview);
            }
            Err(e) => self.ui.status_mut().error(format!("{e:#}")),
        }
    }
}

fn translate(event: Event) -> Option<TuiEvent> {
    match event {
        Event::Key(key) => Some(TuiEvent::Key(key)),
        Event::Paste(text) => Some(TuiEvent::Paste(text)),
        Event::Resize(width, height) => Some(TuiEvent::Resize(width, height)),
        Event::FocusGained => Some(TuiEvent::Draw),
        Event::FocusLost | Event::Mouse(_) => None,
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

/// Run the interactive chat
pub async fn run(config: Config) -> Result<()> {
    let mut app = App::new(&config)?;
    app.run().await
}
