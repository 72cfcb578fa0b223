use crate::events::{LifecycleState, Theme};
use crate::ui::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::{Duration, Instant};

/// How long a notice stays in the status line
const NOTICE_TTL: Duration = Duration::from_secs(4);

const SPINNER: [&str; 4] = [".", "..", "...", "   "];

#[derive(Debug, Clone)]
struct Notice {
    text: String,
    is_error: bool,
    shown_at: Instant,
}

/// One-line status bar under the composer
#[derive(Debug, Clone)]
pub struct StatusLine {
    state: LifecycleState,
    theme: Theme,
    attachment: Option<String>,
    notice: Option<Notice>,
    frame: usize,
}

impl StatusLine {
    pub fn new(theme: Theme) -> Self {
        Self {
            state: LifecycleState::Idle,
            theme,
            attachment: None,
            notice: None,
            frame: 0,
        }
    }

    pub fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn set_attachment(&mut self, summary: Option<String>) {
        self.attachment = summary;
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: true,
            shown_at: Instant::now(),
        });
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }

    /// Advance the busy animation and expire old notices
    pub fn tick(&mut self) {
        if self.state.is_busy() {
            self.frame = self.frame.wrapping_add(1);
        }
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| notice.shown_at.elapsed() >= NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    fn state_span(&self, palette: &Palette) -> Span<'static> {
        let dots = SPINNER[(self.frame / 3) % SPINNER.len()];
        match self.state {
            LifecycleState::Idle => Span::styled("● Ready", Style::default().fg(palette.model)),
            LifecycleState::Pending => Span::styled(
                format!("◌ Waiting for Gemini{dots}"),
                Style::default().fg(palette.accent),
            ),
            LifecycleState::Revealing => Span::styled(
                format!("◍ Replying{dots}"),
                Style::default().fg(palette.accent),
            ),
        }
    }

    pub fn render_with(&self, palette: &Palette, area: Rect, buf: &mut Buffer) {
        let muted = Style::default().fg(palette.muted);
        let mut spans = vec![Span::raw(" "), self.state_span(palette)];

        if let Some(attachment) = &self.attachment {
            spans.push(Span::styled("  │  ", muted));
            spans.push(Span::styled(attachment.clone(), Style::default().fg(palette.text)));
        }

        spans.push(Span::styled("  │  ", muted));
        spans.push(Span::styled(format!("{} theme", self.theme.display_name()), muted));

        if let Some(notice) = &self.notice {
            let style = if notice.is_error {
                Style::default().fg(palette.error).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text)
            };
            spans.push(Span::styled("  │  ", muted));
            spans.push(Span::styled(notice.text.clone(), style));
        }

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

impl Widget for &StatusLine {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.render_with(&Palette::for_theme(self.theme), area, buf);
    }
}
