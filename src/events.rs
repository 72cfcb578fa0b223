use crate::conversation::Turn;
use serde::{Deserialize, Serialize};

/// Text shown in place of a reply the user stopped
pub const STOPPED_TEXT: &str = "Response stopped.";

/// Placeholder shown while a request is outstanding
pub const THINKING_TEXT: &str = "Thinking...";

/// Where the request lifecycle currently sits.
///
/// `Pending` and `Revealing` are both "busy": submissions are refused, not
/// queued, until the session is back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    /// Waiting on the remote API
    Pending,
    /// Response received, words are being revealed
    Revealing,
}

impl LifecycleState {
    pub fn is_busy(self) -> bool {
        !matches!(self, LifecycleState::Idle)
    }
}

/// Terminal status of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// State transitions emitted by the chat session for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user turn was accepted and appended
    UserTurn(Turn),
    /// The outbound request is in flight
    Pending,
    /// The full response arrived and reveal is starting; `text` is the
    /// sanitized reply that the reveal frames are drawn from
    Revealing { text: String },
    /// Everything revealed so far
    Reveal { text: String },
    /// Reveal finished and the model turn was committed
    Completed { text: String },
    /// The user stopped the exchange; `partial` is what had been revealed
    Cancelled { partial: Option<String> },
    /// The request failed; nothing was committed
    Failed { message: String },
    /// History was wiped
    Cleared,
}

impl SessionEvent {
    /// True for the events that return the session to idle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Completed { .. }
                | SessionEvent::Cancelled { .. }
                | SessionEvent::Failed { .. }
        )
    }
}

/// TUI-specific events (keyboard, paste, resize, redraw)
#[derive(Debug, Clone)]
pub enum TuiEvent {
    Key(crossterm::event::KeyEvent),
    Paste(String),
    Resize(u16, u16),
    Draw,
}

/// Light or dark color scheme, persisted under the theme key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[serde(rename = "light_mode")]
    Light,
    #[default]
    #[serde(rename = "dark_mode")]
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}
