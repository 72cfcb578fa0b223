//! Conversation UI components for the chat screen

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod status;

pub use commands::{ParsedCommand, SlashCommand, get_help_text, parse_slash_command};
pub use composer::{ComposerResult, ConversationComposer};
pub use history::{ConversationHistory, DisplayEntry, EntryStatus, SUGGESTIONS};
pub use manager::{ConversationAction, ConversationManager};
pub use status::StatusLine;
