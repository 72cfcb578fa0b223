pub mod app;
pub mod attachment;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod llm;
pub mod logging;
pub mod session;
pub mod speech;
pub mod storage;
pub mod streaming;
pub mod ui;

pub use config::Config;
pub use conversation::{ChatSnapshot, ConversationStore, Role, Turn};
pub use error::{ChatError, ChatResult, SubmitError};
pub use events::{ExchangeOutcome, LifecycleState, SessionEvent};
pub use llm::{GeminiClient, GenerativeClient};
pub use session::ChatSession;
