//! Error types for the chat core.

use thiserror::Error;

/// Errors produced while running a chat exchange or touching saved history.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Submission was blank after trimming.
    #[error("empty submission")]
    EmptySubmission,

    /// A request or reveal is already in progress.
    #[error("a response is already in progress")]
    AlreadyBusy,

    /// The user stopped the exchange.
    #[error("response generation stopped")]
    CancelledByUser,

    /// The remote API could not be reached or returned an error payload.
    #[error("{0}")]
    Transport(String),

    /// Saved history could not be parsed.
    #[error("saved history is corrupt: {0}")]
    PersistenceCorrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

/// Reasons a submission is refused without starting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("empty submission")]
    EmptySubmission,
    #[error("a response is already in progress")]
    AlreadyBusy,
}

impl From<SubmitError> for ChatError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::EmptySubmission => ChatError::EmptySubmission,
            SubmitError::AlreadyBusy => ChatError::AlreadyBusy,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
