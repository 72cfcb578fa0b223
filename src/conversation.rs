//! Conversation store: the ordered turns of one chat session and their
//! saved snapshot.
//!
//! The turn sequence is the only source of truth. The snapshot still carries
//! a `renderedMarkup` transcript for file compatibility, but it is rebuilt
//! from the turns every time and never read back.

use crate::storage::{HISTORY_KEY, StorageManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Who produced a turn. Serialized with the names the API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Model => "Gemini",
        }
    }
}

/// One message in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TurnRepr")]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Accepts both `{role, text}` and the API's `{role, parts: [{text}]}` shape,
/// so history saved by the browser widget can still be imported.
#[derive(Deserialize)]
#[serde(untagged)]
enum TurnRepr {
    Plain { role: Role, text: String },
    Parts { role: Role, parts: Vec<PartRepr> },
}

#[derive(Deserialize)]
struct PartRepr {
    #[serde(default)]
    text: String,
}

impl From<TurnRepr> for Turn {
    fn from(repr: TurnRepr) -> Self {
        match repr {
            TurnRepr::Plain { role, text } => Turn { role, text },
            TurnRepr::Parts { role, parts } => Turn {
                role,
                text: parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join(""),
            },
        }
    }
}

/// Serialized form of the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub history: Vec<Turn>,
    #[serde(default, alias = "messages")]
    pub rendered_markup: String,
    pub timestamp: DateTime<Utc>,
}

/// Plain-text transcript of `turns`, used for the snapshot's markup field
pub fn render_markup(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role().display_name(), turn.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Ordered sequence of turns, optionally backed by persistent storage
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    rendered_markup: String,
    storage: Option<StorageManager>,
    pending_write: Option<JoinHandle<()>>,
}

impl ConversationStore {
    /// In-memory store with no persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that writes snapshots through `storage`
    pub fn with_storage(storage: StorageManager) -> Self {
        Self {
            storage: Some(storage),
            ..Self::default()
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn rendered_markup(&self) -> &str {
        &self.rendered_markup
    }

    /// Append a turn. Alternation is not enforced; an out-of-order append
    /// is logged and accepted. Appending a model reply to a user turn
    /// completes an exchange and schedules a background save.
    pub fn append(&mut self, turn: Turn) {
        let previous = self.turns.last().map(Turn::role);
        if previous == Some(turn.role()) {
            tracing::warn!(
                role = turn.role().as_str(),
                "Appending two consecutive turns with the same role"
            );
        }

        let completes_exchange = turn.role() == Role::Model && previous == Some(Role::User);
        self.turns.push(turn);
        self.rendered_markup = render_markup(&self.turns);

        if completes_exchange {
            self.persist();
        }
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            history: self.turns.clone(),
            rendered_markup: render_markup(&self.turns),
            timestamp: Utc::now(),
        }
    }

    /// Replace the in-memory turns with a prior snapshot
    pub fn restore(&mut self, snapshot: ChatSnapshot) {
        self.turns = snapshot.history;
        self.rendered_markup = render_markup(&self.turns);
        tracing::debug!(turns = self.turns.len(), saved_at = %snapshot.timestamp, "Restored conversation");
    }

    /// Restore from raw persisted text. A malformed snapshot is logged and
    /// leaves the store empty; it never propagates.
    pub fn restore_json(&mut self, raw: &str) -> bool {
        match serde_json::from_str::<ChatSnapshot>(raw) {
            Ok(snapshot) => {
                self.restore(snapshot);
                true
            }
            Err(err) => {
                tracing::warn!("Error loading chat history: {err}");
                self.turns.clear();
                self.rendered_markup.clear();
                false
            }
        }
    }

    /// Restore from the attached storage, treating corruption as "no history"
    pub fn restore_from_storage(&mut self) -> bool {
        let Some(storage) = self.storage.as_ref() else {
            return false;
        };

        match storage.get_raw(HISTORY_KEY) {
            Ok(Some(raw)) => self.restore_json(&raw),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!("Could not read saved history: {err}");
                false
            }
        }
    }

    /// Empty the sequence and delete any saved snapshot
    pub fn clear(&mut self) {
        self.turns.clear();
        self.rendered_markup.clear();

        let Some(storage) = self.storage.clone() else {
            return;
        };

        match self.pending_write.take() {
            // A queued write must not resurrect the history after removal.
            Some(previous) => {
                self.pending_write = Some(tokio::spawn(async move {
                    let _ = previous.await;
                    remove_history(&storage);
                }));
            }
            None => remove_history(&storage),
        }
    }

    /// Schedule a best-effort background save of the current snapshot.
    ///
    /// Writes are chained so that the most recently scheduled one lands last.
    pub fn persist(&mut self) {
        let Some(storage) = self.storage.clone() else {
            return;
        };

        let content = match serde_json::to_string_pretty(&self.snapshot()) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Could not serialize chat history: {err}");
                return;
            }
        };

        let previous = self.pending_write.take();
        self.pending_write = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            match storage.set_raw_async(HISTORY_KEY, content).await {
                Ok(()) => tracing::debug!("Saved chat history"),
                Err(err) => tracing::warn!("Could not save chat history: {err}"),
            }
        }));
    }

    /// Wait for the last scheduled write to land
    pub async fn flush(&mut self) {
        if let Some(pending) = self.pending_write.take() {
            let _ = pending.await;
        }
    }
}

fn remove_history(storage: &StorageManager) {
    match storage.remove(HISTORY_KEY) {
        Ok(()) => tracing::debug!("Removed saved chat history"),
        Err(err) => tracing::warn!("Could not remove saved chat history: {err}"),
    }
}
