//! Request lifecycle scenarios driven through `ChatSession` with scripted
//! generation clients. Time is paused so reveal ticks advance instantly.

use async_trait::async_trait;
use phichat::conversation::{ChatSnapshot, ConversationStore, Turn};
use phichat::error::{ChatError, ChatResult, SubmitError};
use phichat::events::{ExchangeOutcome, LifecycleState, SessionEvent};
use phichat::llm::GenerativeClient;
use phichat::session::ChatSession;
use phichat::storage::{HISTORY_KEY, StorageManager};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(40);

/// Replies with a fixed result and records every conversation it was sent
struct ScriptedClient {
    reply: Result<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedClient {
    fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate(&self, turns: Vec<Turn>, _cancel: CancellationToken) -> ChatResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("lock").push(turns);
        self.reply.clone().map_err(ChatError::Transport)
    }
}

/// Never answers; resolves only when cancelled
struct HangingClient {
    calls: AtomicUsize,
    released: AtomicBool,
}

impl HangingClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl GenerativeClient for HangingClient {
    async fn generate(&self, _turns: Vec<Turn>, cancel: CancellationToken) -> ChatResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        self.released.store(true, Ordering::SeqCst);
        Err(ChatError::CancelledByUser)
    }
}

fn session_with(client: Arc<dyn GenerativeClient>) -> ChatSession {
    ChatSession::new(client, ConversationStore::new(), TICK)
}

async fn let_worker_run() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn hello_is_sanitized_revealed_and_committed() {
    let client = ScriptedClient::ok("Hi **there**");
    let mut session = session_with(client.clone());

    session.submit("Hello").expect("accepted");
    assert_eq!(session.state(), LifecycleState::Pending);

    let events = session.run_until_idle().await;
    assert_eq!(
        events,
        vec![
            SessionEvent::UserTurn(Turn::user("Hello")),
            SessionEvent::Pending,
            SessionEvent::Revealing {
                text: "Hi there".to_string()
            },
            SessionEvent::Reveal {
                text: "Hi".to_string()
            },
            SessionEvent::Reveal {
                text: "Hi there".to_string()
            },
            SessionEvent::Completed {
                text: "Hi there".to_string()
            },
        ]
    );

    assert_eq!(client.calls(), 1);
    assert_eq!(session.state(), LifecycleState::Idle);
    assert_eq!(session.last_outcome(), Some(&ExchangeOutcome::Completed));
    assert_eq!(
        session.conversation().turns(),
        &[Turn::user("Hello"), Turn::model("Hi there")]
    );
}

#[tokio::test(start_paused = true)]
async fn full_conversation_is_sent_as_context() {
    let client = ScriptedClient::ok("reply");
    let mut session = session_with(client.clone());

    session.submit("first").expect("accepted");
    session.run_until_idle().await;
    session.submit("second").expect("accepted");
    session.run_until_idle().await;

    let seen = client.seen.lock().expect("lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], vec![Turn::user("first")]);
    assert_eq!(
        seen[1],
        vec![
            Turn::user("first"),
            Turn::model("reply"),
            Turn::user("second")
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn submissions_while_pending_are_rejected() {
    let client = HangingClient::new();
    let mut session = session_with(client.clone());

    session.submit("one").expect("accepted");
    let_worker_run().await;

    assert_eq!(session.submit("two"), Err(SubmitError::AlreadyBusy));
    assert_eq!(session.submit("three"), Err(SubmitError::AlreadyBusy));
    let_worker_run().await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.conversation().turns(), &[Turn::user("one")]);
    assert_eq!(session.state(), LifecycleState::Pending);

    session.cancel();
}

#[tokio::test(start_paused = true)]
async fn submissions_while_revealing_are_rejected() {
    let client = ScriptedClient::ok("one two three four");
    let mut session = session_with(client.clone());
    session.submit("go").expect("accepted");

    while let Some(event) = session.next_event().await {
        if matches!(event, SessionEvent::Revealing { .. }) {
            break;
        }
    }
    assert_eq!(session.state(), LifecycleState::Revealing);
    assert_eq!(session.submit("again"), Err(SubmitError::AlreadyBusy));

    session.run_until_idle().await;
    assert_eq!(client.calls(), 1);
    assert_eq!(session.conversation().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_before_response_leaves_only_user_turn() {
    let client = HangingClient::new();
    let mut session = session_with(client.clone());

    session.submit("X").expect("accepted");
    assert_eq!(
        session.next_event().await,
        Some(SessionEvent::UserTurn(Turn::user("X")))
    );
    assert_eq!(session.next_event().await, Some(SessionEvent::Pending));
    let_worker_run().await;

    assert!(session.cancel());
    assert_eq!(session.state(), LifecycleState::Idle);
    assert_eq!(session.last_outcome(), Some(&ExchangeOutcome::Cancelled));

    let events = session.run_until_idle().await;
    assert_eq!(events, vec![SessionEvent::Cancelled { partial: None }]);

    // Nothing from the aborted worker surfaces afterwards.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(session.pump().is_empty());
    assert_eq!(session.conversation().turns(), &[Turn::user("X")]);

    // Submission is possible again.
    assert!(session.submit("Y").is_ok());
    session.cancel();
}

#[tokio::test(start_paused = true)]
async fn stop_during_reveal_halts_and_commits_nothing() {
    let client = ScriptedClient::ok("a b c d e f g h");
    let mut session = session_with(client.clone());
    session.submit("go").expect("accepted");

    loop {
        match session.next_event().await {
            Some(SessionEvent::Reveal { text }) if text == "a b" => break,
            Some(_) => continue,
            None => panic!("exchange ended before reveal reached two words"),
        }
    }

    assert!(session.cancel());
    let events = session.run_until_idle().await;
    assert_eq!(
        events,
        vec![SessionEvent::Cancelled {
            partial: Some("a b".to_string())
        }]
    );

    tokio::time::sleep(TICK * 20).await;
    assert!(session.pump().is_empty());
    assert_eq!(session.conversation().turns(), &[Turn::user("go")]);
    assert_eq!(session.last_outcome(), Some(&ExchangeOutcome::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_reported_without_model_turn() {
    let client = ScriptedClient::failing("quota exceeded");
    let mut session = session_with(client);

    session.submit("hi").expect("accepted");
    let events = session.run_until_idle().await;

    assert_eq!(
        events.last(),
        Some(&SessionEvent::Failed {
            message: "quota exceeded".to_string()
        })
    );
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Reveal { .. })));
    assert_eq!(session.conversation().turns(), &[Turn::user("hi")]);
    assert_eq!(
        session.last_outcome(),
        Some(&ExchangeOutcome::Failed("quota exceeded".to_string()))
    );

    // No automatic retry; the user can resubmit.
    assert!(session.submit("hi again").is_ok());
}

#[tokio::test(start_paused = true)]
async fn completed_exchange_is_persisted() {
    let temp = TempDir::new().expect("tempdir");
    let storage = StorageManager::new(temp.path());
    let mut session = ChatSession::new(
        ScriptedClient::ok("Hi **there**"),
        ConversationStore::with_storage(storage.clone()),
        TICK,
    );

    session.submit("Hello").expect("accepted");
    session.run_until_idle().await;
    session.flush().await;

    let snapshot: ChatSnapshot = storage
        .get(HISTORY_KEY)
        .expect("readable")
        .expect("saved");
    assert_eq!(
        snapshot.history,
        vec![Turn::user("Hello"), Turn::model("Hi there")]
    );

    let mut reloaded = ChatSession::new(
        ScriptedClient::ok("unused"),
        ConversationStore::with_storage(storage),
        TICK,
    );
    assert!(reloaded.restore_from_disk());
    assert_eq!(reloaded.conversation().turns(), session.conversation().turns());
}

#[tokio::test(start_paused = true)]
async fn cancelled_exchange_persists_user_turn_but_failure_does_not() {
    let temp = TempDir::new().expect("tempdir");
    let storage = StorageManager::new(temp.path());

    let mut failing = ChatSession::new(
        ScriptedClient::failing("boom"),
        ConversationStore::with_storage(storage.clone()),
        TICK,
    );
    failing.submit("lost").expect("accepted");
    failing.run_until_idle().await;
    failing.flush().await;
    assert!(!storage.contains(HISTORY_KEY));

    let mut cancelled = ChatSession::new(
        HangingClient::new(),
        ConversationStore::with_storage(storage.clone()),
        TICK,
    );
    cancelled.submit("X").expect("accepted");
    let_worker_run().await;
    cancelled.cancel();
    cancelled.flush().await;

    let snapshot: ChatSnapshot = storage
        .get(HISTORY_KEY)
        .expect("readable")
        .expect("saved");
    assert_eq!(snapshot.history, vec![Turn::user("X")]);
}

#[tokio::test(start_paused = true)]
async fn malformed_snapshot_on_load_starts_empty() {
    let temp = TempDir::new().expect("tempdir");
    let storage = StorageManager::new(temp.path());
    storage
        .set_raw(HISTORY_KEY, "{\"history\": [{\"role\": \"user\"")
        .expect("write");

    let mut session = ChatSession::new(
        ScriptedClient::ok("unused"),
        ConversationStore::with_storage(storage),
        TICK,
    );
    assert!(!session.restore_from_disk());
    assert!(session.conversation().is_empty());
    assert_eq!(session.state(), LifecycleState::Idle);
}

#[tokio::test(start_paused = true)]
async fn clear_history_removes_saved_snapshot() {
    let temp = TempDir::new().expect("tempdir");
    let storage = StorageManager::new(temp.path());
    let mut session = ChatSession::new(
        ScriptedClient::ok("ok"),
        ConversationStore::with_storage(storage.clone()),
        TICK,
    );

    session.submit("hi").expect("accepted");
    session.run_until_idle().await;
    session.flush().await;
    assert!(storage.contains(HISTORY_KEY));

    session.clear_history();
    session.flush().await;
    assert_eq!(session.next_event().await, Some(SessionEvent::Cleared));
    assert!(session.conversation().is_empty());
    assert!(!storage.contains(HISTORY_KEY));
}

#[tokio::test(start_paused = true)]
async fn flush_waits_for_cancelled_worker_to_wind_down() {
    let client = HangingClient::new();
    let mut session = session_with(client.clone());

    session.submit("hold on").expect("accepted");
    let_worker_run().await;
    assert!(!client.released.load(Ordering::SeqCst));

    assert!(session.cancel());
    session.flush().await;
    assert!(client.released.load(Ordering::SeqCst));
    assert_eq!(session.state(), LifecycleState::Idle);
}
