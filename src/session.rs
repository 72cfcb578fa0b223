//! Request lifecycle for one chat session.
//!
//! `Idle -> Pending -> Revealing -> Idle` on success, with `Cancelled` and
//! `Failed` short-circuiting back to `Idle`. Only one exchange is ever in
//! flight; submissions while busy are refused rather than queued.

use crate::conversation::{ConversationStore, Turn};
use crate::error::{ChatError, SubmitError};
use crate::events::{ExchangeOutcome, LifecycleState, SessionEvent};
use crate::llm::{GenerativeClient, sanitize_response};
use crate::streaming::{RevealOutcome, RevealTask};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Progress reported by the exchange worker
#[derive(Debug)]
enum WorkerEvent {
    ResponseReady(String),
    Revealed(String),
    Finished { response: String },
    Failed(String),
    Interrupted,
}

#[derive(Debug)]
struct WorkerMessage {
    exchange: u64,
    event: WorkerEvent,
}

/// The single in-flight exchange
#[derive(Debug)]
struct RequestHandle {
    id: u64,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    revealed: String,
}

/// Session object owned by the composition root
pub struct ChatSession {
    store: ConversationStore,
    client: Arc<dyn GenerativeClient>,
    reveal_interval: Duration,
    state: LifecycleState,
    active: Option<RequestHandle>,
    next_exchange: u64,
    last_outcome: Option<ExchangeOutcome>,
    queued: VecDeque<SessionEvent>,
    /// Cancelled workers still winding down
    retired: Vec<JoinHandle<()>>,
    worker_tx: mpsc::UnboundedSender<WorkerMessage>,
    worker_rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl ChatSession {
    pub fn new(
        client: Arc<dyn GenerativeClient>,
        store: ConversationStore,
        reveal_interval: Duration,
    ) -> Self {
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        Self {
            store,
            client,
            reveal_interval,
            state: LifecycleState::Idle,
            active: None,
            next_exchange: 0,
            last_outcome: None,
            queued: VecDeque::new(),
            retired: Vec::new(),
            worker_tx,
            worker_rx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Whether `next_event` could yield something
    pub fn has_work(&self) -> bool {
        !self.queued.is_empty() || self.active.is_some()
    }

    pub fn last_outcome(&self) -> Option<&ExchangeOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.store
    }

    /// Load saved history. Corrupt or missing history leaves the session empty.
    pub fn restore_from_disk(&mut self) -> bool {
        let restored = self.store.restore_from_storage();
        if restored {
            tracing::info!(turns = self.store.len(), "Loaded saved conversation");
        }
        restored
    }

    /// Accept a user prompt and start the exchange.
    ///
    /// Blank input and input arriving while busy are refused without side
    /// effects.
    pub fn submit(&mut self, input: &str) -> Result<(), SubmitError> {
        let text = input.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring empty submission");
            return Err(SubmitError::EmptySubmission);
        }
        if self.state.is_busy() {
            tracing::debug!(state = ?self.state, "Ignoring submission while busy");
            return Err(SubmitError::AlreadyBusy);
        }

        let turn = Turn::user(text);
        self.store.append(turn.clone());

        self.next_exchange += 1;
        let id = self.next_exchange;
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run_exchange(
            id,
            Arc::clone(&self.client),
            self.store.turns().to_vec(),
            self.reveal_interval,
            cancel.clone(),
            self.worker_tx.clone(),
        ));

        self.active = Some(RequestHandle {
            id,
            cancel,
            worker,
            revealed: String::new(),
        });
        self.state = LifecycleState::Pending;
        tracing::info!(exchange = id, turns = self.store.len(), "Request pending");

        self.queued.push_back(SessionEvent::UserTurn(turn));
        self.queued.push_back(SessionEvent::Pending);
        Ok(())
    }

    /// Stop the in-flight exchange. Returns `false` when there is nothing to stop.
    ///
    /// The request and the reveal both observe the token before the session
    /// reports idle. The user turn stays, no model turn is committed.
    pub fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active.cancel.cancel();
        tracing::info!(exchange = active.id, state = ?self.state, "Exchange cancelled by user");

        let partial = (!active.revealed.is_empty()).then_some(active.revealed);
        self.retired.push(active.worker);
        self.finish(ExchangeOutcome::Cancelled);
        self.store.persist();
        self.queued.push_back(SessionEvent::Cancelled { partial });
        true
    }

    /// Stop anything in flight and wipe history, including the saved copy
    pub fn clear_history(&mut self) {
        self.cancel();
        self.store.clear();
        self.queued.push_back(SessionEvent::Cleared);
        tracing::info!("Conversation cleared");
    }

    /// Next state transition, waiting on the worker if needed.
    ///
    /// Returns `None` once the session is idle and nothing is queued.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(event);
            }
            if self.active.is_none() {
                return None;
            }
            let message = self.worker_rx.recv().await?;
            if let Some(event) = self.apply(message) {
                return Some(event);
            }
        }
    }

    /// Drain every transition available right now without waiting
    pub fn pump(&mut self) -> Vec<SessionEvent> {
        let mut events: Vec<SessionEvent> = self.queued.drain(..).collect();
        while let Ok(message) = self.worker_rx.try_recv() {
            if let Some(event) = self.apply(message) {
                events.push(event);
            }
        }
        events
    }

    /// Collect events until the session is idle again
    pub async fn run_until_idle(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Wait for cancelled workers to observe their token and for any
    /// background history write to land
    pub async fn flush(&mut self) {
        for worker in self.retired.drain(..) {
            if let Err(e) = worker.await {
                tracing::warn!("Exchange worker ended abnormally: {e}");
            }
        }
        self.store.flush().await;
    }

    fn finish(&mut self, outcome: ExchangeOutcome) {
        self.retired.retain(|worker| !worker.is_finished());
        if let Some(active) = self.active.take() {
            self.retired.push(active.worker);
        }
        self.state = LifecycleState::Idle;
        self.last_outcome = Some(outcome);
    }

    fn apply(&mut self, message: WorkerMessage) -> Option<SessionEvent> {
        let active = self.active.as_mut()?;
        if active.id != message.exchange {
            tracing::trace!(exchange = message.exchange, "Dropping event from stale exchange");
            return None;
        }

        match message.event {
            WorkerEvent::ResponseReady(text) => {
                self.state = LifecycleState::Revealing;
                Some(SessionEvent::Revealing { text })
            }
            WorkerEvent::Revealed(text) => {
                active.revealed.clone_from(&text);
                Some(SessionEvent::Reveal { text })
            }
            WorkerEvent::Finished { response } => {
                tracing::info!(exchange = message.exchange, "Exchange completed");
                self.finish(ExchangeOutcome::Completed);
                self.store.append(Turn::model(response.clone()));
                Some(SessionEvent::Completed { text: response })
            }
            WorkerEvent::Failed(error) => {
                tracing::warn!(exchange = message.exchange, "Exchange failed: {error}");
                self.finish(ExchangeOutcome::Failed(error.clone()));
                Some(SessionEvent::Failed { message: error })
            }
            WorkerEvent::Interrupted => {
                // Only reachable if the token fired outside of `cancel`.
                let partial = (!active.revealed.is_empty()).then(|| active.revealed.clone());
                self.finish(ExchangeOutcome::Cancelled);
                self.store.persist();
                Some(SessionEvent::Cancelled { partial })
            }
        }
    }
}

/// Worker for one exchange: request, sanitize, reveal.
async fn run_exchange(
    id: u64,
    client: Arc<dyn GenerativeClient>,
    turns: Vec<Turn>,
    reveal_interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<WorkerMessage>,
) {
    let send = |event: WorkerEvent| {
        let _ = tx.send(WorkerMessage {
            exchange: id,
            event,
        });
    };

    let raw = match client.generate(turns, cancel.clone()).await {
        Ok(raw) => raw,
        Err(ChatError::CancelledByUser) => {
            send(WorkerEvent::Interrupted);
            return;
        }
        Err(err) => {
            send(WorkerEvent::Failed(err.to_string()));
            return;
        }
    };

    if cancel.is_cancelled() {
        send(WorkerEvent::Interrupted);
        return;
    }

    let response = sanitize_response(&raw);
    send(WorkerEvent::ResponseReady(response.clone()));

    let reveal = RevealTask::new(&response, reveal_interval, cancel);
    match reveal
        .run(|text| send(WorkerEvent::Revealed(text.to_string())))
        .await
    {
        RevealOutcome::Completed { .. } => send(WorkerEvent::Finished { response }),
        RevealOutcome::Interrupted { .. } => send(WorkerEvent::Interrupted),
    }
}
