use crate::config::{API_KEY_ENV, Config};
use crate::conversation::ConversationStore;
use crate::error::ChatError;
use crate::events::{STOPPED_TEXT, SessionEvent};
use crate::llm::GeminiClient;
use crate::session::ChatSession;
use crate::storage::{HISTORY_KEY, StorageManager};
use crate::streaming::reveal_prefix;
use anyhow::{Context, Result, anyhow, bail};
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

/// Send one prompt and print the reply as it is revealed.
///
/// With `resume`, saved history is sent as context and the exchange is
/// saved back; otherwise nothing touches disk.
pub async fn ask(config: &Config, prompt: &str, resume: bool) -> Result<()> {
    if !config.has_api_key() {
        bail!("No API key configured. Set {API_KEY_ENV} or add api_key to config.toml.");
    }

    let client = GeminiClient::new(config)?;
    let store = if resume {
        ConversationStore::with_storage(StorageManager::new(&config.data_dir))
    } else {
        ConversationStore::new()
    };
    let mut session = ChatSession::new(Arc::new(client), store, config.reveal_interval());
    if resume {
        session.restore_from_disk();
    }

    session
        .submit(prompt)
        .map_err(ChatError::from)
        .context("Nothing to send")?;

    let mut stdout = io::stdout();
    relay_exchange(&mut session, &mut stdout, tokio::signal::ctrl_c()).await
}

/// Write the reply to `out` as it is revealed, keeping its line breaks.
///
/// `stop` resolving cancels the exchange. Returns once the session is idle
/// and its writes have landed.
pub async fn relay_exchange<W, S>(session: &mut ChatSession, out: &mut W, stop: S) -> Result<()>
where
    W: Write,
    S: Future,
{
    let mut full = String::new();
    let mut printed = 0;
    let mut failure = None;
    let mut stop_requested = false;
    tokio::pin!(stop);

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Revealing { text } => full = text,
                    SessionEvent::Reveal { text } => {
                        let shown = reveal_prefix(&full, &text);
                        write!(out, "{}", shown.get(printed..).unwrap_or_default())?;
                        out.flush()?;
                        printed = shown.len();
                    }
                    SessionEvent::Completed { text } => {
                        write!(out, "{}", text.get(printed..).unwrap_or_default())?;
                        if !text.is_empty() {
                            writeln!(out)?;
                        }
                        out.flush()?;
                    }
                    SessionEvent::Cancelled { .. } => {
                        if printed > 0 {
                            writeln!(out)?;
                        }
                        eprintln!("{STOPPED_TEXT}");
                    }
                    SessionEvent::Failed { message } => failure = Some(message),
                    _ => {}
                }
            }
            _ = &mut stop, if !stop_requested => {
                stop_requested = true;
                session.cancel();
            }
        }
    }

    session.flush().await;

    match failure {
        Some(message) => Err(anyhow!("Error: {message}")),
        None => Ok(()),
    }
}

/// Print the saved conversation
pub fn show_history(config: &Config) -> Result<()> {
    let mut store = ConversationStore::with_storage(StorageManager::new(&config.data_dir));
    if !store.restore_from_storage() || store.is_empty() {
        println!("No saved conversation. Run 'phichat' to start one!");
        return Ok(());
    }

    println!("💬 Saved conversation ({} turns)", store.len());
    println!("{}", "=".repeat(50));
    for turn in store.turns() {
        println!("{}:", turn.role().display_name());
        for line in turn.text().lines() {
            println!("  {line}");
        }
        println!();
    }

    Ok(())
}

/// Delete the saved conversation
pub fn clear_history(config: &Config) -> Result<()> {
    let storage = StorageManager::new(&config.data_dir);
    if !storage.contains(HISTORY_KEY) {
        println!("No saved conversation to delete.");
        return Ok(());
    }

    storage
        .remove(HISTORY_KEY)
        .context("Failed to delete saved conversation")?;
    println!("🗑️  Saved conversation deleted.");
    Ok(())
}
