//! Simulated typing for a reply that has already arrived in full.
//!
//! There is no network streaming here: the whole text is known up front and
//! [`RevealTask`] hands it out one word per tick.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default pause between revealed words
pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(40);

/// How a reveal ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Every word was shown
    Completed { text: String },
    /// Stopped early; `partial` stays on screen
    Interrupted { partial: String },
}

/// Cooperative word-by-word reveal.
///
/// The cancellation token is checked before every tick, so a stop request
/// lands within one interval and never in the middle of a tick.
#[derive(Debug)]
pub struct RevealTask {
    tokens: VecDeque<String>,
    revealed: String,
    interval: Duration,
    cancel: CancellationToken,
}

impl RevealTask {
    pub fn new(text: &str, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            tokens: text.split_whitespace().map(str::to_string).collect(),
            revealed: String::new(),
            interval,
            cancel,
        }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }

    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    pub fn is_finished(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reveal the next word. Returns `false` once nothing is left.
    pub fn step(&mut self) -> bool {
        let Some(token) = self.tokens.pop_front() else {
            return false;
        };
        if !self.revealed.is_empty() {
            self.revealed.push(' ');
        }
        self.revealed.push_str(&token);
        true
    }

    fn interrupted(self) -> RevealOutcome {
        tracing::debug!(remaining = self.tokens.len(), "Reveal interrupted");
        RevealOutcome::Interrupted {
            partial: self.revealed,
        }
    }

    /// Drive the reveal to the end, calling `on_tick` with the full revealed
    /// text after each word.
    pub async fn run<F>(mut self, mut on_tick: F) -> RevealOutcome
    where
        F: FnMut(&str),
    {
        // interval_at panics on a zero period
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.cancel.is_cancelled() {
                return self.interrupted();
            }
            if self.is_finished() {
                return RevealOutcome::Completed {
                    text: self.revealed,
                };
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.interrupted(),
                _ = ticker.tick() => {}
            }

            if self.cancel.is_cancelled() {
                return self.interrupted();
            }
            self.step();
            on_tick(&self.revealed);
        }
    }
}

/// The stretch of `full` that a reveal frame covers, with the original
/// line breaks and spacing kept.
///
/// Frames join words with single spaces, so only the word count is taken
/// from `frame`.
pub fn reveal_prefix<'a>(full: &'a str, frame: &str) -> &'a str {
    let words = frame.split_whitespace().count();
    if words == 0 {
        return "";
    }

    let mut seen = 0;
    let mut in_word = false;
    for (idx, ch) in full.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                seen += 1;
                if seen == words {
                    return &full[..idx];
                }
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    full.trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_join_words_with_single_spaces() {
        let mut task = RevealTask::new(
            "Hi   there\nfriend",
            DEFAULT_REVEAL_INTERVAL,
            CancellationToken::new(),
        );
        assert_eq!(task.remaining(), 3);

        let mut frames = Vec::new();
        while task.step() {
            frames.push(task.revealed().to_string());
        }
        assert_eq!(frames, ["Hi", "Hi there", "Hi there friend"]);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn run_reports_each_frame_then_completes() {
        let task = RevealTask::new("Hi there", DEFAULT_REVEAL_INTERVAL, CancellationToken::new());
        let mut frames = Vec::new();

        let outcome = task.run(|text| frames.push(text.to_string())).await;

        assert_eq!(frames, ["Hi", "Hi there"]);
        assert_eq!(
            outcome,
            RevealOutcome::Completed {
                text: "Hi there".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_word_waits_one_interval() {
        let start = Instant::now();
        let task = RevealTask::new("one", Duration::from_millis(40), CancellationToken::new());
        let mut first_at = None;

        task.run(|_| {
            if first_at.is_none() {
                first_at = Some(Instant::now());
            }
        })
        .await;

        let elapsed = first_at.expect("ticked") - start;
        assert!(elapsed >= Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_completes_immediately() {
        let task = RevealTask::new("   ", DEFAULT_REVEAL_INTERVAL, CancellationToken::new());
        let mut ticks = 0;
        let outcome = task.run(|_| ticks += 1).await;
        assert_eq!(ticks, 0);
        assert_eq!(
            outcome,
            RevealOutcome::Completed {
                text: String::new()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_reveal_keeps_partial_text() {
        let cancel = CancellationToken::new();
        let task = RevealTask::new("a b c d e", DEFAULT_REVEAL_INTERVAL, cancel.clone());

        let mut frames = Vec::new();
        let outcome = task
            .run(|text| {
                frames.push(text.to_string());
                if frames.len() == 2 {
                    cancel.cancel();
                }
            })
            .await;

        assert_eq!(frames, ["a", "a b"]);
        assert_eq!(
            outcome,
            RevealOutcome::Interrupted {
                partial: "a b".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_reveals_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let task = RevealTask::new("a b", DEFAULT_REVEAL_INTERVAL, cancel);
        let mut ticks = 0;
        let outcome = task.run(|_| ticks += 1).await;
        assert_eq!(ticks, 0);
        assert_eq!(
            outcome,
            RevealOutcome::Interrupted {
                partial: String::new()
            }
        );
    }

    #[test]
    fn prefix_keeps_line_breaks_of_the_full_reply() {
        let full = "Steps:\n1. one\n\n2.  two";
        assert_eq!(reveal_prefix(full, ""), "");
        assert_eq!(reveal_prefix(full, "Steps:"), "Steps:");
        assert_eq!(reveal_prefix(full, "Steps: 1. one"), "Steps:\n1. one");
        assert_eq!(reveal_prefix(full, "Steps: 1. one 2."), "Steps:\n1. one\n\n2.");
        assert_eq!(reveal_prefix(full, "Steps: 1. one 2. two"), full);
    }
}
