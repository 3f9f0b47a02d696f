//! Countdown for the open question
//!
//! One task per question drives both the per-tick countdown and the deadline.
//! Every event it emits carries the question index it was started for, so the
//! coordinator can discard firings from a question that is no longer current.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::RoomEvent;

/// Handle to the running countdown; dropping it cancels the task
#[derive(Debug)]
pub struct QuestionTimer {
    question_index: usize,
    task: JoinHandle<()>,
}

impl QuestionTimer {
    pub fn start(
        question_index: usize,
        duration: Duration,
        tick: Duration,
        events: mpsc::WeakSender<RoomEvent>,
    ) -> Self {
        let task = tokio::spawn(run(question_index, duration, tick, events));
        Self {
            question_index,
            task,
        }
    }

    pub fn question_index(&self) -> usize {
        self.question_index
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Whole seconds left, rounded so a slightly late tick still reads as the expected second
fn whole_seconds(remaining: Duration) -> u64 {
    ((remaining.as_millis() + 500) / 1000) as u64
}

async fn emit(events: &mpsc::WeakSender<RoomEvent>, event: RoomEvent) -> bool {
    match events.upgrade() {
        Some(sender) => sender.send(event).await.is_ok(),
        None => false,
    }
}

async fn run(
    question_index: usize,
    duration: Duration,
    tick: Duration,
    events: mpsc::WeakSender<RoomEvent>,
) {
    let started = Instant::now();
    let deadline = tokio::time::sleep_until(started + duration);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval_at(started + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = &mut deadline => {
                if emit(&events, RoomEvent::TimerTick { question_index, remaining: 0 }).await {
                    emit(&events, RoomEvent::TimerExpired { question_index }).await;
                }
                return;
            }

            _ = ticker.tick() => {
                let remaining = whole_seconds(duration.saturating_sub(started.elapsed()));
                if remaining == 0 {
                    // The deadline branch reports zero
                    continue;
                }
                if !emit(&events, RoomEvent::TimerTick { question_index, remaining }).await {
                    return;
                }
            }
        }
    }
}
