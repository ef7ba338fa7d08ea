use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use teloxide::prelude::*;
use tokio::task::JoinHandle;

use crate::quiz::matcher::TimerPractice;

const TIME_IS_UP_TEXT: &str = "Time is up. Stay with the stillness for a moment before you move on.";

/// Rings the bell for a self-guided session once its time has passed.
pub async fn bell(bot: Bot, chat_id: ChatId, practice: TimerPractice) {
    tokio::time::sleep(Duration::from_secs(u64::from(practice.duration))).await;
    debug!("Timer of {}s finished for chat {}", practice.duration, chat_id.0);

    if let Err(e) = bot.send_message(chat_id, TIME_IS_UP_TEXT).await {
        warn!("Failed to send the end of timer to chat {}: {}", chat_id.0, e);
    }
}

/// Running timers, at most one per chat.
/// Timers live in memory only and don't survive a bot restart.
#[derive(Default)]
pub struct Timers {
    running: Mutex<HashMap<ChatId, JoinHandle<()>>>,
}

impl Timers {
    /// Spawns `task` for the chat unless its timer is still running.
    /// Returns whether a new timer was started.
    pub fn start<F>(&self, chat_id: ChatId, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.lock();
        if running.get(&chat_id).is_some_and(|handle| !handle.is_finished()) {
            debug!("Timer already running for chat {}", chat_id.0);
            return false;
        }
        running.insert(chat_id, tokio::spawn(task));
        true
    }

    /// Stops the chat's timer. Returns whether one was still running.
    pub fn cancel(&self, chat_id: ChatId) -> bool {
        let Some(handle) = self.lock().remove(&chat_id) else {
            return false;
        };
        let was_running = !handle.is_finished();
        handle.abort();
        if was_running {
            debug!("Cancelled the timer of chat {}", chat_id.0);
        }
        was_running
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, JoinHandle<()>>> {
        // The map stays consistent even if a holder panicked
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    const CHAT: ChatId = ChatId(42);

    fn sleeping() -> impl Future<Output = ()> + Send + 'static {
        tokio::time::sleep(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn one_timer_per_chat() {
        let timers = Timers::default();
        assert!(timers.start(CHAT, sleeping()));
        assert!(!timers.start(CHAT, sleeping()));
        assert!(timers.start(ChatId(7), sleeping()));
    }

    #[tokio::test]
    async fn finished_timer_can_be_started_again() {
        let timers = Timers::default();
        assert!(timers.start(CHAT, async {}));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(timers.start(CHAT, sleeping()));
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let timers = Timers::default();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        timers.start(CHAT, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(timers.cancel(CHAT));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(!timers.cancel(CHAT));
    }
}
