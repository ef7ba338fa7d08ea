//! Persistent holder of one [`QuizState`].
//!
//! The state lives in memory and is written through to a [`KeyValueStore`]
//! after every change, together with its generation. Loading never fails: a
//! missing or unreadable value starts the quiz over.

#[cfg(test)]
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

use log::{debug, warn};

use super::{sequencer, Answer, QuizPatch, QuizState};
use crate::error::StoreError;

/// Key under which quiz state is persisted. The bot suffixes it with the chat id.
pub const QUIZ_STATE_KEY: &str = "quiz_state";

pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

/// Process-local store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// What is persisted under a quiz key: the state plus the generation it was
/// written at, so every handle opened on the key agrees on the generation.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct StoredQuiz {
    #[serde(default)]
    generation: u64,
    #[serde(flatten)]
    state: QuizState,
}

pub struct QuizStore<K: KeyValueStore> {
    backend: K,
    key: String,
    state: QuizState,
    // Bumped on every change; lets late catalog answers detect they are stale.
    generation: u64,
}

impl<K: KeyValueStore> QuizStore<K> {
    pub fn open(backend: K, key: impl Into<String>) -> Self {
        let key = key.into();
        let stored = load_stored(&backend, &key).unwrap_or_default();
        Self {
            backend,
            key,
            state: stored.state,
            generation: stored.generation,
        }
    }

    /// Picks up whatever another handle on the same key has written since.
    /// Keeps the in-memory state when the backend has nothing readable.
    pub fn refresh(&mut self) {
        if let Some(stored) = load_stored(&self.backend, &self.key) {
            self.state = stored.state;
            self.generation = stored.generation;
        }
    }

    pub fn get(&self) -> &QuizState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set(&mut self, patch: QuizPatch) {
        let before = self.state.clone();
        sequencer::apply(&mut self.state, patch);
        if self.state != before {
            self.commit();
        }
    }

    /// Back to the empty state. Always rewrites the persisted value.
    pub fn reset(&mut self) {
        self.state = QuizState::default();
        self.commit();
    }

    pub fn answer(&mut self, answer: Answer) {
        let patch = sequencer::answer_patch(&self.state, answer);
        self.set(patch);
    }

    pub fn go_next(&mut self) {
        let step = sequencer::next_step(&self.state);
        self.set(QuizPatch {
            step: Some(step),
            ..QuizPatch::default()
        });
    }

    pub fn go_back(&mut self) {
        let step = sequencer::previous_step(&self.state);
        self.set(QuizPatch {
            step: Some(step),
            ..QuizPatch::default()
        });
    }

    /// Whether nothing changed since `generation` was read, through this
    /// handle or any other one on the same key.
    pub fn is_current(&mut self, generation: u64) -> bool {
        self.refresh();
        generation == self.generation
    }

    /// Applies `answer` only if nothing changed since `generation` was read,
    /// through this handle or any other one on the same key.
    /// Returns whether it was applied.
    pub fn answer_if_current(&mut self, generation: u64, answer: Answer) -> bool {
        if !self.is_current(generation) {
            debug!(
                "Dropping stale answer for {} (generation {} < {})",
                self.key, generation, self.generation
            );
            return false;
        }
        self.answer(answer);
        true
    }

    fn commit(&mut self) {
        self.generation += 1;
        debug!(
            "{}: step {}/{} (generation {})",
            self.key, self.state.step, self.state.max_step, self.generation
        );

        let stored = StoredQuiz {
            generation: self.generation,
            state: self.state.clone(),
        };
        let serialized = match serde_json::to_string(&stored) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!("Failed to serialize quiz state for {}: {}", self.key, e);
                return;
            }
        };
        // Persistence is best effort, the in-memory state stays authoritative
        if let Err(e) = self.backend.save(&self.key, &serialized) {
            warn!("Failed to persist quiz state for {}: {}", self.key, e);
        }
    }
}

fn load_stored<K: KeyValueStore>(backend: &K, key: &str) -> Option<StoredQuiz> {
    let raw = match backend.load(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!("Failed to load quiz state for {}: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str::<StoredQuiz>(&raw) {
        Ok(mut stored) => {
            // Re-derive max_step so a hand-edited or outdated value can't break step <= max_step
            sequencer::apply(&mut stored.state, QuizPatch::default());
            Some(stored)
        }
        Err(e) => {
            warn!("Discarding malformed quiz state for {}: {}", key, e);
            None
        }
    }
}
