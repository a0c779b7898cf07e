//! Pending actions, executed-action history, and pending intents

use autoplay_core::ActionToken;
use std::collections::VecDeque;

/// FIFO of actions waiting to be applied. Enrichment results append to the back;
/// only the tick loop removes from the front.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    pending: VecDeque<ActionToken>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: ActionToken) {
        self.pending.push_back(action);
    }

    pub fn extend(&mut self, actions: impl IntoIterator<Item = ActionToken>) {
        self.pending.extend(actions);
    }

    pub fn pop_front(&mut self) -> Option<ActionToken> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ActionToken> {
        self.pending.iter().copied().collect()
    }
}

/// Ring buffer of the most recently executed actions. Oldest entries go first.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    capacity: usize,
    recent: VecDeque<ActionToken>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, action: ActionToken) {
        if self.capacity == 0 {
            return;
        }
        while self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(action);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = ActionToken> + '_ {
        self.recent.iter().copied()
    }
}

/// FIFO of narrative strings waiting to be spoken.
#[derive(Debug, Clone, Default)]
pub struct IntentQueue {
    pending: VecDeque<String>,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, intent: impl Into<String>) {
        self.pending.push_back(intent.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }
}
