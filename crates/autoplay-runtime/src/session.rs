//! State shared between the tick loop and background requests

use crate::context::ConversationContext;
use crate::queue::{ActionQueue, IntentQueue};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Audience suggestions folded into the next enrichment request.
///
/// Suggestions are only cleared once an exchange that saw them succeeds, so a
/// failed request does not lose them.
#[derive(Debug, Default)]
pub struct SuggestionBox {
    pending: std::sync::Mutex<Vec<String>>,
}

impl SuggestionBox {
    pub fn push(&self, suggestion: impl Into<String>) {
        let suggestion = suggestion.into();
        let suggestion = suggestion.trim();
        if suggestion.is_empty() {
            return;
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(suggestion.to_string());
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.pending.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Remove the first `n` suggestions, i.e. those a request has consumed.
    pub fn clear_taken(&self, n: usize) {
        if let Ok(mut pending) = self.pending.lock() {
            let n = n.min(pending.len());
            pending.drain(..n);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queues and context reachable from spawned tasks. Each field has its own lock
/// and no code path holds two at once.
pub struct SharedSession {
    pub actions: Mutex<ActionQueue>,
    pub intents: Mutex<IntentQueue>,
    pub context: Mutex<ConversationContext>,
    pub suggestions: SuggestionBox,
}

impl SharedSession {
    pub fn new(context: ConversationContext) -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(ActionQueue::new()),
            intents: Mutex::new(IntentQueue::new()),
            context: Mutex::new(context),
            suggestions: SuggestionBox::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_clear_only_what_was_taken() {
        let box_ = SuggestionBox::default();
        box_.push("go left");
        box_.push("   ");
        box_.push("talk to the old man");
        let taken = box_.snapshot();
        assert_eq!(taken.len(), 2);

        box_.push("open the menu");
        box_.clear_taken(taken.len());
        assert_eq!(box_.snapshot(), vec!["open the menu".to_string()]);

        box_.clear_taken(10);
        assert!(box_.is_empty());
    }
}
