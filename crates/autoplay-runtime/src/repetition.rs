//! Over-used action detection

use crate::queue::HistoryWindow;
use autoplay_core::ActionToken;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What to do with actions the detector flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepetitionPolicy {
    /// Leave flagged actions out of the next request's allowed set.
    #[default]
    Exclude,
    /// Log flagged actions but keep offering the full set.
    Ignore,
}

#[derive(Debug, Clone)]
pub struct RepetitionDetector {
    threshold: usize,
    policy: RepetitionPolicy,
}

impl RepetitionDetector {
    pub fn new(threshold: usize, policy: RepetitionPolicy) -> Self {
        Self { threshold, policy }
    }

    pub fn policy(&self) -> RepetitionPolicy {
        self.policy
    }

    /// Actions whose count in `history` meets or exceeds the threshold, in
    /// canonical token order.
    pub fn over_used(&self, history: &HistoryWindow) -> Vec<ActionToken> {
        if self.threshold == 0 {
            return Vec::new();
        }
        let mut counts = [0usize; ActionToken::ALL.len()];
        for action in history.iter() {
            counts[action.index()] += 1;
        }
        ActionToken::ALL
            .iter()
            .copied()
            .filter(|a| counts[a.index()] >= self.threshold)
            .collect()
    }

    /// The action set to offer the next enrichment request.
    ///
    /// Never empty: if every action is flagged the full set is offered.
    pub fn allowed_actions(&self, history: &HistoryWindow) -> Vec<ActionToken> {
        let flagged = self.over_used(history);
        if flagged.is_empty() {
            return ActionToken::ALL.to_vec();
        }
        info!("Over-used actions: {:?} ({:?})", flagged, self.policy);
        if self.policy == RepetitionPolicy::Ignore {
            return ActionToken::ALL.to_vec();
        }

        let allowed: Vec<ActionToken> = ActionToken::ALL
            .iter()
            .copied()
            .filter(|a| !flagged.contains(a))
            .collect();
        if allowed.is_empty() {
            ActionToken::ALL.to_vec()
        } else {
            allowed
        }
    }
}
