//! Two-line reply grammar
//!
//! ```text
//! reply   := narrative "\n" actions ("\n" ignored)*
//! actions := token ("," token)*
//! ```
//!
//! Lines are trimmed and blank ones, whitespace-only included, are skipped. Tokens are compared with
//! interior whitespace removed and case folded; anything outside the closed
//! action set is dropped, never replaced.

use autoplay_core::ActionToken;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub narrative: String,
    pub actions: Vec<ActionToken>,
    /// Tokens on the action line that were not recognised.
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty reply")]
    Empty,

    #[error("reply has no action line")]
    MissingActionLine { narrative: String },
}

impl ParseError {
    /// Narrative recovered from a malformed reply, if any.
    pub fn narrative(&self) -> Option<&str> {
        match self {
            ParseError::Empty => None,
            ParseError::MissingActionLine { narrative } => Some(narrative),
        }
    }
}

pub fn parse_reply(raw: &str) -> Result<ParsedReply, ParseError> {
    let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(narrative) = lines.next().map(str::to_string) else {
        return Err(ParseError::Empty);
    };
    let Some(action_line) = lines.next() else {
        return Err(ParseError::MissingActionLine { narrative });
    };

    let mut actions = Vec::new();
    let mut rejected = Vec::new();
    for raw_token in action_line.split(',') {
        let token: String = raw_token.chars().filter(|c| !c.is_whitespace()).collect();
        if token.is_empty() {
            continue;
        }
        match token.parse::<ActionToken>() {
            Ok(action) => actions.push(action),
            Err(_) => rejected.push(token.to_ascii_uppercase()),
        }
    }
    if !rejected.is_empty() {
        warn!("Dropped unknown action tokens: {:?}", rejected);
    }

    Ok(ParsedReply { narrative, actions, rejected })
}
