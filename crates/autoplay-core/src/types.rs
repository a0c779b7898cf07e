//! Core types for Autoplay

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Simulation step counter. One tick is one fixed-duration step of the simulated system.
pub type Tick = u64;

/// A symbolic control input from the closed set the simulated system understands.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionToken {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl ActionToken {
    pub const ALL: [ActionToken; 8] = [
        ActionToken::Up,
        ActionToken::Down,
        ActionToken::Left,
        ActionToken::Right,
        ActionToken::A,
        ActionToken::B,
        ActionToken::Start,
        ActionToken::Select,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionToken::Up => "UP",
            ActionToken::Down => "DOWN",
            ActionToken::Left => "LEFT",
            ActionToken::Right => "RIGHT",
            ActionToken::A => "A",
            ActionToken::B => "B",
            ActionToken::Start => "START",
            ActionToken::Select => "SELECT",
        }
    }

    /// Position of this token in [`ActionToken::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for ActionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionToken {
    type Err = crate::Error;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        ActionToken::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| crate::Error::UnknownAction(s.to_string()))
    }
}

/// Which half of a button event is being sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPhase {
    Press,
    Release,
}

impl std::fmt::Display for InputPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputPhase::Press => write!(f, "press"),
            InputPhase::Release => write!(f, "release"),
        }
    }
}

/// An encoded screen capture (PNG, JPEG, ...) taken from the simulated system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Frame {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}
