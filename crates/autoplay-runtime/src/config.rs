//! Autoplay configuration
//!
//! All tunable intervals, capacities, and paths in one place. Loaded from TOML
//! at startup, falls back to defaults if no config file exists. Intervals are
//! written in seconds and converted to tick counts with `ticks_per_second`.

use crate::repetition::RepetitionPolicy;
use autoplay_core::Tick;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level autoplay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoplayConfig {
    /// Tick rate and per-concern intervals.
    pub timing: TimingConfig,
    /// Executed-action history and repetition detection.
    pub history: HistoryConfig,
    /// Conversation context bounds.
    pub context: ContextConfig,
    /// Background request limits.
    pub requests: RequestConfig,
    /// Completion service selection.
    pub llm: LlmConfig,
    /// Narration output.
    pub speech: SpeechConfig,
    /// Durable state locations.
    pub paths: PathConfig,
    /// Simulated system bridge.
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Simulation steps per second.
    pub ticks_per_second: u64,
    /// Seconds between action dispatches.
    pub action_interval_secs: u64,
    /// Seconds between enrichment requests.
    pub prompt_interval_secs: u64,
    /// Seconds between timed snapshots.
    pub save_interval_secs: u64,
    /// No enrichment request is spawned before this tick.
    pub prompt_warmup_ticks: Tick,
    /// No snapshot is written before this tick.
    pub snapshot_warmup_ticks: Tick,
    /// Ticks each press and each release is held for.
    pub hold_ticks: u32,
    /// Sleep between ticks to hold the real-time rate. Off runs as fast as the system steps.
    pub pace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Executed actions remembered for repetition detection.
    pub capacity: usize,
    /// Occurrences within the window at which an action counts as over-used.
    pub repetition_threshold: usize,
    /// Whether over-used actions are withheld from the next request.
    pub repetition_policy: RepetitionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum messages kept in the conversation, pinned preamble included.
    pub max_messages: usize,
    /// Pinned system message at index 0. Never evicted.
    pub preamble: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline for a single completion or speech service call.
    pub timeout_secs: u64,
    /// Deadline for a whole background task, playback included.
    pub task_timeout_secs: u64,
    /// Skip prompt boundaries while this many enrichment requests are in flight.
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Image detail hint sent with frame captures ("low", "high", "auto").
    pub image_detail: String,
    pub speech_model: String,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Synthesize and play intents. Off logs them instead.
    pub enabled: bool,
    /// Player command; the audio file path is appended as the last argument.
    pub player: Vec<String>,
    /// Prompt used to generate a filler aside when an enrichment request fails.
    pub aside_prompt: String,
    /// Spoken when even the aside cannot be generated.
    pub fallback_line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub snapshot: PathBuf,
    pub context: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Bridge process command line.
    pub command: Vec<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            action_interval_secs: 1,
            prompt_interval_secs: 15,
            save_interval_secs: 300,
            prompt_warmup_ticks: 120,
            snapshot_warmup_ticks: 18_000,
            hold_ticks: 5,
            pace: true,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 35,
            repetition_threshold: 20,
            repetition_policy: RepetitionPolicy::Exclude,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: 21,
            preamble: Some(
                "You are playing a video game live in front of an audience. Each turn you see \
                 the current screen. Think like a human player, keep your commentary short and \
                 lively, and always answer in the requested two-line format."
                    .into(),
            ),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_secs: 60, task_timeout_secs: 180, max_in_flight: None }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            max_tokens: 300,
            image_detail: "low".into(),
            speech_model: "tts-1".into(),
            voice: "onyx".into(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player: vec![
                "ffplay".into(),
                "-nodisp".into(),
                "-autoexit".into(),
                "-loglevel".into(),
                "quiet".into(),
            ],
            aside_prompt: "You are commentating a video game stream and lost track of the \
                screen for a moment. Say one short, funny aside to the audience."
                .into(),
            fallback_line: "Hold on, let me get my bearings.".into(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from("autoplay.state"),
            context: PathBuf::from("autoplay.context.json"),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { command: vec!["python3".into(), "emulator_bridge.py".into()] }
    }
}

// ============================================================
// Loading
// ============================================================

impl AutoplayConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl TimingConfig {
    fn secs_to_ticks(&self, secs: u64) -> Tick {
        (secs * self.ticks_per_second).max(1)
    }

    pub fn action_interval(&self) -> Tick {
        self.secs_to_ticks(self.action_interval_secs)
    }

    pub fn prompt_interval(&self) -> Tick {
        self.secs_to_ticks(self.prompt_interval_secs)
    }

    pub fn save_interval(&self) -> Tick {
        self.secs_to_ticks(self.save_interval_secs)
    }

    pub fn ticks_per_minute(&self) -> Tick {
        self.secs_to_ticks(60)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.ticks_per_second.max(1) as f64)
    }

    /// Enrichment requests per minute at the configured rate.
    pub fn prompts_per_minute(&self) -> f64 {
        self.ticks_per_minute() as f64 / self.prompt_interval() as f64
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}
