//! In-memory collaborators shared by the runtime integration tests
#![allow(dead_code)]

use autoplay_core::{ActionToken, Error, Frame, InputPhase, Result};
use autoplay_llm::{CompletionService, LlmError, LlmResult, Message};
use autoplay_runtime::{AudioPlayer, AutoplayConfig, SimulatedSystem};
use bytes::Bytes;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ===========================================================================
// Simulated system
// ===========================================================================

/// Everything the recording system has been asked to do.
#[derive(Debug, Default)]
pub struct SystemLog {
    pub inputs: Vec<(ActionToken, InputPhase)>,
    pub steps: u64,
    pub saves: usize,
    pub loaded: Option<Vec<u8>>,
}

pub struct RecordingSystem {
    log: Arc<Mutex<SystemLog>>,
    fail_after_steps: Option<u64>,
}

impl RecordingSystem {
    pub fn new() -> (Self, Arc<Mutex<SystemLog>>) {
        let log = Arc::new(Mutex::new(SystemLog::default()));
        (Self { log: log.clone(), fail_after_steps: None }, log)
    }

    /// Fail every `step` call once this many ticks have been stepped.
    pub fn failing_after(steps: u64) -> (Self, Arc<Mutex<SystemLog>>) {
        let (mut system, log) = Self::new();
        system.fail_after_steps = Some(steps);
        (system, log)
    }
}

impl SimulatedSystem for RecordingSystem {
    fn step(&mut self, ticks: u32) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_after_steps.is_some_and(|limit| log.steps >= limit) {
            return Err(Error::system("step", "emulator halted"));
        }
        log.steps += u64::from(ticks);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame> {
        Ok(Frame::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]))
    }

    fn send_input(&mut self, action: ActionToken, phase: InputPhase) -> Result<()> {
        self.log.lock().unwrap().inputs.push((action, phase));
        Ok(())
    }

    fn load_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        self.log.lock().unwrap().loaded = Some(bytes.to_vec());
        Ok(())
    }

    fn save_snapshot(&mut self) -> Result<Vec<u8>> {
        let mut log = self.log.lock().unwrap();
        log.saves += 1;
        Ok(log.steps.to_le_bytes().to_vec())
    }
}

/// Presses recorded in `log`, in order.
pub fn presses(log: &Mutex<SystemLog>) -> Vec<ActionToken> {
    log.lock()
        .unwrap()
        .inputs
        .iter()
        .filter(|(_, phase)| *phase == InputPhase::Press)
        .map(|(action, _)| *action)
        .collect()
}

// ===========================================================================
// Completion service
// ===========================================================================

#[derive(Clone, Debug)]
pub enum Behavior {
    Reply(String),
    Fail(String),
    /// Never answers.
    Hang,
    Panic,
    /// Replies once the notify fires.
    Gated(Arc<tokio::sync::Notify>, String),
}

/// Completion service that plays back a script of behaviors, then a default.
pub struct ScriptedService {
    behaviors: Mutex<VecDeque<Behavior>>,
    default_behavior: Behavior,
    aside: Option<String>,
    prompts: Mutex<Vec<Message>>,
}

impl ScriptedService {
    pub fn constant(behavior: Behavior) -> Self {
        Self {
            behaviors: Mutex::new(VecDeque::new()),
            default_behavior: behavior,
            aside: Some("Did everyone see that?".into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(text: &str) -> Self {
        Self::constant(Behavior::Reply(text.into()))
    }

    pub fn sequence(behaviors: Vec<Behavior>) -> Self {
        let mut service = Self::constant(Behavior::Reply("(script exhausted)".into()));
        service.behaviors = Mutex::new(behaviors.into());
        service
    }

    /// Make `complete_text` fail, forcing the configured fallback line.
    pub fn without_aside(mut self) -> Self {
        self.aside = None;
        self
    }

    /// Messages passed to `complete_multimodal`, in call order.
    pub fn prompts(&self) -> Vec<Message> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_multimodal(&self, _history: &[Message], message: &Message) -> LlmResult<String> {
        self.prompts.lock().unwrap().push(message.clone());
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone());
        match behavior {
            Behavior::Reply(text) => Ok(text),
            Behavior::Fail(reason) => Err(LlmError::RequestFailed(reason)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            Behavior::Panic => panic!("scripted panic"),
            Behavior::Gated(gate, text) => {
                gate.notified().await;
                Ok(text)
            }
        }
    }

    async fn complete_text(&self, _prompt: &str) -> LlmResult<String> {
        self.aside
            .clone()
            .ok_or_else(|| LlmError::RequestFailed("no aside scripted".into()))
    }

    async fn synthesize_speech(&self, text: &str) -> LlmResult<Bytes> {
        Ok(Bytes::copy_from_slice(text.as_bytes()))
    }
}

// ===========================================================================
// Audio
// ===========================================================================

/// Sleeps for a fixed time per clip and records when each clip started and ended.
pub struct TimingPlayer {
    duration: Duration,
    pub spans: Arc<Mutex<Vec<(Instant, Instant, Bytes)>>>,
}

impl TimingPlayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration, spans: Arc::new(Mutex::new(Vec::new())) }
    }
}

#[async_trait::async_trait]
impl AudioPlayer for TimingPlayer {
    async fn play(&self, audio: Bytes) -> Result<()> {
        let start = Instant::now();
        tokio::time::sleep(self.duration).await;
        self.spans.lock().unwrap().push((start, Instant::now(), audio));
        Ok(())
    }
}

// ===========================================================================
// Config
// ===========================================================================

/// One tick per "second", actions every tick, no pacing, files under `dir`.
/// Prompts never start and saves are pushed far out; tests enable what they need.
pub fn test_config(dir: &Path) -> AutoplayConfig {
    let mut config = AutoplayConfig::default();
    config.timing.ticks_per_second = 1;
    config.timing.action_interval_secs = 1;
    config.timing.prompt_interval_secs = 1000;
    config.timing.save_interval_secs = 1000;
    config.timing.prompt_warmup_ticks = u64::MAX;
    config.timing.snapshot_warmup_ticks = 0;
    config.timing.hold_ticks = 1;
    config.timing.pace = false;
    config.requests.timeout_secs = 5;
    config.requests.task_timeout_secs = 10;
    config.speech.enabled = false;
    config.context.preamble = Some("You are playing a game.".into());
    config.paths.snapshot = dir.join("game.state");
    config.paths.context = dir.join("context.json");
    config
}

/// Poll until `done` holds or a couple of seconds pass.
pub async fn eventually(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    done()
}
