//! Speech serializer
//!
//! A single-permit semaphore stands in for "the speaker". Whoever holds the
//! permit may synthesize and play; everyone else either waits or, from the
//! tick loop, skips. Two utterances never overlap.

use crate::audio::AudioPlayer;
use autoplay_llm::{CompletionService, LlmError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] LlmError),

    #[error("playback failed: {0}")]
    Playback(#[from] autoplay_core::Error),

    #[error("speech synthesis timed out")]
    Timeout,

    #[error("speaker closed")]
    Closed,
}

/// Proof of exclusive use of the speaker. Released on drop.
#[derive(Debug)]
pub struct SpeakerGuard {
    _permit: OwnedSemaphorePermit,
}

#[derive(Clone)]
pub struct SpeechSerializer {
    speaker: Arc<Semaphore>,
    service: Arc<dyn CompletionService>,
    player: Arc<dyn AudioPlayer>,
    timeout: Duration,
    voiced: bool,
}

impl SpeechSerializer {
    pub fn new(
        service: Arc<dyn CompletionService>,
        player: Arc<dyn AudioPlayer>,
        timeout: Duration,
    ) -> Self {
        Self {
            speaker: Arc::new(Semaphore::new(1)),
            service,
            player,
            timeout,
            voiced: true,
        }
    }

    /// With `voiced == false` utterances are only logged, but still serialized.
    pub fn voiced(mut self, voiced: bool) -> Self {
        self.voiced = voiced;
        self
    }

    /// True when nobody holds the speaker.
    pub fn is_idle(&self) -> bool {
        self.speaker.available_permits() > 0
    }

    /// Take the speaker if it is free.
    pub fn try_acquire(&self) -> Option<SpeakerGuard> {
        self.speaker
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| SpeakerGuard { _permit: permit })
    }

    /// Wait for the speaker.
    pub async fn acquire(&self) -> Result<SpeakerGuard, SpeechError> {
        let permit = self
            .speaker
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SpeechError::Closed)?;
        Ok(SpeakerGuard { _permit: permit })
    }

    /// Wait for the speaker, then say `text`.
    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let guard = self.acquire().await?;
        self.speak_with(guard, text).await
    }

    /// Say `text` while holding `guard`. The speaker is released when this returns.
    pub async fn speak_with(&self, guard: SpeakerGuard, text: &str) -> Result<(), SpeechError> {
        let _guard = guard;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        info!("Narration: {}", text);
        if !self.voiced {
            return Ok(());
        }

        let audio = tokio::time::timeout(self.timeout, self.service.synthesize_speech(text))
            .await
            .map_err(|_| SpeechError::Timeout)??;
        debug!("Synthesized {} bytes of audio", audio.len());

        self.player.play(audio).await.map_err(|e| {
            warn!("Playback failed: {}", e);
            SpeechError::Playback(e)
        })
    }
}
