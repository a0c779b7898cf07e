//! Audio playback
//!
//! `play` resolves only once the clip has finished, so holding the speaker
//! permit across the call is enough to keep utterances from overlapping.

use autoplay_core::{Error, Result};
use bytes::Bytes;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

#[async_trait::async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play an encoded clip to completion.
    async fn play(&self, audio: Bytes) -> Result<()>;
}

/// Discards audio.
pub struct SilentPlayer;

#[async_trait::async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, _audio: Bytes) -> Result<()> {
        Ok(())
    }
}

/// Plays clips through an external command (e.g. `ffplay -nodisp -autoexit`).
/// The clip is written to a scratch file whose path is appended to the command.
pub struct CommandPlayer {
    command: Vec<String>,
    scratch_dir: PathBuf,
}

impl CommandPlayer {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}

#[async_trait::async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, audio: Bytes) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::ConfigError("empty player command".to_string()))?;

        let clip = self
            .scratch_dir
            .join(format!("autoplay-{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&clip, &audio).await?;
        debug!("playing {} bytes via {}", audio.len(), program);

        let status = Command::new(program)
            .args(args)
            .arg(&clip)
            .kill_on_drop(true)
            .status()
            .await;
        let _ = tokio::fs::remove_file(&clip).await;

        let status = status.map_err(|e| Error::audio(format!("{}: {}", program, e)))?;
        if !status.success() {
            return Err(Error::audio(format!(
                "{} exited with {}",
                program,
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}
