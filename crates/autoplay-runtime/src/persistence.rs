//! Durable state: the simulated system's snapshot and the conversation context
//!
//! Both files are written to a sibling temporary path and renamed into place, so
//! a crash mid-write leaves the previous copy intact.

use crate::context::ConversationContext;
use crate::system::SimulatedSystem;
use autoplay_core::{Result, Tick};
use autoplay_llm::Message;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Unique per write, so two writers never share a temporary file.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Before the warm-up threshold; nothing was written.
    WarmingUp,
    Saved { bytes: usize },
    /// Logged and swallowed; the loop carries on.
    Failed,
}

pub struct SnapshotStore {
    path: PathBuf,
    warmup_ticks: Tick,
    last_saved: Option<Tick>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, warmup_ticks: Tick) -> Self {
        Self {
            path: path.into(),
            warmup_ticks,
            last_saved: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_saved(&self) -> Option<Tick> {
        self.last_saved
    }

    /// Load the stored snapshot into `system`. Returns `false` when there is none.
    pub fn load_into(&self, system: &mut dyn SimulatedSystem) -> Result<bool> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting fresh", self.path.display());
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        system.load_snapshot(&bytes)?;
        info!("Restored snapshot from {} ({} bytes)", self.path.display(), bytes.len());
        Ok(true)
    }

    /// Save the system state, unless still warming up. Failures are logged, not returned.
    pub fn snapshot(&mut self, system: &mut dyn SimulatedSystem, tick: Tick) -> SnapshotOutcome {
        if tick < self.warmup_ticks {
            return SnapshotOutcome::WarmingUp;
        }
        let bytes = match system.save_snapshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Snapshot capture failed at tick {}: {}", tick, e);
                return SnapshotOutcome::Failed;
            }
        };

        let tmp = tmp_path(&self.path);
        let written = std::fs::write(&tmp, &bytes).and_then(|_| std::fs::rename(&tmp, &self.path));
        match written {
            Ok(()) => {
                debug!("Snapshot saved at tick {} ({} bytes)", tick, bytes.len());
                self.last_saved = Some(tick);
                SnapshotOutcome::Saved { bytes: bytes.len() }
            }
            Err(e) => {
                error!("Failed to write snapshot {}: {}", self.path.display(), e);
                SnapshotOutcome::Failed
            }
        }
    }
}

/// JSON array of message records.
///
/// Clones share one writer lock. Writes land in the order they took the lock.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, messages: &[Message]) -> Result<()> {
        let _writing = self.writer.lock().await;
        self.write(messages).await
    }

    /// Snapshot `context` and write it under the writer lock, so a later save
    /// can never be overwritten by an older snapshot.
    pub async fn save_from(&self, context: &Mutex<ConversationContext>) -> Result<()> {
        let _writing = self.writer.lock().await;
        let messages = context.lock().await.messages();
        self.write(&messages).await
    }

    async fn write(&self, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_vec_pretty(messages)?;
        let tmp = tmp_path(&self.path);
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Context saved: {} messages", messages.len());
        Ok(())
    }

    /// Stored records in order. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<Message>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Build the startup context. Unreadable files fall back to just the preamble.
    pub fn load_context(&self, preamble: Option<&str>, max_messages: usize) -> ConversationContext {
        match self.load() {
            Ok(messages) => {
                if !messages.is_empty() {
                    info!("Loaded {} context messages from {}", messages.len(), self.path.display());
                }
                ConversationContext::from_messages(messages, preamble, max_messages)
            }
            Err(e) => {
                warn!("Ignoring unreadable context file {}: {}", self.path.display(), e);
                ConversationContext::with_preamble(preamble, max_messages)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoplay_core::{ActionToken, Frame, InputPhase};

    struct MemorySystem {
        state: Vec<u8>,
        fail: bool,
    }

    impl SimulatedSystem for MemorySystem {
        fn step(&mut self, _ticks: u32) -> Result<()> {
            Ok(())
        }
        fn capture_frame(&mut self) -> Result<Frame> {
            Ok(Frame::new("image/png", Vec::new()))
        }
        fn send_input(&mut self, _action: ActionToken, _phase: InputPhase) -> Result<()> {
            Ok(())
        }
        fn load_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
            self.state = bytes.to_vec();
            Ok(())
        }
        fn save_snapshot(&mut self) -> Result<Vec<u8>> {
            if self.fail {
                return Err(autoplay_core::Error::system("save_snapshot", "halted"));
            }
            Ok(self.state.clone())
        }
    }

    #[test]
    fn snapshot_respects_warmup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.state");
        let mut store = SnapshotStore::new(&path, 100);
        let mut system = MemorySystem { state: vec![1, 2, 3], fail: false };

        assert_eq!(store.snapshot(&mut system, 99), SnapshotOutcome::WarmingUp);
        assert!(!path.exists());

        assert_eq!(store.snapshot(&mut system, 100), SnapshotOutcome::Saved { bytes: 3 });
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(store.last_saved(), Some(100));
    }

    #[test]
    fn snapshot_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::new(dir.path().join("s"), 0);
        let mut system = MemorySystem { state: Vec::new(), fail: true };
        assert_eq!(store.snapshot(&mut system, 5), SnapshotOutcome::Failed);
        assert!(store.last_saved().is_none());
    }

    #[test]
    fn load_into_restores_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s");
        let store = SnapshotStore::new(&path, 0);
        let mut system = MemorySystem { state: Vec::new(), fail: false };
        assert!(!store.load_into(&mut system).unwrap());

        std::fs::write(&path, [7, 7]).unwrap();
        assert!(store.load_into(&mut system).unwrap());
        assert_eq!(system.state, vec![7, 7]);
    }

    #[tokio::test]
    async fn context_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path().join("ctx.json"));
        let messages = vec![
            Message::system("rules"),
            Message::user(vec![autoplay_llm::ContentPart::text("what now?")]),
            Message::system("Go.\nUP"),
        ];
        store.save(&messages).await.unwrap();
        assert_eq!(store.load().unwrap(), messages);
    }

    #[tokio::test]
    async fn concurrent_saves_keep_latest_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path().join("ctx.json"));
        let context = Mutex::new(ConversationContext::with_preamble(Some("rules"), 50));

        let saves = (0..8).map(|i| {
            let store = store.clone();
            let context = &context;
            async move {
                context.lock().await.push(Message::system(format!("reply {}", i)));
                store.save_from(context).await
            }
        });
        for result in futures::future::join_all(saves).await {
            result.unwrap();
        }

        assert_eq!(store.load().unwrap(), context.lock().await.messages());
        assert_eq!(store.load().unwrap().len(), 9);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temporary files left behind: {:?}", leftovers);
    }

    #[test]
    fn tmp_paths_are_unique_siblings() {
        let path = Path::new("/data/ctx.json");
        let (a, b) = (tmp_path(path), tmp_path(path));
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a.to_string_lossy().starts_with("/data/ctx.json."));
    }

    #[test]
    fn missing_context_yields_preamble_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path().join("absent.json"));
        let ctx = store.load_context(Some("rules"), 21);
        assert_eq!(ctx.len(), 1);
        assert!(ctx.is_pinned());
    }

    #[test]
    fn corrupt_context_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, "not json").unwrap();
        let ctx = ContextStore::new(&path).load_context(None, 21);
        assert!(ctx.is_empty());
    }
}
