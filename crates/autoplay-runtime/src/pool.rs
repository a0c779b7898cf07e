//! Registry of in-flight background requests
//!
//! Every enrichment or speech task is spawned through the pool, which wraps it
//! in a hard timeout and a panic guard. The tick loop prunes finished entries
//! so the registry only ever holds live work.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Message carried by a caught panic payload.
pub(crate) fn panic_reason(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Enrichment,
    Speech,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enrichment => write!(f, "enrichment"),
            Self::Speech => write!(f, "speech"),
        }
    }
}

/// One spawned background task.
pub struct PendingRequest {
    pub id: String,
    pub kind: RequestKind,
    pub started_at: Instant,
    join: JoinHandle<()>,
}

impl PendingRequest {
    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

pub struct RequestPool {
    entries: Vec<PendingRequest>,
    task_timeout: Duration,
}

impl RequestPool {
    pub fn new(task_timeout: Duration) -> Self {
        Self {
            entries: Vec::new(),
            task_timeout,
        }
    }

    /// Spawn `fut` as a tracked task. A panic or an overrun of the task timeout
    /// ends the task without affecting the caller. Returns the request id.
    pub fn spawn<F>(&mut self, kind: RequestKind, fut: F) -> String
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let task_id = id.clone();
        let limit = self.task_timeout;

        let join = tokio::spawn(async move {
            let started = Instant::now();
            match tokio::time::timeout(limit, AssertUnwindSafe(fut).catch_unwind()).await {
                Ok(Ok(())) => {
                    debug!("{} request {} done in {:?}", kind, task_id, started.elapsed())
                }
                Ok(Err(panic)) => {
                    error!("{} request {} panicked: {}", kind, task_id, panic_reason(panic.as_ref()));
                }
                Err(_) => warn!("{} request {} timed out after {:?}", kind, task_id, limit),
            }
        });

        debug!("Spawned {} request {}", kind, id);
        self.entries.push(PendingRequest {
            id: id.clone(),
            kind,
            started_at: Instant::now(),
            join,
        });
        id
    }

    /// Drop finished entries. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(PendingRequest::is_alive);
        before - self.entries.len()
    }

    /// Number of tracked entries, finished or not.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_kind(&self, kind: RequestKind) -> usize {
        self.entries.iter().filter(|r| r.kind == kind && r.is_alive()).count()
    }

    /// Number of entries still running.
    pub fn live(&self) -> usize {
        self.entries.iter().filter(|r| r.is_alive()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }

    /// Wait up to `grace` for outstanding work, then abort whatever is left.
    pub async fn drain(&mut self, grace: Duration) {
        let live = self.live();
        if live == 0 {
            self.entries.clear();
            return;
        }
        info!("Waiting up to {:?} for {} background requests", grace, live);

        let deadline = tokio::time::Instant::now() + grace;
        for entry in self.entries.iter_mut() {
            if tokio::time::timeout_at(deadline, &mut entry.join).await.is_err() {
                warn!("Aborting {} request {}", entry.kind, entry.id);
                entry.join.abort();
            }
        }
        self.entries.clear();
    }
}
