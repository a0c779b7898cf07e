//! The tick loop
//!
//! A single task owns the simulated system, the executed-action history and the
//! request pool. Each iteration checks four interval boundaries in a fixed order,
//! then steps the system one tick:
//!
//! 1. speak the next queued intent if the speaker is free
//! 2. apply the next queued action (action boundary, speaker free)
//! 3. spawn an enrichment request (prompt boundary, after warm-up, speaker free)
//! 4. snapshot the system (save boundary, skipping tick 0 and the first interval)
//!
//! Boundaries are evaluated against the tick sampled at the top of the
//! iteration. Background requests are spawned, never awaited.

use crate::audio::AudioPlayer;
use crate::config::AutoplayConfig;
use crate::dispatcher::ActionDispatcher;
use crate::enrichment::{Enricher, EnrichmentSettings};
use crate::persistence::{ContextStore, SnapshotStore};
use crate::pool::{RequestKind, RequestPool};
use crate::queue::HistoryWindow;
use crate::repetition::RepetitionDetector;
use crate::session::SharedSession;
use crate::speech::SpeechSerializer;
use crate::system::SimulatedSystem;
use autoplay_core::{Result, Tick};
use autoplay_llm::CompletionService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for in-flight requests before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct TickScheduler {
    system: Box<dyn SimulatedSystem>,
    session: Arc<SharedSession>,
    history: HistoryWindow,
    dispatcher: ActionDispatcher,
    detector: RepetitionDetector,
    pool: RequestPool,
    speech: SpeechSerializer,
    enricher: Enricher,
    snapshots: SnapshotStore,
    context_store: ContextStore,

    action_interval: Tick,
    prompt_interval: Tick,
    save_interval: Tick,
    ticks_per_minute: Tick,
    prompt_warmup: Tick,
    max_in_flight: Option<usize>,
    tick_duration: Duration,
    prompts_per_minute: f64,
    pace: bool,

    tick: Tick,
}

impl TickScheduler {
    pub fn new(
        system: Box<dyn SimulatedSystem>,
        service: Arc<dyn CompletionService>,
        player: Arc<dyn AudioPlayer>,
        config: &AutoplayConfig,
    ) -> Self {
        let context_store = ContextStore::new(&config.paths.context);
        let context = context_store.load_context(
            config.context.preamble.as_deref(),
            config.context.max_messages,
        );
        let session = SharedSession::new(context);

        let speech = SpeechSerializer::new(service.clone(), player, config.requests.timeout())
            .voiced(config.speech.enabled);
        let enricher = Enricher::new(
            session.clone(),
            service,
            context_store.clone(),
            EnrichmentSettings {
                timeout: config.requests.timeout(),
                aside_prompt: config.speech.aside_prompt.clone(),
                fallback_line: config.speech.fallback_line.clone(),
            },
        );

        let timing = &config.timing;
        Self {
            system,
            session,
            history: HistoryWindow::new(config.history.capacity),
            dispatcher: ActionDispatcher::new(timing.hold_ticks),
            detector: RepetitionDetector::new(
                config.history.repetition_threshold,
                config.history.repetition_policy,
            ),
            pool: RequestPool::new(config.requests.task_timeout()),
            speech,
            enricher,
            snapshots: SnapshotStore::new(&config.paths.snapshot, timing.snapshot_warmup_ticks),
            context_store,
            action_interval: timing.action_interval(),
            prompt_interval: timing.prompt_interval(),
            save_interval: timing.save_interval(),
            ticks_per_minute: timing.ticks_per_minute(),
            prompt_warmup: timing.prompt_warmup_ticks,
            max_in_flight: config.requests.max_in_flight,
            tick_duration: timing.tick_duration(),
            prompts_per_minute: timing.prompts_per_minute(),
            pace: timing.pace,
            tick: 0,
        }
    }

    pub fn session(&self) -> &Arc<SharedSession> {
        &self.session
    }

    pub fn speech(&self) -> &SpeechSerializer {
        &self.speech
    }

    pub fn pool(&self) -> &RequestPool {
        &self.pool
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Load the saved snapshot, if any, into the system.
    pub fn restore(&mut self) -> Result<bool> {
        self.snapshots.load_into(self.system.as_mut())
    }

    /// One iteration of the loop. Only simulated-system failures are returned.
    pub async fn run_once(&mut self) -> Result<()> {
        let now = self.tick;

        if now > 0 && now % self.ticks_per_minute == 0 {
            info!(
                "Up {} minutes, {} requests in flight",
                now / self.ticks_per_minute,
                self.pool.live()
            );
        }

        if let Some(guard) = self.speech.try_acquire() {
            let intent = self.session.intents.lock().await.pop();
            if let Some(text) = intent {
                let speech = self.speech.clone();
                self.pool.spawn(RequestKind::Speech, async move {
                    if let Err(e) = speech.speak_with(guard, &text).await {
                        warn!("Speech failed: {}", e);
                    }
                });
            }
        }

        if now % self.action_interval == 0 && self.speech.is_idle() {
            let next = self.session.actions.lock().await.pop_front();
            if let Some(action) = next {
                let advanced =
                    self.dispatcher
                        .apply(self.system.as_mut(), &mut self.history, action)?;
                self.tick += advanced;
                self.snapshots.snapshot(self.system.as_mut(), self.tick);
                let pruned = self.pool.prune();
                if pruned > 0 {
                    debug!("Pruned {} finished requests", pruned);
                }
            }
        }

        if now % self.prompt_interval == 0 && now >= self.prompt_warmup && self.speech.is_idle() {
            self.start_enrichment();
        }

        if now % self.save_interval == 0 && now > self.save_interval {
            self.snapshots.snapshot(self.system.as_mut(), self.tick);
        }

        self.system.step(1)?;
        self.tick += 1;
        Ok(())
    }

    fn start_enrichment(&mut self) {
        if let Some(cap) = self.max_in_flight {
            let live = self.pool.count_kind(RequestKind::Enrichment);
            if live >= cap {
                info!("Skipping prompt: {} enrichment requests already in flight", live);
                return;
            }
        }

        let frame = match self.system.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame capture failed, skipping prompt: {}", e);
                return;
            }
        };
        let allowed = self.detector.allowed_actions(&self.history);
        let enricher = self.enricher.clone();
        let id = self.pool.spawn(RequestKind::Enrichment, async move {
            let outcome = enricher.run(frame, allowed).await;
            debug!("Enrichment outcome: {:?}", outcome);
        });
        debug!("Prompt at tick {} ({})", self.tick, id);
    }

    /// Drive the loop until `shutdown` fires, the system fails, or `max_ticks`
    /// iterations have run. Always finishes with a final save.
    pub async fn run(&mut self, shutdown: CancellationToken, max_ticks: Option<Tick>) -> Result<()> {
        info!(
            "Tick loop starting: {:.1} prompts per minute, action every {} ticks",
            self.prompts_per_minute, self.action_interval
        );

        let mut interval = tokio::time::interval(self.tick_duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut iterations: Tick = 0;
        let result = loop {
            if max_ticks.is_some_and(|max| iterations >= max) {
                break Ok(());
            }
            if self.pace {
                tokio::select! {
                    _ = shutdown.cancelled() => break Ok(()),
                    _ = interval.tick() => {}
                }
            } else {
                if shutdown.is_cancelled() {
                    break Ok(());
                }
                tokio::task::yield_now().await;
            }

            if let Err(e) = self.run_once().await {
                error!("Simulated system failed at tick {}: {}", self.tick, e);
                break Err(e);
            }
            iterations += 1;
        };

        self.shutdown().await;
        result
    }

    async fn shutdown(&mut self) {
        info!("Shutting down at tick {}", self.tick);
        self.snapshots.snapshot(self.system.as_mut(), self.tick);

        if let Err(e) = self.context_store.save_from(&self.session.context).await {
            error!("Failed to save context: {}", e);
        }
        self.pool.drain(SHUTDOWN_GRACE).await;
    }
}
