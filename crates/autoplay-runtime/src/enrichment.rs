//! Background enrichment request
//!
//! One run: frame + instructions go into the conversation, the completion
//! service answers with a narrative line and an action line, and the results are
//! appended to the shared queues. Every failure path still leaves something for
//! the speaker to say.

use crate::parser::{self, ParseError};
use crate::persistence::ContextStore;
use crate::pool::panic_reason;
use crate::session::SharedSession;
use autoplay_core::{ActionToken, Frame};
use autoplay_llm::{CompletionService, ContentPart, LlmError, Message};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    /// Deadline for each completion service call.
    pub timeout: Duration,
    /// Prompt for the filler aside generated after a failed request.
    pub aside_prompt: String,
    /// Used when the aside itself cannot be generated.
    pub fallback_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Reply parsed; `actions` were queued along with the narrative.
    Applied { actions: Vec<ActionToken> },
    /// Reply had a narrative but no action line; only the narrative was queued.
    Partial,
    /// Request failed; a filler line was queued instead.
    Fallback,
}

#[derive(Debug, thiserror::Error)]
enum RequestFailure {
    #[error(transparent)]
    Service(#[from] LlmError),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("completion service panicked: {0}")]
    Panicked(String),
}

/// Build the instruction text that accompanies the frame.
pub fn instructions(allowed: &[ActionToken], suggestions: &[String]) -> String {
    let tokens: Vec<&str> = allowed.iter().map(|a| a.as_str()).collect();
    let mut text = format!(
        "Here is the current screen. Reply with exactly two lines.\n\
         Line 1: one or two sentences telling the audience what you see and what you plan to do.\n\
         Line 2: a comma-separated list of buttons to press next, chosen only from: {}.",
        tokens.join(", ")
    );
    if !suggestions.is_empty() {
        text.push_str("\nThe audience suggests:");
        for s in suggestions {
            text.push_str("\n- ");
            text.push_str(s);
        }
    }
    text
}

#[derive(Clone)]
pub struct Enricher {
    session: Arc<SharedSession>,
    service: Arc<dyn CompletionService>,
    store: ContextStore,
    settings: Arc<EnrichmentSettings>,
}

impl Enricher {
    pub fn new(
        session: Arc<SharedSession>,
        service: Arc<dyn CompletionService>,
        store: ContextStore,
        settings: EnrichmentSettings,
    ) -> Self {
        Self {
            session,
            service,
            store,
            settings: Arc::new(settings),
        }
    }

    pub async fn run(self, frame: Frame, allowed: Vec<ActionToken>) -> EnrichmentOutcome {
        let suggestions = self.session.suggestions.snapshot();
        let message = Message::user(vec![
            ContentPart::image(&frame),
            ContentPart::text(instructions(&allowed, &suggestions)),
        ]);

        let (history, entry) = {
            let mut context = self.session.context.lock().await;
            context.trim();
            let history = context.messages();
            let entry = context.push(message.clone());
            (history, entry)
        };

        let attempt = AssertUnwindSafe(self.request(&history, &message))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(RequestFailure::Panicked(panic_reason(panic.as_ref()))));

        let failure = match attempt {
            Ok((raw, reply)) => {
                info!("Enrichment: {:?} -> {:?}", reply.narrative, reply.actions);
                self.session.actions.lock().await.extend(reply.actions.iter().copied());
                self.session.intents.lock().await.push(reply.narrative.clone());

                let echoed = self
                    .session
                    .context
                    .lock()
                    .await
                    .insert_after(entry, Message::system(raw));
                if echoed.is_none() {
                    warn!("Request was evicted from the context before its reply arrived");
                }
                if let Err(e) = self.store.save_from(&self.session.context).await {
                    error!("Failed to save context {}: {}", self.store.path().display(), e);
                }
                self.session.suggestions.clear_taken(suggestions.len());
                return EnrichmentOutcome::Applied { actions: reply.actions };
            }
            Err(e) => e,
        };

        self.session.context.lock().await.remove(entry);
        warn!("Enrichment failed: {}", failure);

        if let RequestFailure::Parse(ParseError::MissingActionLine { narrative }) = failure {
            self.session.intents.lock().await.push(narrative);
            return EnrichmentOutcome::Partial;
        }

        let filler = AssertUnwindSafe(self.aside())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                warn!("Aside generation panicked: {}", panic_reason(panic.as_ref()));
                self.settings.fallback_line.clone()
            });
        self.session.intents.lock().await.push(filler);
        EnrichmentOutcome::Fallback
    }

    async fn request(
        &self,
        history: &[Message],
        message: &Message,
    ) -> Result<(String, parser::ParsedReply), RequestFailure> {
        let raw = tokio::time::timeout(
            self.settings.timeout,
            self.service.complete_multimodal(history, message),
        )
        .await
        .map_err(|_| RequestFailure::Timeout(self.settings.timeout))??;
        let reply = parser::parse_reply(&raw)?;
        Ok((raw, reply))
    }

    async fn aside(&self) -> String {
        let aside = tokio::time::timeout(
            self.settings.timeout,
            self.service.complete_text(&self.settings.aside_prompt),
        )
        .await;
        match aside {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => self.settings.fallback_line.clone(),
            Ok(Err(e)) => {
                warn!("Aside generation failed: {}", e);
                self.settings.fallback_line.clone()
            }
            Err(_) => {
                warn!("Aside generation timed out");
                self.settings.fallback_line.clone()
            }
        }
    }
}
