//! Autoplay runtime - tick scheduler, enrichment pipeline and speech for a narrated autoplayer

pub mod audio;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod enrichment;
pub mod parser;
pub mod persistence;
pub mod pool;
pub mod queue;
pub mod repetition;
pub mod scheduler;
pub mod session;
pub mod speech;
pub mod system;

pub use audio::{AudioPlayer, CommandPlayer, SilentPlayer};
pub use config::AutoplayConfig;
pub use context::{ConversationContext, EntryId};
pub use dispatcher::ActionDispatcher;
pub use enrichment::{Enricher, EnrichmentOutcome, EnrichmentSettings};
pub use parser::{parse_reply, ParseError, ParsedReply};
pub use persistence::{ContextStore, SnapshotOutcome, SnapshotStore};
pub use pool::{PendingRequest, RequestKind, RequestPool};
pub use queue::{ActionQueue, HistoryWindow, IntentQueue};
pub use repetition::{RepetitionDetector, RepetitionPolicy};
pub use scheduler::TickScheduler;
pub use session::{SharedSession, SuggestionBox};
pub use speech::{SpeakerGuard, SpeechError, SpeechSerializer};
pub use system::{BridgeSystem, SimulatedSystem};
