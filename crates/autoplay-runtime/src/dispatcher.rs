//! Translate action tokens into device input

use crate::queue::HistoryWindow;
use crate::system::SimulatedSystem;
use autoplay_core::{ActionToken, InputPhase, Result, Tick};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct ActionDispatcher {
    hold_ticks: u32,
}

impl ActionDispatcher {
    pub fn new(hold_ticks: u32) -> Self {
        Self { hold_ticks }
    }

    /// Ticks one `apply` advances the system by.
    pub fn ticks_per_action(&self) -> Tick {
        2 * Tick::from(self.hold_ticks)
    }

    /// Press, hold, release, hold, then record the action in `history`.
    ///
    /// Errors come only from the system itself; the token set is closed so there
    /// is no unknown-action path here.
    pub fn apply(
        &self,
        system: &mut dyn SimulatedSystem,
        history: &mut HistoryWindow,
        action: ActionToken,
    ) -> Result<Tick> {
        debug!("Applying {}", action);
        system.send_input(action, InputPhase::Press)?;
        system.step(self.hold_ticks)?;
        system.send_input(action, InputPhase::Release)?;
        system.step(self.hold_ticks)?;
        history.record(action);
        Ok(self.ticks_per_action())
    }
}
