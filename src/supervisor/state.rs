//! Supervisor state machine.

use serde::{Deserialize, Serialize};

/// Current state of the process supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorState {
    #[default]
    Idle,
    Starting,
    Running,
}

/// The single process slot.
///
/// Every start, stop and close goes through these transitions. Each start
/// gets a new generation so a late close from an older process cannot clear
/// a newer one.
#[derive(Debug)]
pub struct ProcessSlot<P> {
    state: SupervisorState,
    generation: u64,
    process: Option<P>,
}

impl<P> Default for ProcessSlot<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ProcessSlot<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            generation: 0,
            process: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn process(&self) -> Option<&P> {
        self.process.as_ref()
    }

    /// Whether `generation` is still starting (not cancelled by a stop).
    #[must_use]
    pub fn is_starting(&self, generation: u64) -> bool {
        self.state == SupervisorState::Starting && self.generation == generation
    }

    fn transition(&mut self, new_state: SupervisorState) {
        tracing::debug!(
            from = ?self.state,
            to = ?new_state,
            generation = self.generation,
            "State transition"
        );
        self.state = new_state;
    }

    /// `Idle` -> `Starting`. Returns the new generation, or `None` if a
    /// process is already starting or running.
    pub fn begin_start(&mut self) -> Option<u64> {
        if self.state != SupervisorState::Idle {
            return None;
        }
        self.generation = self.generation.wrapping_add(1);
        self.transition(SupervisorState::Starting);
        Some(self.generation)
    }

    /// `Starting` -> `Running` for `generation`.
    ///
    /// # Errors
    ///
    /// Gives the process back if the start was cancelled in the meantime.
    pub fn attach(&mut self, generation: u64, process: P) -> Result<(), P> {
        if self.state != SupervisorState::Starting || self.generation != generation {
            return Err(process);
        }
        self.process = Some(process);
        self.transition(SupervisorState::Running);
        Ok(())
    }

    /// Return to `Idle` if `generation` is still current. Used by close,
    /// error, and failed starts.
    pub fn release(&mut self, generation: u64) -> Option<P> {
        if self.state == SupervisorState::Idle || self.generation != generation {
            return None;
        }
        self.transition(SupervisorState::Idle);
        self.process.take()
    }

    /// Unconditionally return to `Idle`, handing back the previous state and
    /// process. Used by stop.
    pub fn clear(&mut self) -> (SupervisorState, Option<P>) {
        let previous = self.state;
        if previous != SupervisorState::Idle {
            self.transition(SupervisorState::Idle);
        }
        (previous, self.process.take())
    }
}
