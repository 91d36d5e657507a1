//! Scene run state machine
//!
//! Each trigger walks `Start -> Dispatching -> {AllDone | PartialFailure} ->
//! Reported`. The phases only exist for the lifetime of one run.

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Start,
    Dispatching,
    /// Every command returned 200
    AllDone,
    /// At least one command failed, or a WATERFALL stopped early
    PartialFailure,
    /// Outcome handed back to the caller
    Reported,
}

/// Check if a transition from one phase to another is valid
pub fn is_valid_transition(from: RunPhase, to: RunPhase) -> bool {
    use RunPhase::*;

    matches!(
        (from, to),
        (Start, Dispatching)
            | (Dispatching, AllDone)
            | (Dispatching, PartialFailure)
            | (AllDone, Reported)
            | (PartialFailure, Reported)
    )
}

/// Tracks the phase of a single run and logs each step
#[derive(Debug)]
pub struct RunTracker {
    scene_id: String,
    phase: RunPhase,
}

impl RunTracker {
    pub fn new(scene_id: &str) -> Self {
        Self {
            scene_id: scene_id.to_string(),
            phase: RunPhase::Start,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Move to `to`; an invalid transition is logged and leaves the phase as is
    pub fn advance(&mut self, to: RunPhase) -> bool {
        if !is_valid_transition(self.phase, to) {
            warn!(
                "Scene {}: invalid run transition {:?} -> {:?}",
                self.scene_id, self.phase, to
            );
            return false;
        }

        debug!("Scene {}: {:?} -> {:?}", self.scene_id, self.phase, to);
        self.phase = to;
        true
    }
}
