use thiserror::Error;

use crate::flows::states::{LifecycleEvent, RaidPhase, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleTransitionError {
    #[error("raid cannot handle {event:?} while {phase:?}")]
    InvalidTransition { phase: RaidPhase, event: LifecycleEvent },
}

/// Open → Locked → Finalized → Published. There is no way back; a new raid replaces the old.
#[derive(Clone, Debug, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    pub fn apply(
        &self,
        current: RaidPhase,
        event: LifecycleEvent,
    ) -> Result<TransitionOutcome, LifecycleTransitionError> {
        transition(current, event)
    }
}

fn transition(
    current: RaidPhase,
    event: LifecycleEvent,
) -> Result<TransitionOutcome, LifecycleTransitionError> {
    use LifecycleEvent::{Close, ConfirmRoster, Publish};
    use RaidPhase::{Finalized, Locked, Open, Published};

    let to = match (current, event) {
        (Open, Close) => Locked,
        (Locked, ConfirmRoster) | (Finalized, ConfirmRoster) => Finalized,
        (Published, ConfirmRoster) => Published,
        (Locked, Publish) | (Finalized, Publish) | (Published, Publish) => Published,
        _ => return Err(LifecycleTransitionError::InvalidTransition { phase: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event })
}
