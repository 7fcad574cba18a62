use serde::{Deserialize, Serialize};

use crate::domain::raid::Raid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaidPhase {
    Open,
    Locked,
    Finalized,
    Published,
}

impl RaidPhase {
    pub fn of(raid: &Raid) -> Self {
        if !raid.locked {
            Self::Open
        } else if raid.is_published() {
            Self::Published
        } else if raid.roster.is_some() {
            Self::Finalized
        } else {
            Self::Locked
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Close,
    ConfirmRoster,
    Publish,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RaidPhase,
    pub to: RaidPhase,
    pub event: LifecycleEvent,
}
