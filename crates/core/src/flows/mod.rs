pub mod engine;
pub mod states;

pub use engine::{LifecycleEngine, LifecycleTransitionError};
pub use states::{LifecycleEvent, RaidPhase, TransitionOutcome};
