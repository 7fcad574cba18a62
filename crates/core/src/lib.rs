pub mod actions;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod finalize;
pub mod flows;
pub mod items;
pub mod lifecycle;
pub mod registry;

pub use actions::{apply_action, suggest_reserves, ActionOutcome, Actor, RaidAction, Reply, ViewHint};
pub use domain::raid::{ChannelId, Raid, RaidId, Role, RoleCounts, Roster};
pub use domain::signup::{ClassName, FieldUpdate, ParticipantId, Signup, Spec};
pub use errors::{ApplicationError, DomainError, InterfaceError, ReasonCode};
pub use export::{full_export, roster_export, ExportKind};
pub use finalize::{FinalizePage, PageDirection, SlotToggle};
pub use items::{Item, ItemCatalog};
