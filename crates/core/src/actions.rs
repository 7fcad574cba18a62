//! Inbound raid actions and their dispatch onto the aggregate.
//!
//! Transports parse platform payloads into [`RaidAction`]; [`apply_action`] checks the
//! admin capability, runs the matching aggregate operation and describes what the caller
//! should persist, re-render and reply with. A rejected action never yields a raid to save.

use serde::{Deserialize, Serialize};

use crate::audit::AuditCategory;
use crate::domain::raid::{ChannelId, ImportFile, Raid, Role, RoleCounts};
use crate::domain::signup::ParticipantId;
use crate::errors::DomainError;
use crate::export::ExportKind;
use crate::finalize::PageDirection;
use crate::items::{suggestion_label, ItemCatalog, MAX_SUGGESTIONS};
use crate::registry::ReserveSummary;

pub const NO_PERMISSION: &str = "No permission.";
pub const NO_RAID: &str = "No raid in this channel.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: ParticipantId,
    pub display_name: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, is_admin: bool) -> Self {
        Self { user_id: ParticipantId::new(user_id), display_name: display_name.into(), is_admin }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Raid,
    Published,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaidAction {
    Create { name: String, slots: RoleCounts },
    Close,
    SetSoftReserveLimits(RoleCounts),
    SubmitSignup { char_name: String },
    SelectField { field: String, value: String },
    DeleteSignup,
    AddReserve { item_id: u32 },
    RemoveReserve { item_id: u32 },
    ClearReserves,
    ListReserves,
    FinalizeOpen(Role),
    ToggleSlot { role: Role, participant: ParticipantId },
    Page { role: Role, direction: PageDirection },
    FinalizeBack,
    FinalizeConfirm,
    ExportFull,
    ExportRoster,
    Publish,
    RecordMessage { kind: MessageKind, message_id: String },
    UploadImportBlob { filename: String, data: Vec<u8> },
    DownloadImportBlob,
}

impl RaidAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Close => "close",
            Self::SetSoftReserveLimits(_) => "set_soft_reserve_limits",
            Self::SubmitSignup { .. } => "submit_signup",
            Self::SelectField { .. } => "select_field",
            Self::DeleteSignup => "delete_signup",
            Self::AddReserve { .. } => "reserve_add",
            Self::RemoveReserve { .. } => "reserve_remove",
            Self::ClearReserves => "reserve_clear",
            Self::ListReserves => "reserve_list",
            Self::FinalizeOpen(_) => "finalize_open",
            Self::ToggleSlot { .. } => "toggle_slot",
            Self::Page { .. } => "page",
            Self::FinalizeBack => "finalize_back",
            Self::FinalizeConfirm => "finalize_confirm",
            Self::ExportFull => "export_full",
            Self::ExportRoster => "export_roster",
            Self::Publish => "publish",
            Self::RecordMessage { .. } => "record_message",
            Self::UploadImportBlob { .. } => "upload_import_blob",
            Self::DownloadImportBlob => "download_import_blob",
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::Create { .. }
                | Self::Close
                | Self::SetSoftReserveLimits(_)
                | Self::FinalizeOpen(_)
                | Self::ToggleSlot { .. }
                | Self::Page { .. }
                | Self::FinalizeBack
                | Self::FinalizeConfirm
                | Self::ExportFull
                | Self::ExportRoster
                | Self::Publish
                | Self::UploadImportBlob { .. }
        )
    }

    pub fn category(&self) -> AuditCategory {
        match self {
            Self::Create { .. } | Self::Close | Self::SetSoftReserveLimits(_) | Self::Publish => {
                AuditCategory::Lifecycle
            }
            Self::SubmitSignup { .. } | Self::SelectField { .. } | Self::DeleteSignup => {
                AuditCategory::Signup
            }
            Self::AddReserve { .. }
            | Self::RemoveReserve { .. }
            | Self::ClearReserves
            | Self::ListReserves => AuditCategory::Reserve,
            Self::FinalizeOpen(_)
            | Self::ToggleSlot { .. }
            | Self::Page { .. }
            | Self::FinalizeBack
            | Self::FinalizeConfirm => AuditCategory::Finalize,
            Self::ExportFull
            | Self::ExportRoster
            | Self::UploadImportBlob { .. }
            | Self::DownloadImportBlob => AuditCategory::Export,
            Self::RecordMessage { .. } => AuditCategory::System,
        }
    }

    /// Create replaces the stored raid instead of updating it.
    pub fn replaces_raid(&self) -> bool {
        matches!(self, Self::Create { .. })
    }
}

/// Which view the caller should refresh after the action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewHint {
    Unchanged,
    Raid,
    Finalize { role: Role, page: u32 },
    Roster,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    None,
    Notice(String),
    Export { filename: String, content: String },
    ImportFile(ImportFile),
    Reserves(ReserveSummary),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub raid: Raid,
    /// Whether `raid` differs from what was loaded and must be saved.
    pub changed: bool,
    pub view: ViewHint,
    pub reply: Reply,
}

impl ActionOutcome {
    fn new(raid: Raid, changed: bool, view: ViewHint, reply: Reply) -> Self {
        Self { raid, changed, view, reply }
    }
}

fn notice(message: impl Into<String>) -> Reply {
    Reply::Notice(message.into())
}

fn finalize_view(raid: &Raid, role: Role) -> ViewHint {
    let page = if raid.temp_finalize.role == Some(role) { raid.temp_finalize.page } else { 0 };
    ViewHint::Finalize { role, page }
}

pub fn apply_action(
    raid: Option<Raid>,
    channel_id: &ChannelId,
    action: RaidAction,
    actor: &Actor,
    catalog: &ItemCatalog,
) -> Result<ActionOutcome, DomainError> {
    if action.requires_admin() && !actor.is_admin {
        return Err(DomainError::permission_denied(NO_PERMISSION));
    }

    let mut raid = match raid {
        Some(raid) => raid,
        None => {
            return match action {
                RaidAction::Create { name, slots } => create_raid(channel_id, &name, slots),
                RaidAction::Close => Err(DomainError::not_found("Cannot close raid.")),
                _ => Err(DomainError::not_found(NO_RAID)),
            }
        }
    };
    let user = &actor.user_id;

    let outcome = match action {
        RaidAction::Create { name, slots } => create_raid(channel_id, &name, slots)?,
        RaidAction::Close => {
            raid.close().map_err(|_| DomainError::invalid_state("Cannot close raid."))?;
            ActionOutcome::new(raid, true, ViewHint::Raid, notice("Raid closed."))
        }
        RaidAction::SetSoftReserveLimits(limits) => {
            raid.set_soft_reserve_limits(limits)?;
            ActionOutcome::new(raid, true, ViewHint::Raid, notice("Soft reserve limits updated."))
        }
        RaidAction::SubmitSignup { char_name } => {
            let changed = raid.submit_signup(user, &char_name)?;
            let view = if changed { ViewHint::Raid } else { ViewHint::Unchanged };
            ActionOutcome::new(raid, changed, view, notice("Signup saved."))
        }
        RaidAction::SelectField { field, value } => {
            let changed = raid.select_field_raw(user, &field, &value)?;
            let view = if changed { ViewHint::Raid } else { ViewHint::Unchanged };
            ActionOutcome::new(raid, changed, view, Reply::None)
        }
        RaidAction::DeleteSignup => {
            raid.delete_signup(user)?;
            ActionOutcome::new(raid, true, ViewHint::Raid, notice("Your signup has been removed."))
        }
        RaidAction::AddReserve { item_id } => {
            let reserve = raid.add_reserve(user, item_id, catalog)?;
            let summary = raid.list_reserves(user)?;
            let reply = notice(format!(
                "Added {} to your reserves ({}/{}).",
                reserve.item_name,
                summary.reserves.len(),
                summary.limit
            ));
            ActionOutcome::new(raid, true, ViewHint::Raid, reply)
        }
        RaidAction::RemoveReserve { item_id } => {
            let removed = raid.remove_reserve(user, item_id)?;
            let reply = notice(format!("Removed {} from your reserves.", removed.item_name));
            ActionOutcome::new(raid, true, ViewHint::Raid, reply)
        }
        RaidAction::ClearReserves => {
            raid.clear_reserves(user)?;
            ActionOutcome::new(raid, true, ViewHint::Raid, notice("Cleared all soft reserves."))
        }
        RaidAction::ListReserves => {
            let summary = raid.list_reserves(user)?;
            ActionOutcome::new(raid, false, ViewHint::Unchanged, Reply::Reserves(summary))
        }
        RaidAction::FinalizeOpen(role) => {
            raid.open_finalize(role)?;
            let view = finalize_view(&raid, role);
            ActionOutcome::new(raid, true, view, Reply::None)
        }
        RaidAction::ToggleSlot { role, participant } => {
            raid.toggle_slot(role, &participant)?;
            let view = finalize_view(&raid, role);
            ActionOutcome::new(raid, true, view, Reply::None)
        }
        RaidAction::Page { role, direction } => {
            raid.page_finalize(role, direction)?;
            let view = finalize_view(&raid, role);
            ActionOutcome::new(raid, true, view, Reply::None)
        }
        RaidAction::FinalizeBack => {
            raid.finalize_back();
            ActionOutcome::new(raid, true, ViewHint::Raid, Reply::None)
        }
        RaidAction::FinalizeConfirm => {
            raid.confirm_roster()?;
            ActionOutcome::new(raid, true, ViewHint::Roster, notice("Roster finalized and built."))
        }
        RaidAction::ExportFull => export_reply(raid, ExportKind::Full),
        RaidAction::ExportRoster => export_reply(raid, ExportKind::Roster),
        RaidAction::Publish => {
            raid.publish()?;
            ActionOutcome::new(raid, true, ViewHint::Roster, notice("Final roster published."))
        }
        RaidAction::RecordMessage { kind, message_id } => {
            match kind {
                MessageKind::Raid => raid.message_id = Some(message_id),
                MessageKind::Published => raid.published_message_id = Some(message_id),
            }
            raid.touch();
            ActionOutcome::new(raid, true, ViewHint::Unchanged, Reply::None)
        }
        RaidAction::UploadImportBlob { filename, data } => {
            raid.attach_import_file(&filename, data)?;
            ActionOutcome::new(raid, true, ViewHint::Roster, notice("Import string attached."))
        }
        RaidAction::DownloadImportBlob => {
            let file = raid.import_file()?.clone();
            ActionOutcome::new(raid, false, ViewHint::Unchanged, Reply::ImportFile(file))
        }
    };

    Ok(outcome)
}

fn create_raid(channel_id: &ChannelId, name: &str, slots: RoleCounts) -> Result<ActionOutcome, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::invalid_state("Raid name is required."));
    }
    let raid = Raid::create(channel_id.clone(), name, slots);
    let reply = notice(format!("Raid \"{}\" created.", raid.name));
    Ok(ActionOutcome::new(raid, true, ViewHint::Raid, reply))
}

fn export_reply(raid: Raid, kind: ExportKind) -> ActionOutcome {
    let reply = Reply::Export { filename: kind.filename(&raid.name), content: kind.render(&raid) };
    ActionOutcome::new(raid, false, ViewHint::Unchanged, reply)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuggestionMode {
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSuggestion {
    pub label: String,
    pub value: String,
}

/// Item picker options for a participant's reserve command. Empty unless the raid is open
/// and the participant has signed up.
pub fn suggest_reserves(
    raid: Option<&Raid>,
    participant: &ParticipantId,
    mode: SuggestionMode,
    query: &str,
    catalog: &ItemCatalog,
) -> Vec<ItemSuggestion> {
    let Some(signup) = raid.filter(|raid| !raid.locked).and_then(|raid| raid.signup(participant))
    else {
        return Vec::new();
    };

    match mode {
        SuggestionMode::Remove => signup
            .reserves
            .iter()
            .filter(|reserve| !reserve.item_name.is_empty())
            .take(MAX_SUGGESTIONS)
            .map(|reserve| ItemSuggestion {
                label: suggestion_label(&reserve.item_name),
                value: reserve.item_id.to_string(),
            })
            .collect(),
        SuggestionMode::Add => catalog
            .search_by_name(query, MAX_SUGGESTIONS)
            .into_iter()
            .map(|item| ItemSuggestion { label: suggestion_label(&item.name), value: item.id.to_string() })
            .collect(),
    }
}
