use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::signup::{ParticipantId, Reserve, Signup, Spec};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaidId(pub String);

impl RaidId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tanks,
    Healers,
    Dps,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Tanks, Role::Healers, Role::Dps];

    pub fn key(self) -> &'static str {
        match self {
            Self::Tanks => "tanks",
            Self::Healers => "healers",
            Self::Dps => "dps",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        match value.trim() {
            "tanks" => Some(Self::Tanks),
            "healers" => Some(Self::Healers),
            "dps" => Some(Self::Dps),
            _ => None,
        }
    }

    pub fn spec(self) -> Spec {
        match self {
            Self::Tanks => Spec::Tank,
            Self::Healers => Spec::Healer,
            Self::Dps => Spec::Dps,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Tanks => "Tanks",
            Self::Healers => "Healers",
            Self::Dps => "DPS",
        }
    }
}

/// Non-negative per-role counts, used for slot capacities and reserve limits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub tanks: u32,
    pub healers: u32,
    pub dps: u32,
}

impl RoleCounts {
    pub fn new(tanks: u32, healers: u32, dps: u32) -> Self {
        Self { tanks, healers, dps }
    }

    pub fn get(&self, role: Role) -> u32 {
        match role {
            Role::Tanks => self.tanks,
            Role::Healers => self.healers,
            Role::Dps => self.dps,
        }
    }

    pub fn total(&self) -> u32 {
        self.tanks.saturating_add(self.healers).saturating_add(self.dps)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSelection {
    pub tanks: Vec<ParticipantId>,
    pub healers: Vec<ParticipantId>,
    pub dps: Vec<ParticipantId>,
}

impl RoleSelection {
    pub fn get(&self, role: Role) -> &[ParticipantId] {
        match role {
            Role::Tanks => &self.tanks,
            Role::Healers => &self.healers,
            Role::Dps => &self.dps,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut Vec<ParticipantId> {
        match role {
            Role::Tanks => &mut self.tanks,
            Role::Healers => &mut self.healers,
            Role::Dps => &mut self.dps,
        }
    }

    pub fn contains(&self, role: Role, participant: &ParticipantId) -> bool {
        self.get(role).contains(participant)
    }

    pub fn is_empty(&self) -> bool {
        Role::ALL.into_iter().all(|role| self.get(role).is_empty())
    }
}

/// Finalize-view cursor shared by every admin working on the raid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeCursor {
    pub role: Option<Role>,
    pub page: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFile {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    /// Unset when the player never picked a class; such entries are left out of exports.
    #[serde(default)]
    pub class_name: Option<String>,
    pub spec: String,
    pub reserves: Vec<Reserve>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub tanks: Vec<RosterEntry>,
    pub healers: Vec<RosterEntry>,
    pub dps: Vec<RosterEntry>,
}

impl Roster {
    pub fn get(&self, role: Role) -> &[RosterEntry] {
        match role {
            Role::Tanks => &self.tanks,
            Role::Healers => &self.healers,
            Role::Dps => &self.dps,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut Vec<RosterEntry> {
        match role {
            Role::Tanks => &mut self.tanks,
            Role::Healers => &mut self.healers,
            Role::Dps => &mut self.dps,
        }
    }

    pub fn len(&self) -> usize {
        Role::ALL.into_iter().map(|role| self.get(role).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raid {
    pub channel_id: ChannelId,
    pub id: RaidId,
    pub name: String,
    pub slots: RoleCounts,
    pub soft_reserve_limits: RoleCounts,
    pub signups: BTreeMap<ParticipantId, Signup>,
    pub locked: bool,
    pub final_selection: RoleSelection,
    pub roster: Option<Roster>,
    pub temp_finalize: FinalizeCursor,
    pub import_string_file: Option<ImportFile>,
    pub message_id: Option<String>,
    pub published_message_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Persisted revision this copy was loaded at. Owned by the repository.
    #[serde(default)]
    pub version: u64,
}

impl Raid {
    /// Builds a fresh raid for `channel_id`. Every field starts from its empty default and
    /// the raid gets a new identifier, so this doubles as the recreate operation.
    pub fn create(channel_id: ChannelId, name: impl Into<String>, slots: RoleCounts) -> Self {
        let now = Utc::now();
        Self {
            channel_id,
            id: RaidId::generate(),
            name: name.into(),
            slots,
            soft_reserve_limits: RoleCounts::default(),
            signups: BTreeMap::new(),
            locked: false,
            final_selection: RoleSelection::default(),
            roster: None,
            temp_finalize: FinalizeCursor::default(),
            import_string_file: None,
            message_id: None,
            published_message_id: None,
            published_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn signup(&self, participant: &ParticipantId) -> Option<&Signup> {
        self.signups.get(participant)
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelId, Raid, Role, RoleCounts, RoleSelection};
    use crate::domain::signup::ParticipantId;

    #[test]
    fn create_starts_open_and_empty() {
        let raid = Raid::create(ChannelId::new("C1"), "Molten Core", RoleCounts::new(2, 5, 13));

        assert!(!raid.locked);
        assert!(raid.signups.is_empty());
        assert!(raid.final_selection.is_empty());
        assert_eq!(raid.soft_reserve_limits, RoleCounts::default());
        assert_eq!(raid.slots.total(), 20);
        assert!(raid.roster.is_none());
        assert_eq!(raid.temp_finalize.role, None);
    }

    #[test]
    fn create_assigns_a_new_identifier_each_time() {
        let first = Raid::create(ChannelId::new("C1"), "MC", RoleCounts::default());
        let second = Raid::create(ChannelId::new("C1"), "MC", RoleCounts::default());
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn role_selection_tracks_membership_per_role() {
        let mut selection = RoleSelection::default();
        selection.get_mut(Role::Healers).push(ParticipantId::new("U1"));

        assert!(selection.contains(Role::Healers, &ParticipantId::new("U1")));
        assert!(!selection.contains(Role::Tanks, &ParticipantId::new("U1")));
        assert!(!selection.is_empty());
    }

    #[test]
    fn raid_document_serializes_roles_and_specs_by_display_key() {
        let mut raid = Raid::create(ChannelId::new("C9"), "Naxx", RoleCounts::new(1, 1, 1));
        raid.final_selection.get_mut(Role::Dps).push(ParticipantId::new("U7"));

        let json = serde_json::to_value(&raid).expect("serialize");
        assert_eq!(json["final_selection"]["dps"][0], "U7");
        assert_eq!(json["slots"]["healers"], 1);

        let decoded: Raid = serde_json::from_value(json).expect("deserialize");
        assert_eq!(decoded, raid);
    }
}
