use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::raid::Role;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Playable classes, declared in roster priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassName {
    Warrior,
    DeathKnight,
    Paladin,
    Druid,
    Priest,
    Shaman,
    Hunter,
    Rogue,
    Mage,
    Warlock,
}

impl ClassName {
    pub const ALL: [ClassName; 10] = [
        ClassName::Warrior,
        ClassName::DeathKnight,
        ClassName::Paladin,
        ClassName::Druid,
        ClassName::Priest,
        ClassName::Shaman,
        ClassName::Hunter,
        ClassName::Rogue,
        ClassName::Mage,
        ClassName::Warlock,
    ];

    pub fn priority(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warrior => "Warrior",
            Self::DeathKnight => "DeathKnight",
            Self::Paladin => "Paladin",
            Self::Druid => "Druid",
            Self::Priest => "Priest",
            Self::Shaman => "Shaman",
            Self::Hunter => "Hunter",
            Self::Rogue => "Rogue",
            Self::Mage => "Mage",
            Self::Warlock => "Warlock",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.as_str() == value.trim())
    }
}

/// Sort key for an optional class: known classes by priority, unset last.
pub fn class_priority(class: Option<ClassName>) -> usize {
    class.map(ClassName::priority).unwrap_or(ClassName::ALL.len())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spec {
    Tank,
    Healer,
    #[serde(rename = "DPS")]
    Dps,
}

impl Spec {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tank => "Tank",
            Self::Healer => "Healer",
            Self::Dps => "DPS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Tank" => Some(Self::Tank),
            "Healer" => Some(Self::Healer),
            "DPS" => Some(Self::Dps),
            _ => None,
        }
    }

    pub fn role(self) -> Role {
        match self {
            Self::Tank => Role::Tanks,
            Self::Healer => Role::Healers,
            Self::Dps => Role::Dps,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Attend,
    Maybe,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attend => "attend",
            Self::Maybe => "maybe",
            Self::Absent => "absent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "attend" => Some(Self::Attend),
            "maybe" => Some(Self::Maybe),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    pub item_id: u32,
    pub item_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signup {
    pub user_id: ParticipantId,
    pub char_name: String,
    pub class_name: Option<ClassName>,
    pub spec: Option<Spec>,
    pub status: AttendanceStatus,
    pub reserves: Vec<Reserve>,
}

impl Signup {
    pub fn new(user_id: ParticipantId, char_name: impl Into<String>) -> Self {
        Self {
            user_id,
            char_name: char_name.into(),
            class_name: None,
            spec: None,
            status: AttendanceStatus::Attend,
            reserves: Vec::new(),
        }
    }

    /// Role whose soft-reserve limit applies. An unset spec counts as dps.
    pub fn reserve_role(&self) -> Role {
        self.spec.map(Spec::role).unwrap_or(Role::Dps)
    }

    pub fn is_candidate_for(&self, role: Role) -> bool {
        self.status == AttendanceStatus::Attend && self.spec == Some(role.spec())
    }

    pub fn has_reserve(&self, item_id: u32) -> bool {
        self.reserves.iter().any(|reserve| reserve.item_id == item_id)
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::SetClass(class) => self.class_name = Some(class),
            FieldUpdate::SetSpec(spec) => self.spec = Some(spec),
            FieldUpdate::SetStatus(status) => self.status = status,
        }
    }
}

/// Roster ordering: class priority, then character name.
pub fn roster_order(left: &Signup, right: &Signup) -> Ordering {
    class_priority(left.class_name)
        .cmp(&class_priority(right.class_name))
        .then_with(|| left.char_name.cmp(&right.char_name))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldUpdate {
    SetClass(ClassName),
    SetSpec(Spec),
    SetStatus(AttendanceStatus),
}

impl FieldUpdate {
    /// Parses a select-menu submission. Unknown fields or values yield `None`.
    pub fn parse(field: &str, value: &str) -> Option<Self> {
        match field.trim() {
            "class" | "className" => ClassName::parse(value).map(Self::SetClass),
            "spec" => Spec::parse(value).map(Self::SetSpec),
            "status" => AttendanceStatus::parse(value).map(Self::SetStatus),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        class_priority, roster_order, AttendanceStatus, ClassName, FieldUpdate, ParticipantId,
        Signup, Spec,
    };
    use crate::domain::raid::Role;

    fn signup(name: &str, class: Option<ClassName>) -> Signup {
        let mut signup = Signup::new(ParticipantId::new(name), name);
        signup.class_name = class;
        signup
    }

    #[test]
    fn field_update_parses_known_fields_only() {
        assert_eq!(
            FieldUpdate::parse("className", "DeathKnight"),
            Some(FieldUpdate::SetClass(ClassName::DeathKnight))
        );
        assert_eq!(FieldUpdate::parse("spec", "DPS"), Some(FieldUpdate::SetSpec(Spec::Dps)));
        assert_eq!(
            FieldUpdate::parse("status", "maybe"),
            Some(FieldUpdate::SetStatus(AttendanceStatus::Maybe))
        );
        assert_eq!(FieldUpdate::parse("guild", "Horde"), None);
        assert_eq!(FieldUpdate::parse("spec", "Bard"), None);
    }

    #[test]
    fn unset_spec_uses_dps_reserve_role() {
        let mut signup = signup("Jaina", Some(ClassName::Mage));
        assert_eq!(signup.reserve_role(), Role::Dps);

        signup.apply(FieldUpdate::SetSpec(Spec::Healer));
        assert_eq!(signup.reserve_role(), Role::Healers);
    }

    #[test]
    fn roster_order_puts_unknown_class_last_then_sorts_by_name() {
        let mut signups = vec![
            signup("zed", None),
            signup("Bolvar", Some(ClassName::Paladin)),
            signup("Arthas", Some(ClassName::DeathKnight)),
            signup("Garrosh", Some(ClassName::Warrior)),
            signup("Anduin", Some(ClassName::Paladin)),
        ];
        signups.sort_by(roster_order);

        let names: Vec<&str> = signups.iter().map(|s| s.char_name.as_str()).collect();
        assert_eq!(names, vec!["Garrosh", "Arthas", "Anduin", "Bolvar", "zed"]);
        assert_eq!(class_priority(None), 10);
    }

    #[test]
    fn candidate_requires_attend_and_matching_spec() {
        let mut signup = signup("Thrall", Some(ClassName::Shaman));
        signup.spec = Some(Spec::Healer);
        assert!(signup.is_candidate_for(Role::Healers));
        assert!(!signup.is_candidate_for(Role::Dps));

        signup.status = AttendanceStatus::Maybe;
        assert!(!signup.is_candidate_for(Role::Healers));
    }
}
