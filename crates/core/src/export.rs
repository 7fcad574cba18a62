//! Compact text export of the finalized roster.
//!
//! Full export: `R:<name>|S:<tanks>;<healers>;<dps>` followed by one `~N:<name>;<class>;<spec>;<ids>`
//! record per player, where `<ids>` are reserved item ids joined by `|`. Text fields are
//! percent-escaped byte-wise by [`escape_field`]. The roster export is the records alone.

use std::fmt::Write as _;

use crate::domain::raid::{Raid, Role};
use crate::domain::signup::Reserve;

pub const MAX_EXPORT_ENTRIES: usize = 40;

struct ExportEntry<'a> {
    name: &'a str,
    class_name: &'a str,
    spec: &'a str,
    reserves: &'a [Reserve],
}

/// Keeps ASCII word characters; every other UTF-8 byte, whitespace included, becomes `%XX`.
pub fn escape_field(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, "%{byte:02X}");
        }
    }
    escaped
}

fn export_entries(raid: &Raid) -> Vec<ExportEntry<'_>> {
    let entries: Vec<ExportEntry<'_>> = match &raid.roster {
        Some(roster) => Role::ALL
            .into_iter()
            .flat_map(|role| roster.get(role))
            .map(|entry| ExportEntry {
                name: &entry.name,
                class_name: entry.class_name.as_deref().unwrap_or(""),
                spec: &entry.spec,
                reserves: &entry.reserves,
            })
            .collect(),
        None => Role::ALL
            .into_iter()
            .flat_map(|role| raid.final_selection.get(role))
            .filter_map(|id| raid.signups.get(id))
            .map(|signup| ExportEntry {
                name: &signup.char_name,
                class_name: signup.class_name.map_or("", |class| class.as_str()),
                spec: signup.spec.map_or("Unknown", |spec| spec.as_str()),
                reserves: &signup.reserves,
            })
            .collect(),
    };

    entries
        .into_iter()
        .take(MAX_EXPORT_ENTRIES)
        .filter(|entry| !entry.name.is_empty() && !entry.class_name.is_empty())
        .collect()
}

fn push_entries(out: &mut String, raid: &Raid) {
    for entry in export_entries(raid) {
        let reserve_ids = entry
            .reserves
            .iter()
            .map(|reserve| reserve.item_id.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let _ = write!(
            out,
            "~N:{};{};{};{}",
            escape_field(entry.name),
            escape_field(entry.class_name),
            escape_field(entry.spec),
            reserve_ids
        );
    }
}

/// Header plus roster records. Empty unless the raid is locked.
pub fn full_export(raid: &Raid) -> String {
    if !raid.locked {
        return String::new();
    }

    let mut out = format!(
        "R:{}|S:{};{};{}",
        escape_field(&raid.name),
        raid.slots.tanks,
        raid.slots.healers,
        raid.slots.dps
    );
    push_entries(&mut out, raid);
    out
}

/// Roster records only. Empty unless the raid is locked.
pub fn roster_export(raid: &Raid) -> String {
    if !raid.locked {
        return String::new();
    }

    let mut out = String::new();
    push_entries(&mut out, raid);
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Full,
    Roster,
}

impl ExportKind {
    pub fn render(self, raid: &Raid) -> String {
        match self {
            Self::Full => full_export(raid),
            Self::Roster => roster_export(raid),
        }
    }

    pub fn filename(self, raid_name: &str) -> String {
        let stem: String = raid_name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        match self {
            Self::Full => format!("{stem}_full_export.txt"),
            Self::Roster => format!("{stem}_roster_export.txt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_field, full_export, roster_export, ExportKind, MAX_EXPORT_ENTRIES};
    use crate::domain::raid::{ChannelId, Raid, Role, RoleCounts};
    use crate::domain::signup::{ClassName, ParticipantId, Reserve, Spec};

    fn add_player(raid: &mut Raid, id: &str, name: &str, class: Option<ClassName>, spec: Spec) {
        raid.submit_signup(&ParticipantId::new(id), name).expect("signup");
        let signup = raid.signups.get_mut(&ParticipantId::new(id)).expect("present");
        signup.class_name = class;
        signup.spec = Some(spec);
        raid.final_selection.get_mut(spec.role()).push(ParticipantId::new(id));
    }

    #[test]
    fn full_export_matches_the_known_encoding() {
        let mut raid = Raid::create(ChannelId::new("C1"), "MC Run", RoleCounts::new(2, 3, 5));
        add_player(&mut raid, "U1", "Thrall#1", Some(ClassName::Warrior), Spec::Tank);
        raid.close().expect("close");
        raid.confirm_roster().expect("confirm");

        assert_eq!(full_export(&raid), "R:MC%20Run|S:2;3;5~N:Thrall%231;Warrior;Tank;");
        assert_eq!(roster_export(&raid), "~N:Thrall%231;Warrior;Tank;");
    }

    #[test]
    fn exports_are_empty_while_the_raid_is_open() {
        let mut raid = Raid::create(ChannelId::new("C1"), "MC", RoleCounts::new(1, 1, 1));
        add_player(&mut raid, "U1", "Thrall", Some(ClassName::Shaman), Spec::Healer);

        assert_eq!(full_export(&raid), "");
        assert_eq!(roster_export(&raid), "");
    }

    #[test]
    fn unconfirmed_selection_is_resolved_against_live_signups() {
        let mut raid = Raid::create(ChannelId::new("C1"), "BWL", RoleCounts::new(1, 1, 2));
        add_player(&mut raid, "U1", "Jaina", Some(ClassName::Mage), Spec::Dps);
        add_player(&mut raid, "U2", "Anon", None, Spec::Dps);
        add_player(&mut raid, "U3", "Varian", Some(ClassName::Warrior), Spec::Tank);
        raid.signups.get_mut(&ParticipantId::new("U1")).expect("U1").reserves = vec![
            Reserve { item_id: 19019, item_name: "Thunderfury".to_owned() },
            Reserve { item_id: 17076, item_name: "Bonereaver's Edge".to_owned() },
        ];
        raid.final_selection.get_mut(Role::Dps).push(ParticipantId::new("gone"));
        raid.locked = true;

        assert_eq!(
            roster_export(&raid),
            "~N:Varian;Warrior;Tank;~N:Jaina;Mage;DPS;19019|17076"
        );
    }

    #[test]
    fn confirming_does_not_bring_classless_players_into_the_export() {
        let mut raid = Raid::create(ChannelId::new("C1"), "ZG", RoleCounts::new(1, 1, 2));
        add_player(&mut raid, "U1", "Jaina", Some(ClassName::Mage), Spec::Dps);
        add_player(&mut raid, "U2", "Anon", None, Spec::Dps);
        raid.close().expect("close");

        let live = full_export(&raid);
        raid.confirm_roster().expect("confirm");

        assert_eq!(full_export(&raid), live);
        assert_eq!(roster_export(&raid), "~N:Jaina;Mage;DPS;");
        assert!(!full_export(&raid).contains("~N:Anon"));
    }

    #[test]
    fn roster_export_is_truncated_to_forty_entries() {
        let mut raid = Raid::create(ChannelId::new("C1"), "AQ40", RoleCounts::new(5, 10, 45));
        for index in 0..50 {
            let spec = if index < 5 { Spec::Tank } else { Spec::Dps };
            add_player(&mut raid, &format!("U{index:02}"), &format!("P{index:02}"), Some(ClassName::Rogue), spec);
        }
        raid.close().expect("close");
        raid.confirm_roster().expect("confirm");

        let export = roster_export(&raid);
        assert_eq!(export.matches("~N:").count(), MAX_EXPORT_ENTRIES);
        assert!(export.starts_with("~N:P00;Rogue;Tank;"));
        assert!(export.ends_with("~N:P39;Rogue;DPS;"));
    }

    #[test]
    fn escaping_is_bytewise_and_uppercase() {
        assert_eq!(escape_field("Zul'Gurub 20"), "Zul%27Gurub%2020");
        assert_eq!(escape_field("Ñ"), "%C3%91");
        assert_eq!(escape_field("a_b\tc\r\n"), "a_b%09c%0D%0A");
        assert_eq!(escape_field("Thrall;Warrior|1"), "Thrall%3BWarrior%7C1");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn filenames_replace_non_alphanumerics() {
        assert_eq!(ExportKind::Full.filename("MC Run #2"), "MC_Run__2_full_export.txt");
        assert_eq!(ExportKind::Roster.filename("Naxx"), "Naxx_roster_export.txt");
    }
}
