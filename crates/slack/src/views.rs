//! Block Kit renderings of raid state.
//!
//! Views are pure functions of the raid. Interactive element ids are the constants in
//! this module; [`crate::events::parse_block_action`] maps them back to actions.

use raidbook_core::actions::ItemSuggestion;
use raidbook_core::domain::raid::{Raid, Role, RosterEntry};
use raidbook_core::domain::signup::{
    class_priority, roster_order, AttendanceStatus, ClassName, Signup, Spec,
};
use raidbook_core::finalize::FinalizePage;
use raidbook_core::registry::ReserveSummary;

use crate::blocks::{ButtonElement, ButtonStyle, MessageBuilder, MessageTemplate, StaticSelectElement};

pub const MANAGE_SIGNUP: &str = "raid_manage";
pub const DELETE_SIGNUP: &str = "raid_delete_signup";
pub const DELETE_SIGNUP_CONFIRM: &str = "signup_delete_confirm";
pub const DELETE_SIGNUP_CANCEL: &str = "signup_delete_cancel";
pub const SET_RESERVE_LIMITS: &str = "raid_set_sr";
pub const CLOSE_RAID: &str = "raid_close";
pub const FINALIZE_PREFIX: &str = "raid_finalize_";
pub const SLOT_PREFIX: &str = "slot_";
pub const PAGE_PREFIX: &str = "finalize_page_";
pub const FINALIZE_BACK: &str = "finalize_back";
pub const FINALIZE_CONFIRM: &str = "finalize_confirm";
pub const PUBLISH: &str = "raid_publish";
pub const EXPORT_FULL: &str = "raid_export_full";
pub const EXPORT_ROSTER: &str = "raid_export_roster";
pub const UPLOAD_IMPORT: &str = "raid_upload_import";
pub const DOWNLOAD_IMPORT: &str = "raid_download_import";
pub const SELECT_CLASS: &str = "signup_className";
pub const SELECT_SPEC: &str = "signup_spec";
pub const SELECT_STATUS: &str = "signup_status";
pub const SIGNUP_CONFIRM: &str = "signup_confirm";
pub const SIGNUP_CHANGE: &str = "signup_change";
pub const RESERVE_ADD: &str = "sr_add";
pub const RESERVE_REMOVE: &str = "sr_remove";

const BUTTONS_PER_ROW: usize = 5;
const NONE_TEXT: &str = "_None_";

pub fn class_emoji(class: Option<ClassName>) -> &'static str {
    match class {
        Some(ClassName::Warrior) => "🪓",
        Some(ClassName::Paladin) => "🔨",
        Some(ClassName::Hunter) => "🏹",
        Some(ClassName::Rogue) => "🗡️",
        Some(ClassName::Priest) => "🙏",
        Some(ClassName::Shaman) => "⚡",
        Some(ClassName::Mage) => "🔥",
        Some(ClassName::Warlock) => "😈",
        Some(ClassName::Druid) => "🐻",
        Some(ClassName::DeathKnight) => "💀",
        None => "❓",
    }
}

pub fn role_emoji(role: Role) -> &'static str {
    match role {
        Role::Tanks => "🛡️",
        Role::Healers => "💚",
        Role::Dps => "⚔️",
    }
}

fn player_line(signup: &Signup) -> String {
    format!("{} *{}*", class_emoji(signup.class_name), signup.char_name)
}

fn roster_entry_class(entry: &RosterEntry) -> Option<ClassName> {
    entry.class_name.as_deref().and_then(ClassName::parse)
}

/// Confirmed roster lines when a snapshot exists, otherwise the live selection.
fn published_lines(raid: &Raid, role: Role) -> Vec<String> {
    if let Some(roster) = &raid.roster {
        let mut entries: Vec<&RosterEntry> = roster.get(role).iter().collect();
        entries.sort_by(|left, right| {
            class_priority(roster_entry_class(left))
                .cmp(&class_priority(roster_entry_class(right)))
                .then_with(|| left.name.cmp(&right.name))
        });
        return entries
            .into_iter()
            .map(|entry| format!("{} *{}*", class_emoji(roster_entry_class(entry)), entry.name))
            .collect();
    }

    let mut players: Vec<&Signup> =
        raid.final_selection.get(role).iter().filter_map(|id| raid.signups.get(id)).collect();
    players.sort_by(|left, right| roster_order(left, right));
    players.into_iter().map(player_line).collect()
}

fn lines_or_none(lines: Vec<String>) -> String {
    if lines.is_empty() {
        NONE_TEXT.to_owned()
    } else {
        lines.join("\n")
    }
}

fn attending(raid: &Raid, spec: Spec) -> Vec<&Signup> {
    let mut players: Vec<&Signup> = raid
        .signups
        .values()
        .filter(|signup| signup.status == AttendanceStatus::Attend && signup.spec == Some(spec))
        .collect();
    players.sort_by(|left, right| roster_order(left, right));
    players
}

fn with_status(raid: &Raid, status: AttendanceStatus) -> Vec<&Signup> {
    let mut players: Vec<&Signup> =
        raid.signups.values().filter(|signup| signup.status == status).collect();
    players.sort_by(|left, right| left.char_name.cmp(&right.char_name));
    players
}

fn counts_line(label: &str, tanks: u32, healers: u32, dps: u32) -> String {
    format!("*{label}:* T:{tanks} H:{healers} D:{dps}")
}

/// Main raid message. Admin controls are included when `is_admin` is set.
pub fn render_open_view(raid: &Raid, is_admin: bool) -> MessageTemplate {
    let status = if raid.locked { "🔒 Locked" } else { "🟢 Open" };
    let limits = raid.soft_reserve_limits;
    let overview = format!(
        "*Status:* {status}    {}    {}",
        counts_line("Slots", raid.slots.tanks, raid.slots.healers, raid.slots.dps),
        counts_line("Soft Reserves", limits.tanks, limits.healers, limits.dps),
    );

    let mut builder = MessageBuilder::new(format!("Raid: {}", raid.name))
        .section("raid.view.title.v1", |section| {
            section.mrkdwn(format!("*Raid: {}*", raid.name));
        })
        .section("raid.view.overview.v1", |section| {
            section.mrkdwn(overview);
        })
        .divider("raid.view.divider.v1");

    for role in Role::ALL {
        let players: Vec<String> = attending(raid, role.spec()).into_iter().map(player_line).collect();
        builder = builder.section(format!("raid.view.role.{}.v1", role.key()), |section| {
            section.mrkdwn(format!("*{} {}*\n{}", role_emoji(role), role.label(), lines_or_none(players)));
        });
    }

    for (status, title) in [(AttendanceStatus::Maybe, "🟡 Maybe"), (AttendanceStatus::Absent, "🔴 Absent")] {
        let players: Vec<String> = with_status(raid, status).into_iter().map(player_line).collect();
        builder = builder.section(format!("raid.view.status.{}.v1", status.as_str()), |section| {
            section.mrkdwn(format!("*{title}*\n{}", lines_or_none(players)));
        });
    }

    if !raid.locked {
        builder = builder.actions("raid.view.signup.actions.v1", |actions| {
            actions
                .button(ButtonElement::new(MANAGE_SIGNUP, "Manage Signup").style(ButtonStyle::Primary))
                .button(ButtonElement::new(DELETE_SIGNUP, "Delete Signup").style(ButtonStyle::Danger));
        });
        if is_admin {
            builder = builder.actions("raid.view.admin.actions.v1", |actions| {
                actions
                    .button(ButtonElement::new(SET_RESERVE_LIMITS, "Set Soft Reserve Limits"))
                    .button(ButtonElement::new(CLOSE_RAID, "Close Raid").style(ButtonStyle::Danger));
            });
        }
    } else if is_admin {
        builder = builder
            .actions("raid.view.finalize.actions.v1", |actions| {
                for role in Role::ALL {
                    actions.button(
                        ButtonElement::new(format!("{FINALIZE_PREFIX}{}", role.key()), format!("Finalize {}", role.label()))
                            .style(ButtonStyle::Primary),
                    );
                }
                actions.button(ButtonElement::new(FINALIZE_CONFIRM, "Confirm Roster").style(ButtonStyle::Primary));
                if !raid.final_selection.is_empty() {
                    actions.button(ButtonElement::new(PUBLISH, "Publish Raid").style(ButtonStyle::Primary));
                }
            })
            .actions("raid.view.export.actions.v1", |actions| {
                actions
                    .button(ButtonElement::new(EXPORT_FULL, "Export Raid"))
                    .button(ButtonElement::new(EXPORT_ROSTER, "Export Roster"));
            });
    }

    builder.build()
}

fn class_summary_text(page: &FinalizePage) -> String {
    if page.class_summary.is_empty() {
        return "_no one selected yet_".to_owned();
    }
    page.class_summary
        .iter()
        .map(|(class, count)| format!("{}: {count}", class.map_or("Unknown", ClassName::as_str)))
        .collect::<Vec<_>>()
        .join(" • ")
}

/// Per-role selection view for the finalize step. Non-admins get the summary without buttons.
pub fn render_finalize_view(raid: &Raid, role: Role, page: u32, is_admin: bool) -> MessageTemplate {
    let view = raid.finalize_page(role, page);
    let mut header = format!(
        "{} *Finalize {}*  ({}/{})",
        role_emoji(role),
        role.label(),
        view.selected_count,
        view.capacity
    );
    if view.is_paginated() {
        header.push_str(&format!("   Page {}/{}", view.page + 1, view.page_count));
    }

    let mut builder = MessageBuilder::new(format!("Finalize {}", role.label()))
        .section("raid.finalize.header.v1", |section| {
            section.mrkdwn(header);
        })
        .section("raid.finalize.classes.v1", |section| {
            section.mrkdwn(format!("*Selected classes:* {}", class_summary_text(&view)));
        });

    if view.selected_count == 0 {
        builder = builder.context("raid.finalize.hint.v1", |context| {
            context.mrkdwn("_Click buttons to select players_ → green = selected");
        });
    }

    if !is_admin {
        return builder.build();
    }

    for (row, chunk) in view.entries.chunks(BUTTONS_PER_ROW).enumerate() {
        builder = builder.actions(format!("raid.finalize.slots.{row}.v1"), |actions| {
            for candidate in chunk {
                let label = format!("{} {}", class_emoji(candidate.class_name), candidate.char_name);
                let mut button = ButtonElement::new(
                    format!("{SLOT_PREFIX}{}_{}", role.key(), candidate.user_id.as_str()),
                    label,
                );
                if candidate.selected {
                    button = button.style(ButtonStyle::Primary);
                }
                actions.button(button);
            }
        });
    }

    builder
        .actions("raid.finalize.nav.v1", |actions| {
            if view.is_paginated() && view.has_prev() {
                actions.button(ButtonElement::new(format!("{PAGE_PREFIX}{}_prev", role.key()), "◀ Prev"));
            }
            if view.is_paginated() && view.has_next() {
                actions.button(ButtonElement::new(format!("{PAGE_PREFIX}{}_next", role.key()), "Next ▶"));
            }
            actions.button(ButtonElement::new(FINALIZE_BACK, "Back to Raid").style(ButtonStyle::Danger));
        })
        .build()
}

/// Durable roster message posted on publish.
pub fn render_published_view(raid: &Raid, is_admin: bool) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("Final Roster: {}", raid.name))
        .section("raid.roster.title.v1", |section| {
            section.mrkdwn(format!("*Final Roster: {}*\n🔒 *Final Roster*", raid.name));
        });

    for role in Role::ALL {
        let lines = published_lines(raid, role);
        builder = builder.section(format!("raid.roster.role.{}.v1", role.key()), |section| {
            section.mrkdwn(format!("*{} {}*\n{}", role_emoji(role), role.label(), lines_or_none(lines)));
        });
    }

    let has_import = raid.import_string_file.as_ref().is_some_and(|file| !file.data.is_empty());
    builder
        .actions("raid.roster.actions.v1", |actions| {
            if is_admin {
                actions.button(
                    ButtonElement::new(UPLOAD_IMPORT, "Upload Import String").style(ButtonStyle::Primary),
                );
            }
            if has_import {
                actions.button(ButtonElement::new(DOWNLOAD_IMPORT, "Download Import String"));
            }
        })
        .build()
}

/// Class, spec and status pickers for the viewer's signup.
pub fn render_signup_panel(signup: &Signup, heading: &str) -> MessageTemplate {
    let class_select = ClassName::ALL
        .into_iter()
        .fold(StaticSelectElement::new(SELECT_CLASS, "Class"), |select, class| {
            select.option(format!("{} {}", class_emoji(Some(class)), class.as_str()), class.as_str())
        })
        .initial(signup.class_name.map(ClassName::as_str));

    let spec_select = [Spec::Tank, Spec::Healer, Spec::Dps]
        .into_iter()
        .fold(StaticSelectElement::new(SELECT_SPEC, "Spec"), |select, spec| {
            select.option(spec.as_str(), spec.as_str())
        })
        .initial(signup.spec.map(Spec::as_str));

    let status_select = StaticSelectElement::new(SELECT_STATUS, "Status")
        .option("Attend", AttendanceStatus::Attend.as_str())
        .option("Maybe", AttendanceStatus::Maybe.as_str())
        .option("Absent", AttendanceStatus::Absent.as_str())
        .initial(Some(signup.status.as_str()));

    MessageBuilder::new(heading.to_owned())
        .section("raid.signup.heading.v1", |section| {
            section.mrkdwn(format!("{heading} *{}*", signup.char_name));
        })
        .actions("raid.signup.selects.v1", |actions| {
            actions.select(class_select).select(spec_select).select(status_select);
        })
        .actions("raid.signup.confirm.v1", |actions| {
            actions.button(ButtonElement::new(SIGNUP_CONFIRM, "Confirm Signup").style(ButtonStyle::Primary));
        })
        .build()
}

/// Confirmation shown once class and spec are chosen.
pub fn render_signup_summary(raid: &Raid, signup: &Signup) -> MessageTemplate {
    let class = signup.class_name.map_or("Unknown", ClassName::as_str);
    let spec = signup.spec.map_or("Unknown", Spec::as_str);
    let mut text = format!(
        "✅ You are signed up as *{}* ({class} - {spec} - {})",
        signup.char_name,
        signup.status.as_str()
    );

    let limit = raid.reserve_limit_for(signup);
    if limit > 0 {
        text.push_str(&format!(
            "\n\nSoft Reserves: You may reserve up to *{limit}* items.\nUse these commands in this channel:\n• `/sr add <item>`\n• `/sr list`\n• `/sr remove <item>`\n• `/sr clear`"
        ));
    }

    MessageBuilder::new("Signup confirmed")
        .section("raid.signup.summary.v1", |section| {
            section.mrkdwn(text);
        })
        .actions("raid.signup.change.v1", |actions| {
            actions.button(ButtonElement::new(SIGNUP_CHANGE, "Change Signup").style(ButtonStyle::Primary));
        })
        .build()
}

pub fn render_delete_prompt() -> MessageTemplate {
    MessageBuilder::new("Delete your signup?")
        .section("raid.signup.delete.v1", |section| {
            section.mrkdwn("Are you sure you want to delete your signup?");
        })
        .actions("raid.signup.delete.actions.v1", |actions| {
            actions
                .button(ButtonElement::new(DELETE_SIGNUP_CONFIRM, "Delete").style(ButtonStyle::Danger))
                .button(ButtonElement::new(DELETE_SIGNUP_CANCEL, "Cancel"));
        })
        .build()
}

pub fn render_reserves(summary: &ReserveSummary) -> MessageTemplate {
    let text = if summary.reserves.is_empty() {
        "No soft reserves yet.".to_owned()
    } else {
        let lines: Vec<String> = summary
            .reserves
            .iter()
            .map(|reserve| format!("• {} (`{}`)", reserve.item_name, reserve.item_id))
            .collect();
        format!("*Your soft reserves ({}/{})*\n{}", summary.reserves.len(), summary.limit, lines.join("\n"))
    };

    MessageBuilder::new("Your soft reserves")
        .section("raid.reserves.list.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

/// Item picker for `/sr add <name>` and `/sr remove`. Each button carries the item id.
pub fn render_item_suggestions(suggestions: &[ItemSuggestion], action_id: &str) -> MessageTemplate {
    if suggestions.is_empty() {
        return crate::blocks::notice_message("No matching items.");
    }

    let mut builder = MessageBuilder::new("Pick an item").section("raid.items.heading.v1", |section| {
        section.mrkdwn("Pick an item:");
    });
    for (row, chunk) in suggestions.chunks(BUTTONS_PER_ROW).enumerate() {
        builder = builder.actions(format!("raid.items.row.{row}.v1"), |actions| {
            for (index, suggestion) in chunk.iter().enumerate() {
                actions.button(
                    ButtonElement::new(
                        format!("{action_id}_{}", row * BUTTONS_PER_ROW + index),
                        suggestion.label.clone(),
                    )
                    .value(suggestion.value.clone()),
                );
            }
        });
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use raidbook_core::actions::ItemSuggestion;
    use raidbook_core::domain::raid::{ChannelId, ImportFile, Raid, Role, RoleCounts};
    use raidbook_core::domain::signup::{AttendanceStatus, ClassName, ParticipantId, Spec};

    use super::{
        class_emoji, render_finalize_view, render_item_suggestions, render_open_view,
        render_published_view, render_signup_panel, CLOSE_RAID, DOWNLOAD_IMPORT, EXPORT_FULL,
        FINALIZE_BACK, MANAGE_SIGNUP, PUBLISH, UPLOAD_IMPORT,
    };
    use raidbook_core::export::roster_export;

    use crate::blocks::{ActionElement, Block};

    fn add(raid: &mut Raid, id: &str, name: &str, class: ClassName, spec: Spec) {
        raid.submit_signup(&ParticipantId::new(id), name).expect("signup");
        let signup = raid.signups.get_mut(&ParticipantId::new(id)).expect("present");
        signup.class_name = Some(class);
        signup.spec = Some(spec);
    }

    fn raid() -> Raid {
        let mut raid = Raid::create(ChannelId::new("C1"), "Molten Core", RoleCounts::new(1, 1, 2));
        add(&mut raid, "U1", "Thrall", ClassName::Shaman, Spec::Healer);
        add(&mut raid, "U2", "Garrosh", ClassName::Warrior, Spec::Tank);
        add(&mut raid, "U3", "Jaina", ClassName::Mage, Spec::Dps);
        raid.signups.get_mut(&ParticipantId::new("U3")).expect("U3").status = AttendanceStatus::Maybe;
        raid
    }

    #[test]
    fn open_view_lists_attendees_by_role_and_status() {
        let message = render_open_view(&raid(), false);
        let text = message.text();

        assert!(text.contains("*Raid: Molten Core*"));
        assert!(text.contains("T:1 H:1 D:2"));
        assert!(text.contains("🪓 *Garrosh*"));
        assert!(text.contains("*🟡 Maybe*\n🔥 *Jaina*"));
        assert!(text.contains("*⚔️ DPS*\n_None_"));
        assert!(message.action_ids().contains(&MANAGE_SIGNUP));
        assert!(!message.action_ids().contains(&CLOSE_RAID));
    }

    #[test]
    fn locked_view_offers_finalize_controls_to_admins_only() {
        let mut raid = raid();
        raid.locked = true;

        let player = render_open_view(&raid, false);
        assert!(player.action_ids().is_empty());

        let admin = render_open_view(&raid, true);
        let ids = admin.action_ids();
        assert!(ids.contains(&"raid_finalize_tanks"));
        assert!(ids.contains(&EXPORT_FULL));
        assert!(!ids.contains(&PUBLISH));

        raid.final_selection.get_mut(Role::Tanks).push(ParticipantId::new("U2"));
        assert!(render_open_view(&raid, true).action_ids().contains(&PUBLISH));
    }

    #[test]
    fn finalize_view_encodes_role_and_user_in_slot_ids() {
        let mut raid = raid();
        raid.locked = true;
        raid.open_finalize(Role::Tanks).expect("open");
        raid.toggle_slot(Role::Tanks, &ParticipantId::new("U2")).expect("toggle");

        let message = render_finalize_view(&raid, Role::Tanks, 0, true);
        assert!(message.text().contains("*Finalize Tanks*  (1/1)"));
        assert!(message.text().contains("Warrior: 1"));
        assert_eq!(message.action_ids(), vec!["slot_tanks_U2", FINALIZE_BACK]);

        let read_only = render_finalize_view(&raid, Role::Tanks, 0, false);
        assert!(read_only.action_ids().is_empty());
    }

    #[test]
    fn finalize_view_pages_through_large_candidate_lists() {
        let mut raid = Raid::create(ChannelId::new("C1"), "AQ40", RoleCounts::new(1, 1, 30));
        for index in 0..45 {
            add(&mut raid, &format!("U{index:02}"), &format!("P{index:02}"), ClassName::Rogue, Spec::Dps);
        }
        raid.locked = true;

        let first = render_finalize_view(&raid, Role::Dps, 0, true);
        assert!(first.text().contains("Page 1/3"));
        let ids = first.action_ids();
        assert_eq!(ids.iter().filter(|id| id.starts_with("slot_dps_")).count(), 20);
        assert!(ids.contains(&"finalize_page_dps_next"));
        assert!(!ids.contains(&"finalize_page_dps_prev"));

        let last = render_finalize_view(&raid, Role::Dps, 2, true);
        assert_eq!(last.action_ids().iter().filter(|id| id.starts_with("slot_dps_")).count(), 5);
        assert!(!last.action_ids().contains(&"finalize_page_dps_next"));
    }

    #[test]
    fn published_view_offers_download_once_a_file_is_attached() {
        let mut raid = raid();
        raid.final_selection.get_mut(Role::Healers).push(ParticipantId::new("U1"));

        let bare = render_published_view(&raid, false);
        assert!(bare.text().contains("⚡ *Thrall*"));
        assert!(bare.action_ids().is_empty());

        raid.import_string_file = Some(ImportFile { filename: "wa.txt".to_owned(), data: b"x".to_vec() });
        assert_eq!(render_published_view(&raid, true).action_ids(), vec![UPLOAD_IMPORT, DOWNLOAD_IMPORT]);
    }

    #[test]
    fn published_view_shows_the_confirmed_roster_not_later_toggles() {
        let mut raid = raid();
        raid.close().expect("close");
        raid.open_finalize(Role::Healers).expect("open");
        raid.toggle_slot(Role::Healers, &ParticipantId::new("U1")).expect("select");
        raid.confirm_roster().expect("confirm");
        raid.publish().expect("publish");

        raid.open_finalize(Role::Tanks).expect("reopen");
        raid.toggle_slot(Role::Healers, &ParticipantId::new("U1")).expect("deselect");
        raid.toggle_slot(Role::Tanks, &ParticipantId::new("U2")).expect("select");

        let text = render_published_view(&raid, false).text();
        assert!(text.contains("⚡ *Thrall*"));
        assert!(!text.contains("Garrosh"));
        assert_eq!(roster_export(&raid), "~N:Thrall;Shaman;Healer;");
    }

    #[test]
    fn signup_panel_preselects_current_values() {
        let raid = raid();
        let signup = raid.signup(&ParticipantId::new("U2")).expect("U2");
        let panel = render_signup_panel(signup, "Update signup for");

        let selects: Vec<_> = panel
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Actions { elements, .. } => Some(elements),
                _ => None,
            })
            .flatten()
            .filter_map(|element| match element {
                ActionElement::StaticSelect(select) => Some(select),
                ActionElement::Button(_) => None,
            })
            .collect();

        assert_eq!(selects.len(), 3);
        assert_eq!(selects[0].initial_option.as_ref().map(|o| o.value.as_str()), Some("Warrior"));
        assert_eq!(selects[1].initial_option.as_ref().map(|o| o.value.as_str()), Some("Tank"));
        assert_eq!(selects[2].initial_option.as_ref().map(|o| o.value.as_str()), Some("attend"));
    }

    #[test]
    fn item_suggestions_carry_ids_in_button_values() {
        let suggestions = vec![
            ItemSuggestion { label: "Bonereaver's Edge".to_owned(), value: "17076".to_owned() },
            ItemSuggestion { label: "Thunderfury".to_owned(), value: "19019".to_owned() },
        ];
        let message = render_item_suggestions(&suggestions, "sr_add");
        assert_eq!(message.action_ids(), vec!["sr_add_0", "sr_add_1"]);
        assert!(render_item_suggestions(&[], "sr_add").text().contains("No matching items."));
        assert_eq!(class_emoji(None), "❓");
    }
}
