//! Signup registry: participant signups, field selections and soft reserves.
//!
//! Every mutation validates first and only then touches the raid, so a rejected call
//! leaves the aggregate exactly as it was.

use serde::{Deserialize, Serialize};

use crate::domain::raid::{Raid, RoleCounts};
use crate::domain::signup::{FieldUpdate, ParticipantId, Reserve, Signup};
use crate::errors::DomainError;
use crate::items::ItemCatalog;

pub const RAID_CLOSED: &str = "Raid is closed.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSummary {
    pub reserves: Vec<Reserve>,
    pub limit: u32,
}

impl Raid {
    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.locked {
            return Err(DomainError::invalid_state(RAID_CLOSED));
        }
        Ok(())
    }

    fn signed_up(&self, participant: &ParticipantId) -> Result<&Signup, DomainError> {
        self.signups.get(participant).ok_or_else(|| DomainError::not_found("You must sign up first."))
    }

    /// Replaces any existing signup for `participant` with a fresh one.
    /// Returns whether the stored signup changed.
    pub fn submit_signup(
        &mut self,
        participant: &ParticipantId,
        char_name: &str,
    ) -> Result<bool, DomainError> {
        self.ensure_open()?;
        let char_name = char_name.trim();
        if char_name.is_empty() {
            return Err(DomainError::invalid_state("Character name is required."));
        }

        let fresh = Signup::new(participant.clone(), char_name);
        let changed = self.signups.get(participant) != Some(&fresh);
        self.signups.insert(participant.clone(), fresh);
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    /// Applies a class, spec or status selection. A missing signup is a silent no-op.
    pub fn select_field(
        &mut self,
        participant: &ParticipantId,
        update: FieldUpdate,
    ) -> Result<bool, DomainError> {
        self.ensure_open()?;
        let Some(signup) = self.signups.get_mut(participant) else {
            return Ok(false);
        };
        signup.apply(update);
        self.touch();
        Ok(true)
    }

    /// Raw select-menu variant: unknown fields or values change nothing.
    pub fn select_field_raw(
        &mut self,
        participant: &ParticipantId,
        field: &str,
        value: &str,
    ) -> Result<bool, DomainError> {
        match FieldUpdate::parse(field, value) {
            Some(update) => self.select_field(participant, update),
            None => Ok(false),
        }
    }

    pub fn delete_signup(&mut self, participant: &ParticipantId) -> Result<Signup, DomainError> {
        self.ensure_open()?;
        let removed = self
            .signups
            .remove(participant)
            .ok_or_else(|| DomainError::not_found("You are not signed up."))?;
        self.touch();
        Ok(removed)
    }

    pub fn reserve_limit_for(&self, signup: &Signup) -> u32 {
        self.soft_reserve_limits.get(signup.reserve_role())
    }

    pub fn add_reserve(
        &mut self,
        participant: &ParticipantId,
        item_id: u32,
        catalog: &ItemCatalog,
    ) -> Result<Reserve, DomainError> {
        self.ensure_open()?;
        let signup = self.signed_up(participant)?;
        let item = catalog.find_by_id(item_id).ok_or_else(|| DomainError::not_found("Invalid item."))?;

        let limit = self.reserve_limit_for(signup);
        if signup.reserves.len() >= limit as usize {
            return Err(DomainError::capacity_exceeded(format!("Limit reached ({limit} items).")));
        }
        if signup.has_reserve(item.id) {
            return Err(DomainError::conflict("You already reserved this item."));
        }

        let reserve = Reserve { item_id: item.id, item_name: item.name.clone() };
        if let Some(signup) = self.signups.get_mut(participant) {
            signup.reserves.push(reserve.clone());
        }
        self.touch();
        Ok(reserve)
    }

    pub fn remove_reserve(
        &mut self,
        participant: &ParticipantId,
        item_id: u32,
    ) -> Result<Reserve, DomainError> {
        self.ensure_open()?;
        let signup = self.signed_up(participant)?;
        let position = signup
            .reserves
            .iter()
            .position(|reserve| reserve.item_id == item_id)
            .ok_or_else(|| DomainError::not_found("Item not in your reserves."))?;

        let removed = match self.signups.get_mut(participant) {
            Some(signup) => signup.reserves.remove(position),
            None => return Err(DomainError::not_found("You must sign up first.")),
        };
        self.touch();
        Ok(removed)
    }

    /// Empties the participant's reserve list. Returns how many reserves were dropped.
    pub fn clear_reserves(&mut self, participant: &ParticipantId) -> Result<usize, DomainError> {
        self.ensure_open()?;
        self.signed_up(participant)?;

        let cleared = match self.signups.get_mut(participant) {
            Some(signup) => std::mem::take(&mut signup.reserves).len(),
            None => 0,
        };
        self.touch();
        Ok(cleared)
    }

    pub fn list_reserves(&self, participant: &ParticipantId) -> Result<ReserveSummary, DomainError> {
        let signup = self.signed_up(participant)?;
        Ok(ReserveSummary { reserves: signup.reserves.clone(), limit: self.reserve_limit_for(signup) })
    }

    /// New limits apply to future additions only. Reserves already above a lowered limit stay.
    pub fn set_soft_reserve_limits(&mut self, limits: RoleCounts) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.soft_reserve_limits = limits;
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::raid::{ChannelId, Raid, RoleCounts};
    use crate::domain::signup::{AttendanceStatus, ClassName, FieldUpdate, ParticipantId, Spec};
    use crate::errors::{DomainError, ReasonCode};
    use crate::items::{Item, ItemCatalog};

    fn catalog() -> ItemCatalog {
        ItemCatalog::new(vec![
            Item { id: 1, name: "Onslaught Girdle".to_owned() },
            Item { id: 2, name: "Drape of Unyielding Strength".to_owned() },
            Item { id: 3, name: "Mish'undare, Circlet of the Mind Flayer".to_owned() },
            Item { id: 4, name: "Ring of Binding".to_owned() },
        ])
    }

    fn open_raid() -> Raid {
        let mut raid = Raid::create(ChannelId::new("C1"), "Onyxia", RoleCounts::new(1, 2, 7));
        raid.set_soft_reserve_limits(RoleCounts::new(1, 2, 3)).expect("limits");
        raid
    }

    fn user(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    #[test]
    fn submit_replaces_previous_signup_completely() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Thrall").expect("signup");
        raid.select_field(&user("U1"), FieldUpdate::SetSpec(Spec::Healer)).expect("spec");
        raid.add_reserve(&user("U1"), 1, &catalog()).expect("reserve");

        let changed = raid.submit_signup(&user("U1"), "Thrall").expect("resubmit");

        assert!(changed);
        let signup = raid.signup(&user("U1")).expect("signup exists");
        assert_eq!(signup.spec, None);
        assert_eq!(signup.status, AttendanceStatus::Attend);
        assert!(signup.reserves.is_empty());

        let unchanged = raid.submit_signup(&user("U1"), "Thrall").expect("same again");
        assert!(!unchanged);
    }

    #[test]
    fn mutations_are_rejected_once_locked() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Thrall").expect("signup");
        raid.locked = true;
        let before = raid.clone();

        assert!(matches!(raid.submit_signup(&user("U2"), "Jaina"), Err(DomainError::InvalidState(_))));
        assert!(raid.select_field(&user("U1"), FieldUpdate::SetClass(ClassName::Shaman)).is_err());
        assert!(raid.delete_signup(&user("U1")).is_err());
        assert!(raid.add_reserve(&user("U1"), 1, &catalog()).is_err());
        assert!(raid.clear_reserves(&user("U1")).is_err());
        assert!(raid.set_soft_reserve_limits(RoleCounts::new(9, 9, 9)).is_err());
        assert_eq!(raid, before);
    }

    #[test]
    fn select_field_without_signup_is_a_silent_no_op() {
        let mut raid = open_raid();
        let before = raid.clone();

        let applied = raid.select_field(&user("U9"), FieldUpdate::SetSpec(Spec::Tank)).expect("no-op");
        assert!(!applied);
        assert_eq!(raid, before);
    }

    #[test]
    fn unknown_raw_field_changes_nothing() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Thrall").expect("signup");
        let before = raid.clone();

        assert!(!raid.select_field_raw(&user("U1"), "guild", "Horde").expect("no-op"));
        assert!(!raid.select_field_raw(&user("U1"), "className", "Bard").expect("no-op"));
        assert_eq!(raid, before);

        assert!(raid.select_field_raw(&user("U1"), "className", "Shaman").expect("class"));
        assert_eq!(raid.signup(&user("U1")).and_then(|s| s.class_name), Some(ClassName::Shaman));
    }

    #[test]
    fn delete_requires_existing_signup() {
        let mut raid = open_raid();
        let error = raid.delete_signup(&user("U1")).expect_err("not signed up");
        assert_eq!(error.reason(), ReasonCode::NotFound);

        raid.submit_signup(&user("U1"), "Thrall").expect("signup");
        let removed = raid.delete_signup(&user("U1")).expect("delete");
        assert_eq!(removed.char_name, "Thrall");
        assert!(raid.signups.is_empty());
    }

    #[test]
    fn reserve_limit_allows_exactly_limit_adds_with_interleaved_removes() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Garrosh").expect("signup");
        raid.select_field(&user("U1"), FieldUpdate::SetSpec(Spec::Healer)).expect("spec");
        let items = catalog();

        raid.add_reserve(&user("U1"), 1, &items).expect("first");
        raid.add_reserve(&user("U1"), 2, &items).expect("second");
        let full = raid.add_reserve(&user("U1"), 3, &items).expect_err("limit");
        assert_eq!(full, DomainError::CapacityExceeded("Limit reached (2 items).".to_owned()));

        raid.remove_reserve(&user("U1"), 1).expect("remove frees a slot");
        raid.add_reserve(&user("U1"), 3, &items).expect("slot reused");
        assert!(raid.add_reserve(&user("U1"), 4, &items).is_err());

        let ids: Vec<u32> =
            raid.list_reserves(&user("U1")).expect("list").reserves.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn unset_spec_gets_the_dps_reserve_limit() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Sylvanas").expect("signup");
        let items = catalog();

        for id in 1..=3 {
            raid.add_reserve(&user("U1"), id, &items).expect("dps limit is 3");
        }
        assert!(raid.add_reserve(&user("U1"), 4, &items).is_err());
        assert_eq!(raid.list_reserves(&user("U1")).expect("list").limit, 3);
    }

    #[test]
    fn reserve_rejections_follow_lookup_then_limit_then_duplicate() {
        let mut raid = open_raid();
        let items = catalog();

        let no_signup = raid.add_reserve(&user("U1"), 1, &items).expect_err("no signup");
        assert_eq!(no_signup.to_string(), "You must sign up first.");

        raid.submit_signup(&user("U1"), "Varian").expect("signup");
        let invalid = raid.add_reserve(&user("U1"), 999, &items).expect_err("unknown item");
        assert_eq!(invalid, DomainError::NotFound("Invalid item.".to_owned()));

        raid.add_reserve(&user("U1"), 1, &items).expect("first");
        let duplicate = raid.add_reserve(&user("U1"), 1, &items).expect_err("duplicate");
        assert_eq!(duplicate.reason(), ReasonCode::Conflict);

        let missing = raid.remove_reserve(&user("U1"), 4).expect_err("not reserved");
        assert_eq!(missing.to_string(), "Item not in your reserves.");
    }

    #[test]
    fn lowering_limits_keeps_existing_reserves() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Rexxar").expect("signup");
        let items = catalog();
        raid.add_reserve(&user("U1"), 1, &items).expect("first");
        raid.add_reserve(&user("U1"), 2, &items).expect("second");

        raid.set_soft_reserve_limits(RoleCounts::new(0, 0, 1)).expect("lower limits");

        let summary = raid.list_reserves(&user("U1")).expect("list");
        assert_eq!(summary.reserves.len(), 2);
        assert_eq!(summary.limit, 1);
        assert!(raid.add_reserve(&user("U1"), 3, &items).is_err());
    }

    #[test]
    fn clear_empties_reserves_unconditionally() {
        let mut raid = open_raid();
        raid.submit_signup(&user("U1"), "Tyrande").expect("signup");
        raid.add_reserve(&user("U1"), 4, &catalog()).expect("reserve");

        assert_eq!(raid.clear_reserves(&user("U1")).expect("clear"), 1);
        assert_eq!(raid.clear_reserves(&user("U1")).expect("clear again"), 0);
        assert!(raid.list_reserves(&user("U1")).expect("list").reserves.is_empty());
    }
}
