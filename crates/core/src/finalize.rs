//! Finalization selector: per-role candidate lists, the shared page cursor, bounded slot
//! selection and the roster snapshot built on confirm.

use serde::{Deserialize, Serialize};

use crate::domain::raid::{FinalizeCursor, Raid, Role, Roster, RosterEntry};
use crate::domain::signup::{class_priority, roster_order, ClassName, ParticipantId, Signup};
use crate::errors::DomainError;
use crate::flows::{LifecycleEngine, LifecycleEvent, RaidPhase, TransitionOutcome};

pub const PAGE_SIZE: usize = 20;

/// Placeholder ids older clients left in selections.
const SENTINEL_IDS: [&str; 2] = ["none", ""];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    Prev,
    Next,
}

impl PageDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prev => "prev",
            Self::Next => "next",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "prev" => Some(Self::Prev),
            "next" => Some(Self::Next),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotToggle {
    Selected,
    Deselected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeCandidate {
    pub user_id: ParticipantId,
    pub char_name: String,
    pub class_name: Option<ClassName>,
    pub selected: bool,
}

/// One rendered page of the finalize view for a role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizePage {
    pub role: Role,
    pub capacity: u32,
    pub selected_count: usize,
    pub candidate_count: usize,
    pub page: u32,
    pub page_count: u32,
    pub entries: Vec<FinalizeCandidate>,
    pub class_summary: Vec<(Option<ClassName>, usize)>,
}

impl FinalizePage {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.page_count
    }

    pub fn is_paginated(&self) -> bool {
        self.candidate_count > PAGE_SIZE
    }
}

/// Number of pages needed for `candidate_count` entries. Never zero.
pub fn page_count(candidate_count: usize) -> u32 {
    let pages = candidate_count.div_ceil(PAGE_SIZE).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn clamp_page(page: u32, candidate_count: usize) -> u32 {
    page.min(page_count(candidate_count) - 1)
}

impl Raid {
    fn ensure_locked(&self, message: &str) -> Result<(), DomainError> {
        if !self.locked {
            return Err(DomainError::invalid_state(message));
        }
        Ok(())
    }

    fn ensure_cursor_on(&self, role: Role) -> Result<(), DomainError> {
        if self.temp_finalize.role != Some(role) {
            return Err(DomainError::invalid_state(format!(
                "Open the {} finalize view first.",
                role.label()
            )));
        }
        Ok(())
    }

    /// Attending signups whose spec matches `role`, in roster order.
    pub fn finalize_candidates(&self, role: Role) -> Vec<&Signup> {
        let mut candidates: Vec<&Signup> =
            self.signups.values().filter(|signup| signup.is_candidate_for(role)).collect();
        candidates.sort_by(|left, right| roster_order(left, right));
        candidates
    }

    pub fn open_finalize(&mut self, role: Role) -> Result<FinalizeCursor, DomainError> {
        self.ensure_locked("Raid must be locked first.")?;
        self.temp_finalize = FinalizeCursor { role: Some(role), page: 0 };
        self.touch();
        Ok(self.temp_finalize)
    }

    pub fn toggle_slot(
        &mut self,
        role: Role,
        participant: &ParticipantId,
    ) -> Result<SlotToggle, DomainError> {
        self.ensure_locked("Raid must be locked first.")?;
        if self.temp_finalize.role.is_none() {
            return Err(DomainError::invalid_state("Open a finalize view first."));
        }

        if let Some(position) =
            self.final_selection.get(role).iter().position(|selected| selected == participant)
        {
            self.final_selection.get_mut(role).remove(position);
            self.touch();
            return Ok(SlotToggle::Deselected);
        }

        let is_candidate =
            self.signups.get(participant).is_some_and(|signup| signup.is_candidate_for(role));
        if !is_candidate {
            return Err(DomainError::not_found(format!(
                "That player is not an attending {} signup.",
                role.spec().as_str()
            )));
        }

        let capacity = self.slots.get(role);
        if self.final_selection.get(role).len() >= capacity as usize {
            return Err(DomainError::capacity_exceeded(format!(
                "Cannot select more than {capacity} {}. Deselect someone first.",
                role.label()
            )));
        }

        self.final_selection.get_mut(role).push(participant.clone());
        self.touch();
        Ok(SlotToggle::Selected)
    }

    /// Moves the shared cursor one page, clamped to the candidate range.
    pub fn page_finalize(&mut self, role: Role, direction: PageDirection) -> Result<u32, DomainError> {
        self.ensure_locked("Raid must be locked first.")?;
        self.ensure_cursor_on(role)?;

        let candidate_count = self.finalize_candidates(role).len();
        let current = clamp_page(self.temp_finalize.page, candidate_count);
        let next = match direction {
            PageDirection::Prev => current.saturating_sub(1),
            PageDirection::Next => clamp_page(current.saturating_add(1), candidate_count),
        };

        self.temp_finalize.page = next;
        self.touch();
        Ok(next)
    }

    pub fn finalize_back(&mut self) {
        self.temp_finalize = FinalizeCursor::default();
        self.touch();
    }

    pub fn finalize_page(&self, role: Role, page: u32) -> FinalizePage {
        let candidates = self.finalize_candidates(role);
        let selection = self.final_selection.get(role);
        let candidate_count = candidates.len();
        let page = clamp_page(page, candidate_count);

        let (selected, unselected): (Vec<&Signup>, Vec<&Signup>) =
            candidates.into_iter().partition(|signup| selection.contains(&signup.user_id));

        let entries = selected
            .iter()
            .map(|signup| (signup, true))
            .chain(unselected.iter().map(|signup| (signup, false)))
            .skip(page as usize * PAGE_SIZE)
            .take(PAGE_SIZE)
            .map(|(signup, selected)| FinalizeCandidate {
                user_id: signup.user_id.clone(),
                char_name: signup.char_name.clone(),
                class_name: signup.class_name,
                selected,
            })
            .collect();

        FinalizePage {
            role,
            capacity: self.slots.get(role),
            selected_count: selection.len(),
            candidate_count,
            page,
            page_count: page_count(candidate_count),
            entries,
            class_summary: self.selected_class_summary(role),
        }
    }

    fn selected_class_summary(&self, role: Role) -> Vec<(Option<ClassName>, usize)> {
        let mut summary: Vec<(Option<ClassName>, usize)> = Vec::new();
        for signup in self.final_selection.get(role).iter().filter_map(|id| self.signups.get(id)) {
            match summary.iter_mut().find(|(class, _)| *class == signup.class_name) {
                Some((_, count)) => *count += 1,
                None => summary.push((signup.class_name, 1)),
            }
        }
        summary.sort_by_key(|(class, _)| class_priority(*class));
        summary
    }

    /// Drops sentinel ids and snapshots the selection into `roster`.
    pub fn confirm_roster(&mut self) -> Result<TransitionOutcome, DomainError> {
        self.ensure_locked("Raid must be closed before finalizing.")?;
        let outcome = LifecycleEngine.apply(RaidPhase::of(self), LifecycleEvent::ConfirmRoster)?;

        let mut roster = Roster::default();
        for role in Role::ALL {
            let ids = self.final_selection.get_mut(role);
            ids.retain(|id| !SENTINEL_IDS.contains(&id.as_str()));

            let entries = self
                .final_selection
                .get(role)
                .iter()
                .filter_map(|id| self.signups.get(id))
                .filter(|signup| !signup.char_name.is_empty())
                .map(|signup| RosterEntry {
                    name: signup.char_name.clone(),
                    class_name: signup.class_name.map(|class| class.as_str().to_owned()),
                    spec: signup.spec.map(|spec| spec.as_str()).unwrap_or("Unknown").to_owned(),
                    reserves: signup.reserves.clone(),
                })
                .collect();
            *roster.get_mut(role) = entries;
        }

        self.roster = Some(roster);
        self.touch();
        Ok(outcome)
    }
}
