use super::tally::normalize_target;
use crate::model::role::{Alignment, Role};
use crate::model::roster::Roster;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MafiaVote {
    pub voter: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectiveCheck {
    pub detective: String,
    pub target: String,
}

/// Everything submitted during one night, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightActionSet {
    pub mafia_votes: Vec<MafiaVote>,
    pub doctor_save: Option<String>,
    pub detective_check: Option<DetectiveCheck>,
}

impl NightActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mafia_vote(mut self, voter: impl Into<String>, target: impl Into<String>) -> Self {
        self.mafia_votes.push(MafiaVote {
            voter: voter.into(),
            target: target.into(),
        });
        self
    }

    pub fn with_doctor_save(mut self, target: impl Into<String>) -> Self {
        self.doctor_save = Some(target.into());
        self
    }

    pub fn with_detective_check(
        mut self,
        detective: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.detective_check = Some(DetectiveCheck {
            detective: detective.into(),
            target: target.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mafia_votes.is_empty() && self.doctor_save.is_none() && self.detective_check.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectiveResult {
    pub detective: String,
    pub target: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectedKind {
    MafiaVote,
    DoctorSave,
    DetectiveCheck,
}

/// A night action dropped because its actor or target was not eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedAction {
    pub kind: RejectedKind,
    pub actor: Option<String>,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NightOutcome {
    /// The player the Mafia attacked, whether or not the attack landed.
    pub attack_target: Option<String>,
    pub killed: Option<String>,
    pub save_applied: bool,
    pub detective_result: Option<DetectiveResult>,
    pub mafia_counts: BTreeMap<String, usize>,
    pub rejected: Vec<RejectedAction>,
}

/// Resolves one night against the roster as it stood when the night began.
///
/// Mafia votes pick the attack target by plurality; ties go to the
/// lexicographically smallest name. A matching doctor save cancels the kill.
pub fn resolve_night(actions: &NightActionSet, roster: &Roster) -> NightOutcome {
    let mut outcome = NightOutcome::default();

    for vote in &actions.mafia_votes {
        let target = normalize_target(&vote.target);
        let voter_ok = roster.is_alive(&vote.voter) && roster.role_of(&vote.voter) == Some(Role::Mafia);
        if !voter_ok || !roster.is_alive(target) {
            outcome.rejected.push(RejectedAction {
                kind: RejectedKind::MafiaVote,
                actor: Some(vote.voter.clone()),
                target: vote.target.clone(),
            });
            continue;
        }
        *outcome.mafia_counts.entry(target.to_string()).or_default() += 1;
    }

    // BTreeMap iterates in name order, so the first name at the maximum wins.
    let top = outcome.mafia_counts.values().copied().max().unwrap_or(0);
    outcome.attack_target = outcome
        .mafia_counts
        .iter()
        .find(|(_, count)| **count == top && top > 0)
        .map(|(name, _)| name.clone());

    let save = actions.doctor_save.as_deref().and_then(|raw| {
        let target = normalize_target(raw);
        if roster.is_alive(target) {
            Some(target)
        } else {
            outcome.rejected.push(RejectedAction {
                kind: RejectedKind::DoctorSave,
                actor: None,
                target: raw.to_string(),
            });
            None
        }
    });

    if let Some(target) = outcome.attack_target.as_deref() {
        if save == Some(target) {
            outcome.save_applied = true;
        } else {
            outcome.killed = Some(target.to_string());
        }
    }

    if let Some(check) = &actions.detective_check {
        let target = normalize_target(&check.target);
        let detective_ok = roster.is_alive(&check.detective)
            && roster.role_of(&check.detective) == Some(Role::Detective);
        match roster.get(target).filter(|player| player.is_alive()) {
            Some(player) if detective_ok => {
                outcome.detective_result = Some(DetectiveResult {
                    detective: check.detective.clone(),
                    target: target.to_string(),
                    alignment: Alignment::of(player.role()),
                });
            }
            _ => outcome.rejected.push(RejectedAction {
                kind: RejectedKind::DetectiveCheck,
                actor: Some(check.detective.clone()),
                target: check.target.clone(),
            }),
        }
    }

    outcome
}
