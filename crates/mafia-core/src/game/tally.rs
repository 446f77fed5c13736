use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel target meaning "I abstain".
pub const NO_VOTE: &str = "no_vote";

const SEPARATORS: [char; 2] = [',', ';'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Target(String),
    Abstain,
}

impl Vote {
    /// Interprets a raw target string; `no_vote` and blank strings abstain.
    pub fn from_raw(raw: &str) -> Self {
        let target = normalize_target(raw);
        if target.is_empty() || target.eq_ignore_ascii_case(NO_VOTE) {
            Vote::Abstain
        } else {
            Vote::Target(target.to_string())
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Vote::Target(name) => Some(name),
            Vote::Abstain => None,
        }
    }
}

/// Voter name to vote, for one day.
pub type Ballot = BTreeMap<String, Vote>;

/// Trims whitespace and a single trailing separator from a target name.
pub fn normalize_target(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix(SEPARATORS)
        .map(str::trim_end)
        .unwrap_or(trimmed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TallyOutcome {
    Eliminated,
    Tie,
    NoVotes,
}

/// A ballot entry that named something other than a valid target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedVote {
    pub voter: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub eliminated: Option<String>,
    pub counts: BTreeMap<String, usize>,
    pub outcome: TallyOutcome,
    /// Every target holding the top count, in name order.
    pub leaders: Vec<String>,
    pub top_count: usize,
    pub rejected: Vec<RejectedVote>,
}

/// Plurality count over `ballot`. Targets outside `valid_targets` count as
/// abstentions and are reported in `rejected`.
pub fn tally<S>(ballot: &Ballot, valid_targets: &[S]) -> VoteTally
where
    S: AsRef<str>,
{
    let valid: BTreeSet<&str> = valid_targets.iter().map(AsRef::as_ref).collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut rejected = Vec::new();

    for (voter, vote) in ballot {
        let Vote::Target(raw) = vote else {
            continue;
        };
        let target = normalize_target(raw);
        if target.is_empty() || target.eq_ignore_ascii_case(NO_VOTE) {
            continue;
        }
        if !valid.contains(target) {
            rejected.push(RejectedVote {
                voter: voter.clone(),
                target: raw.clone(),
            });
            continue;
        }
        *counts.entry(target.to_string()).or_default() += 1;
    }

    let top_count = counts.values().copied().max().unwrap_or(0);
    let leaders: Vec<String> = counts
        .iter()
        .filter(|(_, count)| **count == top_count && top_count > 0)
        .map(|(name, _)| name.clone())
        .collect();

    let (outcome, eliminated) = match leaders.as_slice() {
        [] => (TallyOutcome::NoVotes, None),
        [single] => (TallyOutcome::Eliminated, Some(single.clone())),
        _ => (TallyOutcome::Tie, None),
    };

    VoteTally {
        eliminated,
        counts,
        outcome,
        leaders,
        top_count,
        rejected,
    }
}
