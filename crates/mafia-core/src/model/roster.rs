use super::player::Player;
use super::role::Role;
use crate::belief::BeliefStore;
use crate::game::tally::{NO_VOTE, normalize_target};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

pub const MIN_PLAYERS: usize = 4;
pub const MAX_PLAYERS: usize = 8;

/// How many of each role a table of a given size receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub mafia: usize,
    pub doctor: usize,
    pub detective: usize,
    pub townsperson: usize,
}

impl RoleCounts {
    pub fn for_players(count: usize) -> Result<Self, RosterError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(RosterError::InvalidRosterSize { count });
        }
        let mafia = if count < 6 { 1 } else { 2 };
        Ok(Self {
            mafia,
            doctor: 1,
            detective: 1,
            townsperson: count - mafia - 2,
        })
    }

    pub fn total(&self) -> usize {
        self.mafia + self.doctor + self.detective + self.townsperson
    }

    /// The role multiset in a fixed order: Mafia first, Townsperson last.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::with_capacity(self.total());
        roles.extend(std::iter::repeat_n(Role::Mafia, self.mafia));
        roles.extend(std::iter::repeat_n(Role::Doctor, self.doctor));
        roles.extend(std::iter::repeat_n(Role::Detective, self.detective));
        roles.extend(std::iter::repeat_n(Role::Townsperson, self.townsperson));
        roles
    }

    fn tally(roles: impl Iterator<Item = Role>) -> Self {
        let mut counts = Self {
            mafia: 0,
            doctor: 0,
            detective: 0,
            townsperson: 0,
        };
        for role in roles {
            match role {
                Role::Mafia => counts.mafia += 1,
                Role::Doctor => counts.doctor += 1,
                Role::Detective => counts.detective += 1,
                Role::Townsperson => counts.townsperson += 1,
            }
        }
        counts
    }
}

/// Deals the role multiset for `names.len()` players in random order.
pub fn assign_roles<R>(names: &[String], rng: &mut R) -> Result<Vec<(String, Role)>, RosterError>
where
    R: Rng + ?Sized,
{
    let mut roles = RoleCounts::for_players(names.len())?.roles();
    roles.shuffle(rng);
    Ok(names.iter().cloned().zip(roles).collect())
}

/// Every player of one game, in setup order.
#[derive(Debug, Clone)]
pub struct Roster {
    players: Vec<Player>,
    index: BTreeMap<String, usize>,
}

impl Roster {
    /// Builds a roster from an explicit assignment, validating size, names and
    /// role counts, and seeds each player's initial beliefs.
    pub fn new(assignment: Vec<(String, Role)>) -> Result<Self, RosterError> {
        let expected = RoleCounts::for_players(assignment.len())?;

        let mut seen = HashSet::new();
        for (name, _) in &assignment {
            if name.trim().is_empty() {
                return Err(RosterError::EmptyName);
            }
            // Ballots and night targets are normalized before lookup.
            if normalize_target(name) != name || name.eq_ignore_ascii_case(NO_VOTE) {
                return Err(RosterError::UnnormalizedName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(RosterError::DuplicateName(name.clone()));
            }
        }

        let found = RoleCounts::tally(assignment.iter().map(|(_, role)| *role));
        if found != expected {
            return Err(RosterError::RoleCountMismatch { expected, found });
        }

        let players: Vec<Player> = assignment
            .iter()
            .map(|(name, role)| {
                let beliefs = BeliefStore::initial(name, *role, &assignment);
                Player::new(name.clone(), *role, beliefs)
            })
            .collect();
        let index = players
            .iter()
            .enumerate()
            .map(|(idx, player)| (player.name().to_string(), idx))
            .collect();

        Ok(Self { players, index })
    }

    pub fn from_names<R>(names: &[String], rng: &mut R) -> Result<Self, RosterError>
    where
        R: Rng + ?Sized,
    {
        Self::new(assign_roles(names, rng)?)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Player> {
        self.index.get(name).map(|idx| &self.players[*idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.index.get(name).map(|idx| &mut self.players[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn role_of(&self, name: &str) -> Option<Role> {
        self.get(name).map(Player::role)
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.get(name).is_some_and(Player::is_alive)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(Player::name)
    }

    /// Living player names in setup order.
    pub fn alive_names(&self) -> Vec<String> {
        self.alive_players()
            .map(|player| player.name().to_string())
            .collect()
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|player| player.is_alive())
    }

    /// `(alive mafia, alive non-mafia)`.
    pub fn alive_counts(&self) -> (usize, usize) {
        self.alive_players()
            .fold((0, 0), |(mafia, town), player| {
                if player.role().is_mafia() {
                    (mafia + 1, town)
                } else {
                    (mafia, town + 1)
                }
            })
    }

    pub fn assignment(&self) -> Vec<(String, Role)> {
        self.players
            .iter()
            .map(|player| (player.name().to_string(), player.role()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("a game needs between 4 and 8 players but {count} were given")]
    InvalidRosterSize { count: usize },
    #[error("player name '{0}' appears more than once")]
    DuplicateName(String),
    #[error("player names must not be empty")]
    EmptyName,
    #[error("player name '{0}' cannot be targeted: no surrounding blanks, trailing ',' or ';', or 'no_vote'")]
    UnnormalizedName(String),
    #[error("role assignment {found:?} does not match the required {expected:?}")]
    RoleCountMismatch {
        expected: RoleCounts,
        found: RoleCounts,
    },
}
