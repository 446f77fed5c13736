use super::night::{DetectiveResult, NightOutcome};
use super::tally::VoteTally;
use super::win::{self, WinCheck};
use crate::model::role::{Role, Team};
use crate::model::roster::Roster;
use core::fmt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhaseState {
    DayMessage,
    DayVote,
    NightActions,
    GameOver(Team),
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::DayMessage => f.write_str("day_message"),
            PhaseState::DayVote => f.write_str("day_vote"),
            PhaseState::NightActions => f.write_str("night"),
            PhaseState::GameOver(team) => write!(f, "game_over({team})"),
        }
    }
}

/// Salts mixed into the per-round shuffle so each sub-phase gets its own order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSalt {
    Messages = 1,
    Votes = 2,
    Night = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("expected phase {expected} but the game is in {actual}")]
    UnexpectedPhase {
        expected: PhaseState,
        actual: PhaseState,
    },
    #[error("day {day} has already started")]
    DayAlreadyOpen { day: u32 },
    #[error("night {night} has already started")]
    NightAlreadyOpen { night: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayResolution {
    pub eliminated: Option<String>,
    pub win: WinCheck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightResolution {
    pub killed: Option<String>,
    pub win: WinCheck,
}

/// The roster plus the day/night state machine.
///
/// All belief propagation happens here, on the single thread that owns the
/// state, after a sub-phase's decisions have been gathered.
#[derive(Debug, Clone)]
pub struct GameState {
    roster: Roster,
    phase: PhaseState,
    day: u32,
    night: u32,
    opened: bool,
    seed: u64,
}

impl GameState {
    pub fn new(roster: Roster, seed: u64) -> Self {
        Self {
            roster,
            phase: PhaseState::DayMessage,
            day: 0,
            night: 0,
            opened: false,
            seed,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn phase(&self) -> PhaseState {
        self.phase
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn night(&self) -> u32 {
        self.night
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn winner(&self) -> Option<Team> {
        match self.phase {
            PhaseState::GameOver(team) => Some(team),
            _ => None,
        }
    }

    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    /// Starts the next day. Must be called once per DayMessage phase.
    pub fn begin_day(&mut self) -> Result<u32, PhaseError> {
        self.expect(PhaseState::DayMessage)?;
        if self.opened {
            return Err(PhaseError::DayAlreadyOpen { day: self.day });
        }
        self.day += 1;
        self.opened = true;
        Ok(self.day)
    }

    pub fn open_vote(&mut self) -> Result<(), PhaseError> {
        self.expect(PhaseState::DayMessage)?;
        self.opened = false;
        self.phase = PhaseState::DayVote;
        Ok(())
    }

    /// Applies the day's tally, then checks for a winner.
    pub fn resolve_day_vote(&mut self, tally: &VoteTally) -> Result<DayResolution, PhaseError> {
        self.expect(PhaseState::DayVote)?;
        let eliminated = tally
            .eliminated
            .as_deref()
            .filter(|name| self.eliminate(name))
            .map(str::to_string);
        let win = self.settle(PhaseState::NightActions);
        Ok(DayResolution { eliminated, win })
    }

    pub fn begin_night(&mut self) -> Result<u32, PhaseError> {
        self.expect(PhaseState::NightActions)?;
        if self.opened {
            return Err(PhaseError::NightAlreadyOpen { night: self.night });
        }
        self.night += 1;
        self.opened = true;
        Ok(self.night)
    }

    /// Applies a resolved night: the kill, the attack-target suspicion reset
    /// and the detective's private finding, then checks for a winner.
    pub fn resolve_night(&mut self, outcome: &NightOutcome) -> Result<NightResolution, PhaseError> {
        self.expect(PhaseState::NightActions)?;

        if let Some(target) = outcome.attack_target.as_deref() {
            for player in self.roster.players_mut() {
                player.beliefs_mut().clear_suspicion(target, Role::Mafia);
            }
        }

        let killed = outcome
            .killed
            .as_deref()
            .filter(|name| self.eliminate(name))
            .map(str::to_string);

        if let Some(result) = &outcome.detective_result {
            self.apply_detective_result(result);
        }

        self.opened = false;
        let win = self.settle(PhaseState::DayMessage);
        Ok(NightResolution { killed, win })
    }

    /// Kills `name` and broadcasts the death into every player's store,
    /// including the victim's own. Returns `false` if nobody changed state.
    pub fn eliminate(&mut self, name: &str) -> bool {
        let Some(player) = self.roster.get_mut(name) else {
            return false;
        };
        let transitioned = player.eliminate();
        self.broadcast_death(name);
        transitioned
    }

    /// Sets `believed_alive = false` for `name` in every store. Idempotent.
    pub fn broadcast_death(&mut self, name: &str) {
        for player in self.roster.players_mut() {
            player.beliefs_mut().mark_dead(name);
        }
    }

    /// Living players in a shuffled order that depends only on the seed, the
    /// current day/night counter and the sub-phase.
    pub fn speaking_order(&self, salt: OrderSalt) -> Vec<String> {
        let mut order = self.roster.alive_names();
        let round = match salt {
            OrderSalt::Night => self.night,
            OrderSalt::Messages | OrderSalt::Votes => self.day,
        };
        let mixed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(u64::from(round) << 8)
            .wrapping_add(salt as u64);
        let mut rng = StdRng::seed_from_u64(mixed);
        order.shuffle(&mut rng);
        order
    }

    fn apply_detective_result(&mut self, result: &DetectiveResult) {
        if let Some(detective) = self.roster.get_mut(&result.detective) {
            detective
                .beliefs_mut()
                .confirm_alignment(&result.target, result.alignment);
        }
    }

    fn settle(&mut self, next: PhaseState) -> WinCheck {
        let check = win::evaluate(&self.roster);
        self.phase = match check {
            WinCheck::GameOver(team) => PhaseState::GameOver(team),
            WinCheck::Continue => next,
        };
        check
    }

    fn expect(&self, expected: PhaseState) -> Result<(), PhaseError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(PhaseError::UnexpectedPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}
