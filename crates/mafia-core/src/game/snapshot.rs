use super::state::{GameState, PhaseState};
use crate::belief::BeliefSummary;
use crate::model::role::{Role, Team};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub role: Role,
    pub alive: bool,
    pub beliefs: BeliefSummary,
}

/// Point-in-time view of a game, for debugging and result files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub phase: String,
    pub day: u32,
    pub night: u32,
    pub winner: Option<Team>,
    pub players: Vec<PlayerSnapshot>,
}

impl GameSnapshot {
    pub fn capture(state: &GameState) -> Self {
        let players = state
            .roster()
            .players()
            .iter()
            .map(|player| PlayerSnapshot {
                name: player.name().to_string(),
                role: player.role(),
                alive: player.is_alive(),
                beliefs: BeliefSummary::from_store(player.beliefs()),
            })
            .collect();
        let winner = match state.phase() {
            PhaseState::GameOver(team) => Some(team),
            _ => None,
        };
        Self {
            phase: state.phase().to_string(),
            day: state.day(),
            night: state.night(),
            winner,
            players,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
