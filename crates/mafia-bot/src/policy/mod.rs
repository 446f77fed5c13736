mod heuristic;
mod human;
mod scripted;

pub use heuristic::{HeuristicOptions, HeuristicProvider};
pub use human::HumanProvider;
pub use scripted::ScriptedProvider;

use crate::action::{Action, DecisionError, Phase};
use mafia_core::belief::BeliefStore;
use mafia_core::model::role::{Role, Team};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder shown to other players for someone who stayed silent.
pub const SILENT_MARKER: &str = "[No message]";

/// One speaker's contribution to the day's discussion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    pub speaker: String,
    pub message: Option<String>,
}

impl ChatLine {
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or(SILENT_MARKER)
    }
}

/// Everything a provider may look at when deciding.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub phase: Phase,
    pub player: &'a str,
    pub role: Role,
    /// Living players in this sub-phase's shuffled order.
    pub alive: &'a [String],
    pub beliefs: &'a BeliefStore,
    pub messages: &'a [ChatLine],
    pub day: u32,
    pub night: u32,
}

impl DecisionContext<'_> {
    pub fn others_alive(&self) -> impl Iterator<Item = &str> {
        self.alive
            .iter()
            .map(String::as_str)
            .filter(move |name| *name != self.player)
    }

    pub fn request(&self) -> DecisionRequest {
        DecisionRequest::from_context(self)
    }
}

/// Serializable form of a [`DecisionContext`], sent to out-of-process providers.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRequest {
    pub phase: Phase,
    pub player_name: String,
    pub role: Role,
    pub alive_players: Vec<String>,
    pub kg: Value,
    pub previous_messages: BTreeMap<String, String>,
    pub day: u32,
    pub night: u32,
}

impl DecisionRequest {
    pub fn from_context(ctx: &DecisionContext<'_>) -> Self {
        let kg = serde_json::to_value(ctx.beliefs).unwrap_or(Value::Null);
        let previous_messages = ctx
            .messages
            .iter()
            .map(|line| (line.speaker.clone(), line.text().to_string()))
            .collect();
        Self {
            phase: ctx.phase,
            player_name: ctx.player.to_string(),
            role: ctx.role,
            alive_players: ctx.alive.to_vec(),
            kg,
            previous_messages,
            day: ctx.day,
            night: ctx.night,
        }
    }
}

/// Source of decisions for one player: a bot, a script, a person or a
/// subprocess.
pub trait DecisionProvider: Send {
    fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError>;

    /// Called once when the game ends.
    fn observe_game_over(&mut self, _winner: Option<Team>) {}
}

impl<P: DecisionProvider + ?Sized> DecisionProvider for Box<P> {
    fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
        (**self).decide(ctx)
    }

    fn observe_game_over(&mut self, winner: Option<Team>) {
        (**self).observe_game_over(winner)
    }
}
