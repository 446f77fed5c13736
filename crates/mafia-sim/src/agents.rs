use std::collections::BTreeMap;
use std::path::PathBuf;

use mafia_bot::{
    DecisionProvider, HeuristicOptions, HeuristicProvider, HumanProvider, Phase, ScriptedProvider,
};
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind};
use crate::controller::external::ExternalProvider;

const DEFAULT_AGENT: &str = "heuristic";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid heuristic parameter for agent '{name}': {message}")]
    InvalidHeuristicParam { name: String, message: String },
    #[error("invalid scripted parameter for agent '{name}': {message}")]
    InvalidScriptedParam { name: String, message: String },
    #[error("invalid external parameter for agent '{name}': {message}")]
    InvalidExternalParam { name: String, message: String },
}

/// A validated agent definition that can spawn one provider per player.
pub struct AgentBlueprint {
    name: String,
    implementation: AgentImplementation,
}

enum AgentImplementation {
    Heuristic(HeuristicParams),
    Scripted(ScriptedParams),
    External(ExternalOptions),
    Human,
}

impl AgentBlueprint {
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let implementation = match config.kind {
            AgentKind::Heuristic => {
                AgentImplementation::Heuristic(HeuristicParams::from_params(&config.name, &config.params)?)
            }
            AgentKind::Scripted => {
                AgentImplementation::Scripted(ScriptedParams::from_params(&config.name, &config.params)?)
            }
            AgentKind::External => {
                AgentImplementation::External(ExternalOptions::from_params(&config.name, &config.params)?)
            }
            AgentKind::Human => AgentImplementation::Human,
        };

        Ok(Self {
            name: config.name.clone(),
            implementation,
        })
    }

    pub fn heuristic_default() -> Self {
        Self {
            name: DEFAULT_AGENT.to_string(),
            implementation: AgentImplementation::Heuristic(HeuristicParams::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the provider for `player`. `seed` is the per-player seed derived
    /// from the game seed; a heuristic agent's own `seed` param is mixed in.
    pub fn spawn_provider(&self, player: &str, seed: u64) -> Box<dyn DecisionProvider> {
        match &self.implementation {
            AgentImplementation::Heuristic(params) => Box::new(params.spawn(seed)),
            AgentImplementation::Scripted(params) => Box::new(params.spawn(player)),
            AgentImplementation::External(options) => Box::new(ExternalProvider::new(
                self.name.clone(),
                options.clone(),
                seed,
            )),
            AgentImplementation::Human => Box::new(HumanProvider::stdio()),
        }
    }
}

/// Which blueprint drives which player.
pub struct AgentRoster {
    blueprints: Vec<AgentBlueprint>,
    assigned: BTreeMap<String, usize>,
    default: usize,
}

impl AgentRoster {
    pub fn from_configs(configs: &[AgentConfig]) -> Result<Self, AgentError> {
        let mut blueprints = Vec::with_capacity(configs.len() + 1);
        let mut assigned = BTreeMap::new();
        let mut default = None;

        for config in configs {
            let index = blueprints.len();
            blueprints.push(AgentBlueprint::from_config(config)?);
            if config.players.is_empty() {
                default.get_or_insert(index);
            }
            for player in &config.players {
                assigned.insert(player.clone(), index);
            }
        }

        let default = match default {
            Some(index) => index,
            None => {
                blueprints.push(AgentBlueprint::heuristic_default());
                blueprints.len() - 1
            }
        };

        Ok(Self {
            blueprints,
            assigned,
            default,
        })
    }

    pub fn blueprint_for(&self, player: &str) -> &AgentBlueprint {
        let index = self.assigned.get(player).copied().unwrap_or(self.default);
        &self.blueprints[index]
    }

    /// One provider per player, seeded from `game_seed` and the player's index.
    pub fn spawn_all<'a, I>(&self, players: I, game_seed: u64) -> BTreeMap<String, Box<dyn DecisionProvider>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        players
            .into_iter()
            .enumerate()
            .map(|(index, player)| {
                let seed = player_seed(game_seed, index);
                let provider = self.blueprint_for(player).spawn_provider(player, seed);
                (player.to_string(), provider)
            })
            .collect()
    }
}

fn player_seed(game_seed: u64, index: usize) -> u64 {
    game_seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[derive(Debug, Clone, Default)]
struct HeuristicParams {
    seed: Option<u64>,
    chattiness: Option<f64>,
}

impl HeuristicParams {
    fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, AgentError> {
        if params.is_null() {
            return Ok(Self::default());
        }

        let invalid = |message: &str| AgentError::InvalidHeuristicParam {
            name: name.to_string(),
            message: message.to_string(),
        };
        let mapping = params
            .as_mapping()
            .ok_or_else(|| invalid("expected mapping for heuristic params"))?;

        let mut parsed = Self::default();
        for (key, value) in mapping {
            match key.as_str() {
                Some("seed") => {
                    parsed.seed = Some(value.as_u64().ok_or_else(|| invalid("seed must be an unsigned integer"))?);
                }
                Some("chattiness") => {
                    let chattiness = value
                        .as_f64()
                        .filter(|value| (0.0..=1.0).contains(value))
                        .ok_or_else(|| invalid("chattiness must be a number between 0 and 1"))?;
                    parsed.chattiness = Some(chattiness);
                }
                _ => {}
            }
        }
        Ok(parsed)
    }

    fn spawn(&self, seed: u64) -> HeuristicProvider {
        let defaults = HeuristicOptions::default();
        HeuristicProvider::new(HeuristicOptions {
            seed: self.seed.map_or(seed, |pinned| pinned ^ seed),
            chattiness: self.chattiness.unwrap_or(defaults.chattiness),
        })
    }
}

/// Canned replies keyed by player name, with an optional `default` script.
#[derive(Debug, Clone, Default)]
struct ScriptedParams {
    scripts: BTreeMap<String, Vec<(Phase, String)>>,
}

impl ScriptedParams {
    fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, AgentError> {
        let invalid = |message: String| AgentError::InvalidScriptedParam {
            name: name.to_string(),
            message,
        };
        let mut scripts = BTreeMap::new();
        if params.is_null() {
            return Ok(Self { scripts });
        }
        let mapping = params
            .as_mapping()
            .ok_or_else(|| invalid("expected mapping of player name to script".to_string()))?;

        for (player, script) in mapping {
            let player = player
                .as_str()
                .ok_or_else(|| invalid("script keys must be player names".to_string()))?;
            let phases = script
                .as_mapping()
                .ok_or_else(|| invalid(format!("script for '{player}' must be a mapping")))?;
            let mut replies = Vec::new();
            for (phase, entries) in phases {
                let phase = match phase.as_str() {
                    Some("day_message") => Phase::DayMessage,
                    Some("day_vote") => Phase::DayVote,
                    Some("night") => Phase::Night,
                    other => {
                        return Err(invalid(format!("unknown phase {other:?} in script for '{player}'")));
                    }
                };
                let entries = entries
                    .as_sequence()
                    .ok_or_else(|| invalid(format!("{phase} replies for '{player}' must be a list")))?;
                for entry in entries {
                    replies.push((phase, raw_reply(entry).map_err(|err| invalid(err.to_string()))?));
                }
            }
            scripts.insert(player.to_string(), replies);
        }
        Ok(Self { scripts })
    }

    fn spawn(&self, player: &str) -> ScriptedProvider {
        let script = self
            .scripts
            .get(player)
            .or_else(|| self.scripts.get("default"))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut provider = ScriptedProvider::new();
        for (phase, raw) in script {
            provider.push(*phase, raw.clone());
        }
        provider
    }
}

/// Strings are replayed verbatim; structured YAML is re-encoded as JSON.
fn raw_reply(entry: &serde_yaml::Value) -> Result<String, serde_json::Error> {
    match entry.as_str() {
        Some(text) => Ok(text.to_string()),
        None => serde_json::to_string(entry),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalFallback {
    Heuristic,
    SafeDefault,
}

#[derive(Debug, Clone)]
pub struct ExternalOptions {
    pub command: Option<String>,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub fallback: ExternalFallback,
}

impl ExternalOptions {
    pub fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, AgentError> {
        let mut options = Self {
            command: None,
            args: Vec::new(),
            working_dir: None,
            timeout_ms: None,
            fallback: ExternalFallback::Heuristic,
        };

        if params.is_null() {
            return Ok(options);
        }

        let invalid = |message: String| AgentError::InvalidExternalParam {
            name: name.to_string(),
            message,
        };
        let mapping = params
            .as_mapping()
            .ok_or_else(|| invalid("expected mapping for external params".to_string()))?;

        for (key, value) in mapping {
            match key.as_str() {
                Some("command") => {
                    let command = value
                        .as_str()
                        .ok_or_else(|| invalid("command must be a string".to_string()))?;
                    options.command = Some(command.to_string());
                }
                Some("args") => {
                    let seq = value
                        .as_sequence()
                        .ok_or_else(|| invalid("args must be an array of strings".to_string()))?;
                    options.args = seq
                        .iter()
                        .map(|v| {
                            v.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| invalid(format!("args entry {v:?} is not a string")))
                        })
                        .collect::<Result<_, _>>()?;
                }
                Some("working_dir") => {
                    options.working_dir = value.as_str().map(PathBuf::from);
                }
                Some("timeout_ms") => {
                    options.timeout_ms = value.as_u64();
                }
                Some("fallback") => {
                    let fallback = value
                        .as_str()
                        .ok_or_else(|| invalid("fallback must be a string".to_string()))?;
                    options.fallback = match fallback.to_ascii_lowercase().as_str() {
                        "heuristic" => ExternalFallback::Heuristic,
                        "none" | "default" | "safe_default" => ExternalFallback::SafeDefault,
                        other => return Err(invalid(format!("unknown fallback '{other}'"))),
                    };
                }
                _ => {}
            }
        }

        Ok(options)
    }
}
