use mafia_core::game::tally::{NO_VOTE, normalize_target};
use mafia_core::model::roster::{MAX_PLAYERS, MIN_PLAYERS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_ROUND_LIMIT: u32 = 30;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";
pub const DEFAULT_PLAYERS: [&str; 4] = ["Alice", "Bob", "Charlie", "Dana"];

/// Root simulation configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub run_id: String,
    #[serde(default = "default_players")]
    pub players: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_games")]
    pub games: usize,
    #[serde(default)]
    pub dispatch: DispatchMode,
    #[serde(default = "default_round_limit")]
    pub round_limit: u32,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Reads, parses and validates a YAML config.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: SimulationConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// A single-game config for `players`, all driven by heuristic bots.
    pub fn for_players<I, S>(players: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_id: "local".to_string(),
            players: players.into_iter().map(Into::into).collect(),
            seed: None,
            games: default_games(),
            dispatch: DispatchMode::default(),
            round_limit: DEFAULT_ROUND_LIMIT,
            agents: Vec::new(),
            outputs: OutputsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Checks every field and normalizes names in place. Touches no files.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        validate_players(&mut self.players)?;
        if self.games == 0 {
            return Err(ValidationError::InvalidField {
                field: "games".to_string(),
                message: "number of games must be greater than zero".to_string(),
            });
        }
        if self.round_limit == 0 {
            return Err(ValidationError::InvalidField {
                field: "round_limit".to_string(),
                message: "round limit must be at least 1".to_string(),
            });
        }
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        validate_agents(&mut self.agents, &self.players)?;
        Ok(())
    }

    /// Output paths with `{run_id}` substituted.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            narrative: self
                .outputs
                .narrative
                .as_deref()
                .map(|template| resolve_template(&self.run_id, template)),
            results: self
                .outputs
                .results
                .as_deref()
                .map(|template| resolve_template(&self.run_id, template)),
        }
    }
}

fn default_players() -> Vec<String> {
    DEFAULT_PLAYERS.iter().map(|name| name.to_string()).collect()
}

fn default_games() -> usize {
    1
}

fn default_round_limit() -> u32 {
    DEFAULT_ROUND_LIMIT
}

/// How a sub-phase's decisions are gathered.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One player at a time; day speakers see earlier messages.
    #[default]
    Sequential,
    /// All players of a sub-phase at once on scoped threads.
    Parallel,
}

/// Definition of a decision source and the players it drives.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
    /// Players driven by this agent. Empty means every unclaimed player.
    #[serde(default)]
    pub players: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Heuristic,
    Scripted,
    External,
    Human,
}

/// Output artifact configuration. Unset paths are not written.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OutputsConfig {
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub results: Option<String>,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.narrative", &self.narrative),
            ("outputs.results", &self.results),
        ] {
            let Some(value) = value else {
                continue;
            };
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path is blank".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path resolves to nothing".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Tracing and narrative echo settings. Structured logs are off unless enabled.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_echo_narrative")]
    pub echo_narrative: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
            echo_narrative: default_echo_narrative(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_echo_narrative() -> bool {
    true
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id is required".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id allows only letters, digits, '.', '_' and '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_players(players: &mut [String]) -> Result<(), ValidationError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players.len()) {
        return Err(ValidationError::InvalidField {
            field: "players".to_string(),
            message: format!(
                "between {MIN_PLAYERS} and {MAX_PLAYERS} players are required, found {}",
                players.len()
            ),
        });
    }

    let mut seen = HashSet::new();
    for player in players.iter_mut() {
        let trimmed = player.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "players".to_string(),
                message: "player names must not be empty".to_string(),
            });
        }
        if normalize_target(trimmed) != trimmed || trimmed.eq_ignore_ascii_case(NO_VOTE) {
            return Err(ValidationError::InvalidField {
                field: "players".to_string(),
                message: format!("player name '{trimmed}' cannot be voted for or targeted"),
            });
        }
        if trimmed.len() != player.len() {
            *player = trimmed.to_string();
        }
        if !seen.insert(player.clone()) {
            return Err(ValidationError::InvalidField {
                field: "players".to_string(),
                message: format!("player '{player}' listed more than once"),
            });
        }
    }
    Ok(())
}

fn validate_agents(agents: &mut [AgentConfig], players: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut claimed = HashSet::new();
    let mut defaults = 0usize;

    for agent in agents.iter_mut() {
        if agent.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "agents.name".to_string(),
                message: "every agent needs a name".to_string(),
            });
        }

        if !agent
            .name
            .chars()
            .all(|c| RUN_ID_ALLOWED.contains(c))
        {
            return Err(ValidationError::InvalidField {
                field: format!("agents[{}].name", agent.name),
                message: "agent name has characters outside [A-Za-z0-9._-]".to_string(),
            });
        }

        if !seen.insert(agent.name.clone()) {
            return Err(ValidationError::InvalidField {
                field: "agents".to_string(),
                message: format!("agent name '{}' defined more than once", agent.name),
            });
        }

        if agent.players.is_empty() {
            defaults += 1;
        }
        for player in &agent.players {
            if !players.contains(player) {
                return Err(ValidationError::InvalidField {
                    field: format!("agents[{}].players", agent.name),
                    message: format!("'{player}' is not in the players list"),
                });
            }
            if !claimed.insert(player.clone()) {
                return Err(ValidationError::InvalidField {
                    field: format!("agents[{}].players", agent.name),
                    message: format!("'{player}' is already driven by another agent"),
                });
            }
        }

        if agent.params.is_null() {
            agent.params = serde_yaml::Value::Mapping(Default::default());
        }
    }

    if defaults > 1 {
        return Err(ValidationError::InvalidField {
            field: "agents".to_string(),
            message: "at most one agent may leave its players list empty".to_string(),
        });
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub narrative: Option<PathBuf>,
    pub results: Option<PathBuf>,
}

impl ResolvedOutputs {
    /// Directory that receives `telemetry.jsonl` when structured logging is on.
    pub fn telemetry_dir(&self) -> PathBuf {
        self.results
            .as_ref()
            .or(self.narrative.as_ref())
            .and_then(|path| path.parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Failures while reading a simulation config from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// A config field that failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
