use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mafia_core::game::{GameState, Narrative, PhaseError};
use mafia_core::model::role::Team;
use mafia_core::model::roster::{Roster, RosterError};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::agents::{AgentError, AgentRoster};
use crate::config::{ResolvedOutputs, SimulationConfig};
use crate::controller::{Elimination, GameResult, PhaseController, Seat};

/// Plays one or more games from a validated configuration.
pub struct Simulation {
    config: SimulationConfig,
    outputs: ResolvedOutputs,
    agents: AgentRoster,
    seeds: Vec<u64>,
}

/// A game with roles dealt, ready to be played.
pub struct GameSetup {
    pub index: usize,
    pub seed: u64,
    pub state: GameState,
}

/// Progress reported by [`Simulation::run_with`].
pub enum GameEvent<'a> {
    /// Roles were dealt and the game is about to start.
    Dealt(&'a GameSetup),
    Finished { index: usize, result: &'a GameResult },
}

pub struct RunSummary {
    pub games: usize,
    pub mafia_wins: usize,
    pub town_wins: usize,
    /// Games stopped by the round limit.
    pub unresolved: usize,
    pub results: Vec<GameResult>,
    pub results_path: Option<PathBuf>,
    pub narrative_path: Option<PathBuf>,
}

impl RunSummary {
    /// Percentage of games won by the Mafia.
    pub fn mafia_win_rate(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.mafia_wins as f64 / self.games as f64 * 100.0
    }
}

#[derive(Serialize)]
struct GameRow<'a> {
    run_id: &'a str,
    game_index: usize,
    seed: u64,
    winner: Option<Team>,
    days: u32,
    nights: u32,
    fallbacks: usize,
    assignment: &'a [Seat],
    eliminations: &'a [Elimination],
}

impl Simulation {
    pub fn new(config: SimulationConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let agents = AgentRoster::from_configs(&config.agents)?;
        let base_seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(base_seed);
        let seeds = (0..config.games).map(|_| rng.next_u64()).collect();
        event!(
            target: "mafia_sim::run",
            Level::INFO,
            run_id = %config.run_id,
            base_seed,
            games = config.games,
            players = config.players.len(),
            "simulation prepared"
        );

        Ok(Self {
            config,
            outputs,
            agents,
            seeds,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn outputs(&self) -> &ResolvedOutputs {
        &self.outputs
    }

    /// Deals roles for game `index` from that game's seed.
    pub fn setup_game(&self, index: usize) -> Result<GameSetup, RunnerError> {
        let seed = self
            .seeds
            .get(index)
            .copied()
            .ok_or(RunnerError::GameIndex {
                index,
                games: self.seeds.len(),
            })?;
        let mut rng = StdRng::seed_from_u64(seed);
        let roster = Roster::from_names(&self.config.players, &mut rng)?;
        Ok(GameSetup {
            index,
            seed,
            state: GameState::new(roster, seed),
        })
    }

    /// Opens the narrative sink: the configured file, or memory only.
    pub fn open_narrative(&self) -> Result<Arc<Narrative>, RunnerError> {
        let narrative = match &self.outputs.narrative {
            Some(path) => {
                ensure_parent(path.parent())?;
                Narrative::create(path).map_err(|source| RunnerError::Narrative {
                    path: path.clone(),
                    source,
                })?
            }
            None => Narrative::in_memory(),
        };
        Ok(Arc::new(
            narrative.echo_to_stdout(self.config.logging.echo_narrative),
        ))
    }

    pub fn play(&self, setup: GameSetup, narrative: &Arc<Narrative>) -> Result<GameResult, RunnerError> {
        let providers = self.agents.spawn_all(setup.state.roster().names(), setup.seed);
        let controller = PhaseController::new(setup.state, providers, Arc::clone(narrative))
            .with_dispatch(self.config.dispatch)
            .with_round_limit(self.config.round_limit)
            .with_game_index(setup.index);
        Ok(controller.run()?)
    }

    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        self.run_with(|_| {})
    }

    /// Plays every configured game, streaming one JSONL row per game and
    /// reporting each deal and result to `observe`.
    pub fn run_with<F>(&self, mut observe: F) -> Result<RunSummary, RunnerError>
    where
        F: FnMut(GameEvent<'_>),
    {
        let narrative = self.open_narrative()?;
        let mut writer = match &self.outputs.results {
            Some(path) => {
                ensure_parent(path.parent())?;
                Some(BufWriter::new(File::create(path)?))
            }
            None => None,
        };

        let games = self.seeds.len();
        let mut summary = RunSummary {
            games,
            mafia_wins: 0,
            town_wins: 0,
            unresolved: 0,
            results: Vec::with_capacity(games),
            results_path: self.outputs.results.clone(),
            narrative_path: self.outputs.narrative.clone(),
        };

        for index in 0..games {
            let setup = self.setup_game(index)?;
            let seed = setup.seed;
            if games > 1 {
                narrative.announce(format!("\n##### Game {} of {games} #####", index + 1));
            }
            observe(GameEvent::Dealt(&setup));
            let result = self.play(setup, &narrative)?;

            match result.winner {
                Some(Team::Mafia) => summary.mafia_wins += 1,
                Some(Team::Town) => summary.town_wins += 1,
                None => summary.unresolved += 1,
            }
            if let Some(writer) = writer.as_mut() {
                write_game_row(writer, &self.config.run_id, index, seed, &result)?;
            }
            observe(GameEvent::Finished {
                index,
                result: &result,
            });
            summary.results.push(result);
        }

        if let Some(writer) = writer.as_mut() {
            writer.flush()?;
        }
        narrative.close()?;

        event!(
            target: "mafia_sim::run",
            Level::INFO,
            run_id = %self.config.run_id,
            games,
            mafia_wins = summary.mafia_wins,
            town_wins = summary.town_wins,
            unresolved = summary.unresolved,
            mafia_win_rate = summary.mafia_win_rate(),
            "simulation complete"
        );
        Ok(summary)
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_game_row(
    writer: &mut BufWriter<File>,
    run_id: &str,
    game_index: usize,
    seed: u64,
    result: &GameResult,
) -> Result<(), RunnerError> {
    let row = GameRow {
        run_id,
        game_index,
        seed,
        winner: result.winner,
        days: result.days,
        nights: result.nights,
        fallbacks: result.fallbacks,
        assignment: &result.assignment,
        eliminations: &result.eliminations,
    };
    serde_json::to_writer(&mut *writer, &row)?;
    writer.write_all(b"\n")?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("{0}")]
    Roster(#[from] RosterError),
    #[error("game execution failed: {0}")]
    Phase(#[from] PhaseError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize result row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("failed to open narrative {path:?}: {source}")]
    Narrative {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("game {index} requested but only {games} configured")]
    GameIndex { index: usize, games: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(games: usize, seed: u64) -> SimulationConfig {
        let mut config = SimulationConfig::for_players(["Alice", "Bob", "Charlie", "Dana", "Eve", "Finn"]);
        config.games = games;
        config.seed = Some(seed);
        config.logging.echo_narrative = false;
        config.validate().unwrap();
        config
    }

    #[test]
    fn same_seed_deals_same_roles() {
        let first = Simulation::new(config(3, 99), ResolvedOutputs::default()).unwrap();
        let second = Simulation::new(config(3, 99), ResolvedOutputs::default()).unwrap();
        for index in 0..3 {
            let a = first.setup_game(index).unwrap();
            let b = second.setup_game(index).unwrap();
            assert_eq!(a.seed, b.seed);
            assert_eq!(a.state.roster().assignment(), b.state.roster().assignment());
        }
        assert!(matches!(
            first.setup_game(3),
            Err(RunnerError::GameIndex { index: 3, games: 3 })
        ));
    }

    #[test]
    fn summary_counts_every_game() {
        let simulation = Simulation::new(config(5, 7), ResolvedOutputs::default()).unwrap();
        let mut seen = Vec::new();
        let summary = simulation
            .run_with(|event| match event {
                GameEvent::Dealt(setup) => seen.push(("dealt", setup.index)),
                GameEvent::Finished { index, .. } => seen.push(("finished", index)),
            })
            .unwrap();

        assert_eq!(seen.len(), 10);
        assert_eq!(seen[8], ("dealt", 4));
        assert_eq!(seen[9], ("finished", 4));
        assert_eq!(summary.games, 5);
        assert_eq!(summary.mafia_wins + summary.town_wins + summary.unresolved, 5);
        let expected = summary.mafia_wins as f64 / 5.0 * 100.0;
        assert!((summary.mafia_win_rate() - expected).abs() < f64::EPSILON);
    }
}
