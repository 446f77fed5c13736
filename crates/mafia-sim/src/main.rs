use std::path::PathBuf;

use clap::Parser;

use mafia_sim::config::{AgentConfig, AgentKind, DispatchMode, ResolvedOutputs, SimulationConfig};
use mafia_sim::evaluation::{GameEvent, Simulation};
use mafia_sim::logging::init_logging;

/// Mafia game simulator with pluggable decision providers.
#[derive(Debug, Parser)]
#[command(
    name = "mafiasim",
    author,
    version,
    about = "Run a single Mafia game or evaluate agents over many games"
)]
struct Cli {
    /// Path to a YAML configuration file. Without one, heuristic bots play.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Comma-separated player names (default: Alice,Bob,Charlie,Dana).
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    players: Option<Vec<String>>,

    /// Number of games to play for evaluation. 0 plays a single game.
    #[arg(long, value_name = "GAMES", default_value_t = 0)]
    eval: usize,

    /// RNG seed for role assignment and bot decisions.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Write the narrative to this file as well as stdout.
    #[arg(long, value_name = "FILE")]
    narrative: Option<String>,

    /// Write one JSON line per game to this file.
    #[arg(long, value_name = "FILE")]
    results: Option<String>,

    /// Ask all players of a sub-phase at once.
    #[arg(long)]
    parallel: bool,

    /// Let a person play this seat from the terminal.
    #[arg(long, value_name = "NAME")]
    human: Option<String>,

    /// Do not echo the narrative to stdout.
    #[arg(long)]
    quiet: bool,

    /// Exit after validating the configuration (no game is played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::for_players(
            mafia_sim::config::DEFAULT_PLAYERS.iter().copied(),
        ),
    };

    if let Some(players) = cli.players {
        config.players = players
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if cli.eval > 0 {
        config.games = cli.eval;
    }

    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }

    if let Some(narrative) = cli.narrative {
        config.outputs.narrative = Some(narrative);
    }

    if let Some(results) = cli.results {
        config.outputs.results = Some(results);
    }

    if cli.parallel {
        config.dispatch = DispatchMode::Parallel;
    }

    if cli.quiet {
        config.logging.echo_narrative = false;
    }

    if let Some(human) = cli.human {
        let human = human.trim().to_string();
        for agent in &mut config.agents {
            agent.players.retain(|player| *player != human);
        }
        config.agents.push(AgentConfig {
            name: "human".to_string(),
            kind: AgentKind::Human,
            params: serde_yaml::Value::Null,
            players: vec![human],
        });
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let games = config.games;
    let player_count = config.players.len();

    println!(
        "Loaded configuration '{run_id}' with {player_count} players ({games} game{}, {} dispatch)",
        if games == 1 { "" } else { "s" },
        match config.dispatch {
            DispatchMode::Sequential => "sequential",
            DispatchMode::Parallel => "parallel",
        }
    );

    let logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let simulation = Simulation::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: no game was played.");
        return Ok(());
    }

    let summary = if games == 1 {
        println!("Starting a single game...");
        simulation.run_with(|event| match event {
            GameEvent::Dealt(setup) => {
                println!("Role assignments:");
                for (name, role) in setup.state.roster().assignment() {
                    println!("  {name}: {role}");
                }
            }
            GameEvent::Finished { result, .. } => match result.winner {
                Some(team) => println!(
                    "Winner: {team} after {} day(s) and {} night(s)",
                    result.days, result.nights
                ),
                None => println!("No winner: round limit reached after {} day(s)", result.days),
            },
        })?
    } else {
        println!("Running evaluation over {games} games...");
        simulation.run_with(|event| {
            if let GameEvent::Finished { index, result } = event {
                let winner = result
                    .winner
                    .map_or_else(|| "none".to_string(), |team| team.to_string());
                println!("Game {}/{games} complete. Winner: {winner}", index + 1);
            }
        })?
    };

    if games > 1 {
        println!(
            "\nEvaluation complete. Mafia win rate: {:.2}% over {} games.",
            summary.mafia_win_rate(),
            summary.games
        );
        if summary.unresolved > 0 {
            println!("  {} game(s) hit the round limit", summary.unresolved);
        }
    }
    if let Some(path) = summary.results_path.as_ref() {
        println!("Results: {}", path.display());
    }
    if let Some(path) = summary.narrative_path.as_ref() {
        println!("Narrative: {}", path.display());
    }
    if let Some(path) = logging_guard.telemetry_path.as_ref() {
        println!("Telemetry log: {}", path.display());
    }

    Ok(())
}
