use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colosseum_engine::logging::{init_logging, init_logging_simple};
use colosseum_engine::{read_jsonl, Arena, BroadcastHub, EngineConfig, JsonlSink, MatchConfig};
use colosseum_logic::{replay, seed_from_str, GameType, MatchEvent};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "colosseum")]
#[command(version)]
#[command(about = "Agent Colosseum match engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match between two built-in agents, streaming NDJSON events to stdout
    Run {
        /// resource_wars, negotiation or auction
        #[arg(short, long, default_value = "resource_wars")]
        game: String,
        /// Red personality (aggressive, defensive, adaptive, chaotic)
        #[arg(long, default_value = "aggressive")]
        red: String,
        /// Blue personality
        #[arg(long, default_value = "defensive")]
        blue: String,
        /// Rounds to play (defaults to the game's usual length)
        #[arg(short, long)]
        rounds: Option<i64>,
        /// Match seed, a number or any text; same seed, same match
        #[arg(short, long, env = "COLOSSEUM_SEED")]
        seed: Option<String>,
        /// Also write the event log to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Directory holding default.toml
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,
    },
    /// Rebuild a match from an NDJSON event log and print its outcome
    Replay {
        /// Log written by `run --out` or captured from stdout
        file: PathBuf,
    },
    /// List the game types the engine knows
    GameTypes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            game,
            red,
            blue,
            rounds,
            seed,
            out,
            config_dir,
        } => {
            let config = EngineConfig::load_from(&config_dir)
                .with_context(|| format!("loading config from {}", config_dir.display()))?;
            init_logging(&config.logging);
            let match_config = MatchConfig {
                game_type: game,
                red_personality: red,
                blue_personality: blue,
                total_rounds: rounds,
                seed: seed.map(|s| s.parse().unwrap_or_else(|_| seed_from_str(&s))),
            };
            run_match(config, match_config, out).await?;
        }
        Commands::Replay { file } => {
            init_logging_simple();
            replay_file(&file).await?;
        }
        Commands::GameTypes => {
            let games: Vec<_> = GameType::ALL
                .iter()
                .map(|g| {
                    serde_json::json!({
                        "id": g.as_str(),
                        "name": g.display_name(),
                        "description": g.description(),
                        "defaultRounds": g.default_rounds(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&games)?);
        }
    }

    Ok(())
}

async fn run_match(config: EngineConfig, match_config: MatchConfig, out: Option<PathBuf>) -> Result<()> {
    config.validate()?;

    let mut hub = BroadcastHub::new(config.broadcast_capacity).with_sink(Arc::new(JsonlSink::stdout()));
    if let Some(path) = &out {
        let sink = JsonlSink::create(path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        hub = hub.with_sink(Arc::new(sink));
    }
    let arena = Arena::new(config, Arc::new(hub));

    let handle = arena.start_match(&match_config).await?;
    info!(match_id = %handle.id(), "match started");

    let summary = tokio::select! {
        summary = handle.wait() => summary,
        _ = signal::ctrl_c() => {
            warn!(match_id = %handle.id(), "interrupted, aborting match");
            handle.abort()?;
            handle.wait().await
        }
    };

    // The log alone must reproduce what the engine reported
    let outcome = arena.replay(handle.id()).await?;
    if outcome.scores != summary.scores || outcome.winner != summary.winner {
        bail!(
            "replay of {} disagrees with the live match: {:?} vs {:?}",
            handle.id(),
            outcome.scores,
            summary.scores
        );
    }

    info!(
        match_id = %handle.id(),
        winner = ?summary.winner,
        red = summary.scores.red,
        blue = summary.scores.blue,
        rounds = summary.current_round,
        cancelled = summary.cancelled,
        "match complete"
    );
    Ok(())
}

async fn replay_file(path: &PathBuf) -> Result<()> {
    let envelopes = read_jsonl(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let events: Vec<MatchEvent> = envelopes.into_iter().map(|e| e.event).collect();
    if events.is_empty() {
        bail!("{} holds no events", path.display());
    }
    let outcome = replay(&events)?;

    let report = serde_json::json!({
        "matchId": outcome.match_id,
        "gameType": outcome.game_type,
        "rounds": outcome.rounds,
        "scores": outcome.scores,
        "winner": outcome.winner,
        "cancelled": outcome.cancelled,
        "moves": outcome.moves,
        "finalState": outcome.final_state.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
