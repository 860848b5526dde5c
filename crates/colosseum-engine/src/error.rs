use colosseum_logic::{PollError, ReplayError, RulesError, Side};
use thiserror::Error;

use crate::state::MatchId;

/// Errors surfaced by the engine and its control surface
#[derive(Error, Debug)]
pub enum EngineError {
    // Move submission
    #[error("Invalid move from {side}: {source}")]
    InvalidMove {
        side: Side,
        #[source]
        source: RulesError,
    },

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error("{side} already committed a move for round {round}")]
    DoubleCommit { side: Side, round: u32 },

    #[error("{side} already produced {limit} predictions for round {round}")]
    PredictionLimit { side: Side, round: u32, limit: u32 },

    #[error("Round {round} is closed for {side}")]
    RoundClosed { side: Side, round: u32 },

    #[error("{side} missed the thinking deadline in round {round}")]
    AgentTimeout { side: Side, round: u32 },

    // Audience
    #[error("Stale vote: {0}")]
    StaleVote(#[from] PollError),

    // Match lifecycle
    #[error("Match {0} has already ended")]
    TerminalStateViolation(MatchId),

    #[error("Invalid match configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown match: {0}")]
    UnknownMatch(MatchId),

    #[error("Arena is full ({0} live matches)")]
    ArenaFull(usize),

    #[error("Invalid phase transition: from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Event log
    #[error("Event {seq} for {match_id} arrived out of order (expected {expected})")]
    SequenceGap {
        match_id: MatchId,
        seq: u64,
        expected: u64,
    },

    #[error("Replay failed: {0}")]
    Replay(#[from] ReplayError),

    #[error("Event sink error: {0}")]
    Sink(String),

    // Plumbing
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_move(side: Side, source: RulesError) -> Self {
        EngineError::InvalidMove { side, source }
    }
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
