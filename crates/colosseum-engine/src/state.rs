//! Per-match bookkeeping owned by the match engine

use std::fmt;

use chrono::{DateTime, Utc};
use colosseum_logic::{AccuracyTally, AgentInfo, GameType, Phase, PerSide, PollTally, Side};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        MatchId(format!("match_{}", &hex[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MatchId {
    fn from(s: &str) -> Self {
        MatchId(s.to_string())
    }
}

impl From<String> for MatchId {
    fn from(s: String) -> Self {
        MatchId(s)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The match itself. Only the engine task writes to it.
#[derive(Clone, Debug)]
pub struct MatchRecord {
    pub id: MatchId,
    pub game_type: GameType,
    pub agents: PerSide<AgentInfo>,
    pub total_rounds: u32,
    pub current_round: u32,
    pub phase: Phase,
    pub scores: PerSide<i64>,
    pub accuracy: PerSide<AccuracyTally>,
    pub futures_simulated: u64,
    pub winner: Option<Side>,
    pub cancelled: bool,
    /// (round, side) for every fallback the engine had to substitute
    pub degraded: Vec<(u32, Side)>,
    pub audience: PollTally,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    pub fn new(
        id: MatchId,
        game_type: GameType,
        agents: PerSide<AgentInfo>,
        total_rounds: u32,
        seed: u64,
    ) -> Self {
        Self {
            id,
            game_type,
            agents,
            total_rounds,
            current_round: 0,
            phase: Phase::Lobby,
            scores: PerSide::default(),
            accuracy: PerSide::default(),
            futures_simulated: 0,
            winner: None,
            cancelled: false,
            degraded: Vec::new(),
            audience: PollTally::default(),
            seed,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `next`, refusing anything the phase machine does not allow
    pub fn advance(&mut self, next: Phase) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(EngineError::TerminalStateViolation(self.id.clone()));
        }
        if !self.phase.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        if next == Phase::MatchEnd {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Start the next round; never past `total_rounds`
    pub fn begin_round(&mut self) -> Result<u32> {
        if self.current_round >= self.total_rounds {
            return Err(EngineError::InvalidTransition {
                from: format!("round {}", self.current_round),
                to: format!("round {}", self.current_round + 1),
            });
        }
        self.advance(Phase::Thinking)?;
        self.current_round += 1;
        Ok(self.current_round)
    }

    pub fn accuracy(&self) -> PerSide<f64> {
        self.accuracy.map(|_, tally| tally.accuracy())
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            match_id: self.id.clone(),
            game_type: self.game_type,
            agents: self.agents.clone(),
            phase: self.phase,
            current_round: self.current_round,
            total_rounds: self.total_rounds,
            scores: self.scores,
            accuracy: self.accuracy(),
            futures_simulated: self.futures_simulated,
            winner: self.winner,
            cancelled: self.cancelled,
            degraded_rounds: self.degraded.len(),
            audience: self.audience,
        }
    }
}

/// Immutable snapshot handed to readers after each round
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub game_type: GameType,
    pub agents: PerSide<AgentInfo>,
    pub phase: Phase,
    pub current_round: u32,
    pub total_rounds: u32,
    pub scores: PerSide<i64>,
    pub accuracy: PerSide<f64>,
    pub futures_simulated: u64,
    pub winner: Option<Side>,
    pub cancelled: bool,
    pub degraded_rounds: usize,
    pub audience: PollTally,
}

impl MatchSummary {
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}
