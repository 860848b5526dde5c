//! The capability the engine asks for moves
//!
//! An agent gets its own view of the game and the revealed history, and
//! answers through a [`TurnContext`]: any number of predictions up to the
//! branching factor, then one committed move.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colosseum_logic::{
    plan_turn, stream, AgentInfo, GameState, Move, Personality, Prediction, Seal, SeededRng, Side,
    SideView,
};
use tracing::debug;

use crate::barrier::CommitBarrier;
use crate::error::{EngineError, Result};

/// Everything an agent may know when it takes a turn
#[derive(Clone, Debug)]
pub struct AgentTurn {
    pub view: SideView,
    /// Revealed moves of earlier rounds
    pub my_history: Vec<Move>,
    pub opponent_history: Vec<Move>,
}

/// Reply channel for one side in one round
#[derive(Clone)]
pub struct TurnContext {
    side: Side,
    round: u32,
    barrier: Arc<CommitBarrier>,
    // Legality checks only; never exposed to the agent
    state: Arc<GameState>,
}

impl TurnContext {
    pub(crate) fn new(side: Side, barrier: Arc<CommitBarrier>, state: Arc<GameState>) -> Self {
        Self {
            side,
            round: barrier.round(),
            barrier,
            state,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Predictions allowed this round
    pub fn branching(&self) -> u32 {
        self.barrier.branching()
    }

    pub async fn predict(&self, prediction: Prediction) -> Result<u32> {
        self.barrier.record_prediction(self.side, prediction).await
    }

    /// Commit this round's move. Illegal moves are rejected and the side may
    /// try again until the deadline.
    pub async fn commit(&self, mv: Move) -> Result<Seal> {
        self.state
            .check_move(self.side, &mv)
            .map_err(|e| EngineError::invalid_move(self.side, e))?;
        self.barrier.commit(self.side, mv).await
    }

    /// Give up the round; the engine substitutes the fallback move
    pub async fn forfeit(&self) {
        self.barrier.forfeit(self.side).await
    }
}

#[async_trait]
pub trait Agent: Send + Sync + 'static {
    fn info(&self) -> AgentInfo;

    /// Play one round. Returning without a commit forfeits the round.
    async fn take_turn(&self, turn: AgentTurn, ctx: TurnContext) -> Result<()>;
}

// ── Personality agent ──

/// Seeded built-in agent. The same seed plays the same match.
pub struct PersonalityAgent {
    personality: Personality,
    seed: u64,
    think_time: Duration,
}

impl PersonalityAgent {
    pub fn new(personality: Personality, seed: u64) -> Self {
        Self {
            personality,
            seed,
            think_time: Duration::ZERO,
        }
    }

    /// Spread `think_time` across the turn, between predictions
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }
}

#[async_trait]
impl Agent for PersonalityAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: format!("{} agent", self.personality),
            personality: Some(self.personality),
        }
    }

    async fn take_turn(&self, turn: AgentTurn, ctx: TurnContext) -> Result<()> {
        let side = ctx.side();
        let mut rng =
            SeededRng::new(self.seed, stream::PERSONALITY + side.index()).for_round(ctx.round());
        let plan = plan_turn(
            self.personality,
            &turn.view,
            &turn.opponent_history,
            ctx.branching(),
            &mut rng,
        );

        let steps = plan.predictions.len() as u32 + 1;
        for prediction in plan.predictions {
            self.think(steps).await;
            ctx.predict(prediction).await?;
        }
        self.think(steps).await;
        let seal = ctx.commit(plan.chosen).await?;
        debug!(%side, round = ctx.round(), ?seal, "personality agent committed");
        Ok(())
    }
}

impl PersonalityAgent {
    async fn think(&self, steps: u32) {
        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time / steps.max(1)).await;
        }
    }
}

// ── External agent ──

/// Placeholder for an agent driven over the control surface
/// (`MatchHandle::submit_move` / `submit_prediction`)
pub struct ExternalAgent {
    name: String,
}

impl ExternalAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Agent for ExternalAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            personality: None,
        }
    }

    async fn take_turn(&self, _turn: AgentTurn, _ctx: TurnContext) -> Result<()> {
        // Moves arrive through the match handle; the deadline ends the turn
        futures::future::pending::<()>().await;
        Ok(())
    }
}

// ── Scripted agent ──

/// One scripted round
#[derive(Clone, Debug, Default)]
pub struct ScriptedTurn {
    pub predictions: Vec<Prediction>,
    /// `None` stalls until the deadline
    pub mv: Option<Move>,
    pub delay: Duration,
}

/// Plays a fixed script, for tests and demos. Rounds past the end of the
/// script stall.
pub struct ScriptedAgent {
    name: String,
    turns: Vec<ScriptedTurn>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>, turns: Vec<ScriptedTurn>) -> Self {
        Self {
            name: name.into(),
            turns,
        }
    }

    /// Commit `moves` in order, no predictions, no delay
    pub fn moves(name: impl Into<String>, moves: impl IntoIterator<Item = Move>) -> Self {
        let turns = moves
            .into_iter()
            .map(|mv| ScriptedTurn {
                mv: Some(mv),
                ..ScriptedTurn::default()
            })
            .collect();
        Self::new(name, turns)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            personality: None,
        }
    }

    async fn take_turn(&self, _turn: AgentTurn, ctx: TurnContext) -> Result<()> {
        let Some(turn) = self.turns.get(ctx.round() as usize - 1) else {
            futures::future::pending::<()>().await;
            return Ok(());
        };
        for prediction in &turn.predictions {
            ctx.predict(prediction.clone()).await?;
        }
        if !turn.delay.is_zero() {
            tokio::time::sleep(turn.delay).await;
        }
        match turn.mv {
            Some(mv) => {
                ctx.commit(mv).await?;
            }
            None => futures::future::pending::<()>().await,
        }
        Ok(())
    }
}
