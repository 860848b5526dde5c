//! One match, start to finish
//!
//! A [`MatchEngine`] owns its game state and runs as a single task, so every
//! mutation of the match happens in one place and in phase order:
//!
//! ```text
//! lobby -> thinking -> committed -> revealed -> round_end -+-> match_end
//!             ^                                            |
//!             +--------------------------------------------+
//! ```
//!
//! Everything outside the task talks to it through a [`MatchHandle`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colosseum_logic::{
    score_predictions, seal_move, AudiencePoll, GameState, MatchEvent, Move, PerSide, Phase,
    PollError, Prediction, Salt, Seal, Side,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentTurn, TurnContext};
use crate::barrier::{BarrierOutcome, CommitBarrier, Commitment, StreamedPrediction};
use crate::config::{EngineConfig, ValidMatchConfig};
use crate::error::{EngineError, Result};
use crate::hub::{BroadcastHub, EventContext, EventEnvelope};
use crate::state::{MatchId, MatchRecord, MatchSummary};

/// Timing and limits a match runs with
#[derive(Clone, Copy, Debug)]
pub struct EngineSettings {
    pub branching: u32,
    pub thinking_deadline: Duration,
    pub round_delay: Duration,
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            branching: config.branching_factor,
            thinking_deadline: config.thinking_deadline(),
            round_delay: config.round_delay(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

enum Control {
    SubmitMove {
        side: Side,
        mv: Move,
        reply: oneshot::Sender<Result<Seal>>,
    },
    SubmitPrediction {
        side: Side,
        prediction: Prediction,
        reply: oneshot::Sender<Result<u32>>,
    },
    Vote {
        round: u32,
        voted_for: Side,
        reply: oneshot::Sender<Result<u32>>,
    },
    Abort,
}

/// How a stretch of the match ended
enum Flow {
    Continue,
    Completed,
    Aborted,
}

// ── Handle ──

/// Cheap, cloneable access to a running match
#[derive(Clone)]
pub struct MatchHandle {
    id: MatchId,
    control: mpsc::UnboundedSender<Control>,
    summary: watch::Receiver<MatchSummary>,
    /// Round the audience may vote on right now, 0 when none
    voting_round: Arc<AtomicU32>,
}

impl MatchHandle {
    pub fn id(&self) -> &MatchId {
        &self.id
    }

    /// State as of the last completed round
    pub fn summary(&self) -> MatchSummary {
        self.summary.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.summary.borrow().is_finished()
    }

    /// Commit a move for `side` in the current round
    pub async fn submit_move(&self, side: Side, mv: Move) -> Result<Seal> {
        self.request(|reply| Control::SubmitMove { side, mv, reply })
            .await
    }

    pub async fn submit_prediction(&self, side: Side, prediction: Prediction) -> Result<u32> {
        self.request(|reply| Control::SubmitPrediction {
            side,
            prediction,
            reply,
        })
        .await
    }

    /// Vote on who wins the current round; returns the round voted on. The
    /// round is fixed when this is called, not when the engine reads it.
    pub async fn submit_vote(&self, voted_for: Side) -> Result<u32> {
        match self.voting_round.load(Ordering::Acquire) {
            0 => {
                let round = self.summary.borrow().current_round;
                let err = if round == 0 {
                    PollError::UnknownRound { round }
                } else {
                    PollError::StaleVote { round }
                };
                Err(err.into())
            }
            round => self.submit_vote_for(round, voted_for).await,
        }
    }

    /// Vote on a specific round. Anything but the open round is stale.
    pub async fn submit_vote_for(&self, round: u32, voted_for: Side) -> Result<u32> {
        self.request(|reply| Control::Vote {
            round,
            voted_for,
            reply,
        })
        .await
    }

    /// Stop the match at the next opportunity. It ends cancelled, no winner.
    pub fn abort(&self) -> Result<()> {
        self.control
            .send(Control::Abort)
            .map_err(|_| EngineError::TerminalStateViolation(self.id.clone()))
    }

    /// Wait for match_end
    pub async fn wait(&self) -> MatchSummary {
        let mut rx = self.summary.clone();
        loop {
            if rx.borrow_and_update().is_finished() {
                return rx.borrow().clone();
            }
            // Sender dropped: the task is gone, whatever we hold is final
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Control) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(make(tx))
            .map_err(|_| EngineError::TerminalStateViolation(self.id.clone()))?;
        rx.await
            .map_err(|_| EngineError::TerminalStateViolation(self.id.clone()))?
    }
}

// ── Engine ──

pub struct MatchEngine {
    record: MatchRecord,
    state: GameState,
    agents: PerSide<Arc<dyn Agent>>,
    history: PerSide<Vec<Move>>,
    poll: AudiencePoll,
    hub: Arc<BroadcastHub>,
    settings: EngineSettings,
    control: mpsc::UnboundedReceiver<Control>,
    summary: watch::Sender<MatchSummary>,
    voting_round: Arc<AtomicU32>,
    seq: u64,
}

impl MatchEngine {
    /// Build a match in the lobby. Nothing is emitted until [`run`](Self::run).
    pub fn new(
        id: MatchId,
        config: ValidMatchConfig,
        agents: PerSide<Arc<dyn Agent>>,
        hub: Arc<BroadcastHub>,
        settings: EngineSettings,
    ) -> (Self, MatchHandle) {
        let seed = config.seed.unwrap_or_else(random_seed);
        let record = MatchRecord::new(
            id.clone(),
            config.game_type,
            agents.as_ref().map(|_, a| a.info()),
            config.total_rounds,
            seed,
        );
        let state = GameState::new(config.game_type, config.total_rounds, seed);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (summary_tx, summary_rx) = watch::channel(record.summary());
        let voting_round = Arc::new(AtomicU32::new(0));

        let engine = Self {
            record,
            state,
            agents,
            history: PerSide::default(),
            poll: AudiencePoll::new(),
            hub,
            settings,
            control: control_rx,
            summary: summary_tx,
            voting_round: voting_round.clone(),
            seq: 0,
        };
        let handle = MatchHandle {
            id,
            control: control_tx,
            summary: summary_rx,
            voting_round,
        };
        (engine, handle)
    }

    pub fn spawn(self) -> JoinHandle<MatchSummary> {
        tokio::spawn(self.run())
    }

    /// Play the match to its end and return the final summary
    pub async fn run(mut self) -> MatchSummary {
        info!(
            match_id = %self.record.id,
            game = %self.record.game_type,
            rounds = self.record.total_rounds,
            seed = self.record.seed,
            "match starting"
        );

        let cancelled = match self.play().await {
            Ok(Flow::Aborted) => {
                info!(match_id = %self.record.id, round = self.record.current_round, "match aborted");
                true
            }
            Ok(_) => false,
            Err(e) => {
                error!(match_id = %self.record.id, error = %e, "match failed, ending it");
                true
            }
        };

        if let Err(e) = self.finish(cancelled).await {
            error!(match_id = %self.record.id, error = %e, "could not record match_end");
        }
        self.record.summary()
    }

    async fn play(&mut self) -> Result<Flow> {
        self.emit(MatchEvent::MatchStart {
            match_id: self.record.id.to_string(),
            game_type: self.record.game_type,
            agents: self.record.agents.clone(),
            total_rounds: self.record.total_rounds,
            seed: self.record.seed,
            branching_factor: self.settings.branching,
        })
        .await?;

        loop {
            let round = self.record.begin_round()?;
            self.poll.open_round(round);
            self.voting_round.store(round, Ordering::Release);
            self.emit(MatchEvent::RoundStart {
                round,
                game_state: self.state.snapshot(),
            })
            .await?;

            if let Flow::Aborted = self.play_round(round).await? {
                return Ok(Flow::Aborted);
            }

            if self.state.is_terminal() || self.record.current_round >= self.record.total_rounds {
                return Ok(Flow::Completed);
            }
            if let Flow::Aborted = self.pause(self.settings.round_delay).await {
                return Ok(Flow::Aborted);
            }
        }
    }

    async fn play_round(&mut self, round: u32) -> Result<Flow> {
        debug!(match_id = %self.record.id, round, "thinking");

        // ── Thinking ──
        let (stream_tx, mut stream_rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CommitBarrier::new(round, self.settings.branching, stream_tx));

        for side in Side::BOTH {
            self.emit(MatchEvent::ThinkingStart { agent: side }).await?;
        }
        let tasks = self.spawn_agents(&barrier);

        let deadline = Instant::now() + self.settings.thinking_deadline;
        let wait = barrier.await_both_or_timeout(deadline);
        tokio::pin!(wait);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(ctrl) = self.control.recv() => {
                    if self.handle_control(ctrl, Some(barrier.as_ref())).await {
                        break None;
                    }
                }
                Some(streamed) = stream_rx.recv() => {
                    self.emit_prediction(streamed).await?;
                }
                outcome = &mut wait => break Some(outcome),
            }
        };
        for task in &tasks {
            task.abort();
        }
        let Some(outcome) = outcome else {
            return Ok(Flow::Aborted);
        };
        // Everything accepted before close is already queued
        while let Ok(streamed) = stream_rx.try_recv() {
            self.emit_prediction(streamed).await?;
        }

        // ── Committed ──
        let (moves, predictions, missing) = self.settle_commitments(round, outcome);
        self.record.advance(Phase::Committed)?;
        for side in Side::BOTH {
            self.emit(MatchEvent::ThinkingEnd {
                agent: side,
                predictions: predictions[side].clone(),
                chosen_move: moves[side].seal,
                timed_out: missing.contains(&side),
            })
            .await?;
        }
        // Votes and stray submissions that arrived while committing
        while let Ok(ctrl) = self.control.try_recv() {
            if self.handle_control(ctrl, None).await {
                return Ok(Flow::Aborted);
            }
        }

        // ── Revealed ──
        self.record.advance(Phase::Revealed)?;
        self.voting_round.store(0, Ordering::Release);
        self.poll.close_round(round);
        let (red_predictions, red_score) = score_predictions(&predictions.red, &moves.blue.mv);
        let (blue_predictions, blue_score) = score_predictions(&predictions.blue, &moves.red.mv);
        let (next, resolution) = self.state.resolve(&moves.red.mv, &moves.blue.mv)?;
        let round_winner = resolution.winner;
        self.emit(MatchEvent::Collapse {
            red_predictions,
            blue_predictions,
            red_move: moves.red.mv,
            blue_move: moves.blue.mv,
            reveal: PerSide::new(moves.red.salt, moves.blue.salt),
            resolution,
        })
        .await?;

        // ── Round end ──
        self.record.advance(Phase::RoundEnd)?;
        self.state = next;
        self.record.scores = self.state.scores();
        self.record.accuracy.red.record(red_score);
        self.record.accuracy.blue.record(blue_score);
        self.record.futures_simulated += u64::from(red_score.total + blue_score.total);
        for side in Side::BOTH {
            self.history[side].push(moves[side].mv);
        }
        self.record.audience = self.poll.settle(round, round_winner);

        self.emit(MatchEvent::RoundEnd {
            round,
            scores: self.record.scores,
            accuracy: self.record.accuracy(),
            game_state: self.state.snapshot(),
            degraded: missing,
            audience: self.record.audience,
        })
        .await?;
        self.summary.send_replace(self.record.summary());

        info!(
            match_id = %self.record.id,
            round,
            red = self.record.scores.red,
            blue = self.record.scores.blue,
            winner = ?round_winner,
            "round complete"
        );
        Ok(Flow::Continue)
    }

    fn spawn_agents(&self, barrier: &Arc<CommitBarrier>) -> Vec<JoinHandle<()>> {
        let snapshot = Arc::new(self.state.clone());
        Side::BOTH
            .iter()
            .map(|&side| {
                let turn = AgentTurn {
                    view: self.state.view_for(side),
                    my_history: self.history[side].clone(),
                    opponent_history: self.history[side.opponent()].clone(),
                };
                let ctx = TurnContext::new(side, barrier.clone(), snapshot.clone());
                let agent = self.agents[side].clone();
                let match_id = self.record.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = agent.take_turn(turn, ctx.clone()).await {
                        warn!(%match_id, %side, round = ctx.round(), error = %e, "agent turn failed");
                    }
                    // No-op after a commit
                    ctx.forfeit().await;
                })
            })
            .collect()
    }

    /// Fill in the fallback for any side that did not commit in time
    fn settle_commitments(
        &mut self,
        round: u32,
        outcome: BarrierOutcome,
    ) -> (PerSide<Commitment>, PerSide<Vec<Prediction>>, Vec<Side>) {
        let BarrierOutcome {
            moves,
            mut predictions,
            missing,
        } = outcome;

        let fallback = self.state.fallback_move();
        let moves = moves.map(|side, committed| match committed {
            Some(c) => c,
            None => {
                warn!(
                    match_id = %self.record.id,
                    round,
                    %side,
                    error = %EngineError::AgentTimeout { side, round },
                    fallback = %fallback,
                    "no move committed, using fallback"
                );
                let salt = Salt(*Uuid::new_v4().as_bytes());
                Commitment {
                    mv: fallback,
                    salt,
                    seal: seal_move(&fallback, &salt),
                }
            }
        });
        for &side in &missing {
            // A side that missed the deadline forfeits its predictions too
            predictions[side].clear();
            self.record.degraded.push((round, side));
        }
        (moves, predictions, missing)
    }

    /// Wait out the gap between rounds, still answering the handle
    async fn pause(&mut self, delay: Duration) -> Flow {
        if delay.is_zero() {
            return Flow::Continue;
        }
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                Some(ctrl) = self.control.recv() => {
                    if self.handle_control(ctrl, None).await {
                        return Flow::Aborted;
                    }
                }
                _ = &mut sleep => return Flow::Continue,
            }
        }
    }

    /// Answer one control message. Returns true on abort.
    async fn handle_control(&mut self, ctrl: Control, barrier: Option<&CommitBarrier>) -> bool {
        let round = self.record.current_round;
        match ctrl {
            Control::SubmitMove { side, mv, reply } => {
                let result = match barrier {
                    Some(barrier) => match self.state.check_move(side, &mv) {
                        Ok(()) => barrier.commit(side, mv).await,
                        Err(e) => Err(EngineError::invalid_move(side, e)),
                    },
                    None => Err(EngineError::RoundClosed { side, round }),
                };
                if let Err(e) = &result {
                    warn!(match_id = %self.record.id, %side, round, error = %e, "move rejected");
                }
                let _ = reply.send(result);
            }
            Control::SubmitPrediction {
                side,
                prediction,
                reply,
            } => {
                let result = match barrier {
                    Some(barrier) => barrier.record_prediction(side, prediction).await,
                    None => Err(EngineError::RoundClosed { side, round }),
                };
                let _ = reply.send(result);
            }
            Control::Vote {
                round: voted_round,
                voted_for,
                reply,
            } => {
                let result = self
                    .poll
                    .submit(voted_round, voted_for)
                    .map(|_| voted_round)
                    .map_err(EngineError::from);
                if let Err(e) = &result {
                    warn!(match_id = %self.record.id, error = %e, "vote rejected");
                }
                let _ = reply.send(result);
            }
            Control::Abort => return true,
        }
        false
    }

    async fn emit_prediction(&mut self, streamed: StreamedPrediction) -> Result<()> {
        if streamed.round != self.record.current_round {
            return Ok(());
        }
        self.emit(MatchEvent::Prediction {
            agent: streamed.side,
            branch_index: streamed.branch_index,
            prediction: streamed.prediction,
        })
        .await
    }

    async fn finish(&mut self, cancelled: bool) -> Result<()> {
        self.voting_round.store(0, Ordering::Release);
        self.record.cancelled = cancelled;
        self.record.winner = if cancelled { None } else { self.state.winner() };
        self.record.advance(Phase::MatchEnd)?;

        let result = self
            .emit(MatchEvent::MatchEnd {
                winner: self.record.winner,
                final_scores: self.record.scores,
                total_futures_simulated: self.record.futures_simulated,
                prediction_accuracy: self.record.accuracy(),
                rounds_played: self.state.rounds_played(),
                cancelled,
                audience: self.record.audience,
            })
            .await;
        self.summary.send_replace(self.record.summary());

        info!(
            match_id = %self.record.id,
            winner = ?self.record.winner,
            red = self.record.scores.red,
            blue = self.record.scores.blue,
            futures = self.record.futures_simulated,
            cancelled,
            "match finished"
        );
        result
    }

    async fn emit(&mut self, event: MatchEvent) -> Result<()> {
        let kind = event.type_name();
        let envelope = EventEnvelope {
            event,
            context: EventContext {
                match_id: self.record.id.clone(),
                seq: self.seq,
                round: self.record.current_round,
                phase: self.record.phase,
                timestamp: Utc::now(),
            },
        };
        self.hub.publish(envelope).await?;
        debug!(match_id = %self.record.id, seq = self.seq, event = kind, "event published");
        self.seq += 1;
        Ok(())
    }
}

pub(crate) fn random_seed() -> u64 {
    Uuid::new_v4().as_u64_pair().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ExternalAgent, PersonalityAgent, ScriptedAgent};
    use colosseum_logic::{
        AuctionMoveKind, GameType, NegotiationMoveKind, Personality, Resource, ResourceMoveKind,
    };

    fn settings() -> EngineSettings {
        EngineSettings {
            branching: 3,
            thinking_deadline: Duration::from_secs(2),
            round_delay: Duration::ZERO,
        }
    }

    fn valid(game: GameType, rounds: u32, seed: u64) -> ValidMatchConfig {
        ValidMatchConfig {
            game_type: game,
            red: Personality::Aggressive,
            blue: Personality::Defensive,
            total_rounds: rounds,
            seed: Some(seed),
        }
    }

    fn personalities(seed: u64) -> PerSide<Arc<dyn Agent>> {
        PerSide::new(
            Arc::new(PersonalityAgent::new(Personality::Aggressive, seed)),
            Arc::new(PersonalityAgent::new(Personality::Adaptive, seed + 1)),
        )
    }

    async fn events(hub: &BroadcastHub, id: &MatchId) -> Vec<MatchEvent> {
        hub.log().match_events(id).await.unwrap()
    }

    #[tokio::test]
    async fn test_queued_vote_keeps_the_round_it_was_cast_in() {
        let hub = Arc::new(BroadcastHub::new(16));
        let (mut engine, handle) = MatchEngine::new(
            MatchId::from("match_late_vote"),
            valid(GameType::Auction, 3, 2),
            personalities(2),
            hub,
            settings(),
        );
        assert!(matches!(
            handle.submit_vote(Side::Red).await,
            Err(EngineError::StaleVote(PollError::UnknownRound { round: 0 }))
        ));

        engine.poll.open_round(1);
        engine.voting_round.store(1, Ordering::Release);
        let voter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.submit_vote(Side::Red).await })
        };
        // Sent during round 1, read only after round 2 has opened
        let queued = engine.control.recv().await.unwrap();
        engine.voting_round.store(0, Ordering::Release);
        engine.poll.close_round(1);
        engine.poll.open_round(2);
        engine.voting_round.store(2, Ordering::Release);

        assert!(!engine.handle_control(queued, None).await);
        assert!(matches!(
            voter.await.unwrap(),
            Err(EngineError::StaleVote(PollError::StaleVote { round: 1 }))
        ));
        assert!(engine.poll.votes().is_empty());
    }

    #[tokio::test]
    async fn test_full_match_event_grammar() {
        let hub = Arc::new(BroadcastHub::new(256));
        let id = MatchId::from("match_grammar");
        let (engine, _handle) = MatchEngine::new(
            id.clone(),
            valid(GameType::ResourceWars, 3, 5),
            personalities(5),
            hub.clone(),
            settings(),
        );
        let summary = engine.run().await;
        assert!(summary.is_finished());
        assert_eq!(summary.current_round, 3);

        let log = events(&hub, &id).await;
        assert!(matches!(log.first(), Some(MatchEvent::MatchStart { .. })));
        assert!(matches!(log.last(), Some(MatchEvent::MatchEnd { cancelled: false, .. })));
        let kinds: Vec<_> = log.iter().map(|e| e.type_name()).collect();
        assert_eq!(kinds.iter().filter(|k| **k == "round_start").count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == "collapse").count(), 3);
        let sealed: usize = log
            .iter()
            .map(|e| match e {
                MatchEvent::ThinkingEnd { predictions, .. } => predictions.len(),
                _ => 0,
            })
            .sum();
        let streamed = kinds.iter().filter(|k| **k == "prediction").count();
        assert_eq!(streamed, sealed);
        assert!(streamed > 0 && streamed <= 18);
    }

    #[tokio::test]
    async fn test_envelope_seq_and_phase() {
        let hub = Arc::new(BroadcastHub::new(256));
        let id = MatchId::from("match_seq");
        let (engine, _handle) = MatchEngine::new(
            id.clone(),
            valid(GameType::Auction, 2, 9),
            personalities(9),
            hub.clone(),
            settings(),
        );
        engine.run().await;

        let envelopes = hub.log().events(&id).await.unwrap();
        for (i, env) in envelopes.iter().enumerate() {
            assert_eq!(env.context.seq, i as u64);
            let expected = match &env.event {
                MatchEvent::MatchStart { .. } => Phase::Lobby,
                MatchEvent::RoundStart { .. }
                | MatchEvent::ThinkingStart { .. }
                | MatchEvent::Prediction { .. } => Phase::Thinking,
                MatchEvent::ThinkingEnd { .. } => Phase::Committed,
                MatchEvent::Collapse { .. } => Phase::Revealed,
                MatchEvent::RoundEnd { .. } => Phase::RoundEnd,
                MatchEvent::MatchEnd { .. } => Phase::MatchEnd,
                MatchEvent::Ping {} => unreachable!(),
            };
            assert_eq!(env.context.phase, expected, "{}", env.event.type_name());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_agent_gets_fallback() {
        let hub = Arc::new(BroadcastHub::new(256));
        let id = MatchId::from("match_timeout");
        let agents: PerSide<Arc<dyn Agent>> = PerSide::new(
            Arc::new(ScriptedAgent::moves(
                "red",
                [Move::resource(ResourceMoveKind::AggressiveBid, Resource::B, 70)],
            )),
            Arc::new(ExternalAgent::new("silent")),
        );
        let (engine, _handle) =
            MatchEngine::new(id.clone(), valid(GameType::ResourceWars, 1, 3), agents, hub.clone(), settings());
        let summary = engine.run().await;
        assert_eq!(summary.degraded_rounds, 1);

        let log = events(&hub, &id).await;
        let timed_out: Vec<_> = log
            .iter()
            .filter_map(|e| match e {
                MatchEvent::ThinkingEnd { agent, timed_out, .. } => Some((*agent, *timed_out)),
                _ => None,
            })
            .collect();
        assert_eq!(timed_out, vec![(Side::Red, false), (Side::Blue, true)]);
        let blue_move = log.iter().find_map(|e| match e {
            MatchEvent::Collapse { blue_move, .. } => Some(*blue_move),
            _ => None,
        });
        assert_eq!(
            blue_move,
            Some(Move::resource(ResourceMoveKind::DefensiveSpread, Resource::A, 60))
        );
    }

    #[tokio::test]
    async fn test_external_moves_through_handle() {
        let hub = Arc::new(BroadcastHub::new(256));
        let id = MatchId::from("match_external");
        let agents: PerSide<Arc<dyn Agent>> = PerSide::new(
            Arc::new(ExternalAgent::new("red")),
            Arc::new(ExternalAgent::new("blue")),
        );
        let (engine, handle) =
            MatchEngine::new(id.clone(), valid(GameType::Auction, 1, 1), agents, hub.clone(), settings());
        let task = engine.spawn();

        let mut rx = hub.subscribe();
        // Wait for the round to open
        while let Some(msg) = crate::hub::next_event(&mut rx).await {
            if let crate::hub::Broadcast::Event(env) = msg {
                if matches!(env.event, MatchEvent::ThinkingStart { agent: Side::Blue }) {
                    break;
                }
            }
        }

        let bad = handle
            .submit_move(Side::Red, Move::negotiation(NegotiationMoveKind::Reject, 0))
            .await;
        assert!(matches!(bad, Err(EngineError::InvalidMove { .. })));
        assert_eq!(handle.submit_vote(Side::Red).await.unwrap(), 1);
        handle
            .submit_move(Side::Red, Move::auction(AuctionMoveKind::Bid, 1))
            .await
            .unwrap();
        assert!(matches!(
            handle.submit_move(Side::Red, Move::auction(AuctionMoveKind::Bid, 5)).await,
            Err(EngineError::DoubleCommit { .. })
        ));
        handle
            .submit_move(Side::Blue, Move::auction(AuctionMoveKind::Pass, 0))
            .await
            .unwrap();

        let summary = task.await.unwrap();
        assert_eq!(summary.winner, Some(Side::Red));
        assert_eq!(summary.audience.total_voted, 1);
        assert_eq!(summary.audience.total_correct, 1);
        assert_eq!(summary.degraded_rounds, 0);

        // Finished matches refuse further input
        assert!(matches!(
            handle.submit_move(Side::Red, Move::auction(AuctionMoveKind::Pass, 0)).await,
            Err(EngineError::TerminalStateViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_abort_ends_cancelled() {
        let hub = Arc::new(BroadcastHub::new(256));
        let id = MatchId::from("match_abort");
        let agents: PerSide<Arc<dyn Agent>> = PerSide::new(
            Arc::new(ExternalAgent::new("red")),
            Arc::new(ExternalAgent::new("blue")),
        );
        let (engine, handle) =
            MatchEngine::new(id.clone(), valid(GameType::Negotiation, 5, 2), agents, hub.clone(), settings());
        handle.abort().unwrap();
        let summary = engine.run().await;
        assert!(summary.cancelled);
        assert_eq!(summary.winner, None);

        let log = events(&hub, &id).await;
        assert!(matches!(
            log.last(),
            Some(MatchEvent::MatchEnd { cancelled: true, winner: None, .. })
        ));
        assert!(!log.iter().any(|e| matches!(e, MatchEvent::Collapse { .. })));
        assert!(handle.abort().is_err());
    }

    #[tokio::test]
    async fn test_same_seed_same_log() {
        let mut logs = Vec::new();
        for _ in 0..2 {
            let hub = Arc::new(BroadcastHub::new(256));
            let id = MatchId::from("match_det");
            let (engine, _handle) = MatchEngine::new(
                id.clone(),
                valid(GameType::Negotiation, 6, 77),
                personalities(77),
                hub.clone(),
                settings(),
            );
            engine.run().await;
            let moves: Vec<_> = events(&hub, &id)
                .await
                .into_iter()
                .filter_map(|e| match e {
                    MatchEvent::Collapse { red_move, blue_move, resolution, .. } => {
                        Some((red_move, blue_move, resolution.winner))
                    }
                    _ => None,
                })
                .collect();
            logs.push(moves);
        }
        assert_eq!(logs[0], logs[1]);
    }
}
