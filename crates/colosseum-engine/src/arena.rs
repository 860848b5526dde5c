//! All matches the process is running, addressed by id
//!
//! The arena is the control surface a transport would sit on: start a
//! match, feed it moves, predictions and votes, abort it, and read back its
//! summary or replay.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use colosseum_logic::{Move, PerSide, Personality, Prediction, ReplayOutcome, Seal, Side};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::agent::{Agent, PersonalityAgent};
use crate::config::{EngineConfig, MatchConfig, ValidMatchConfig};
use crate::engine::{random_seed, EngineSettings, MatchEngine, MatchHandle};
use crate::error::{EngineError, Result};
use crate::hub::BroadcastHub;
use crate::state::{MatchId, MatchSummary};
use crate::stats::{self, AgentStats};

#[derive(Default)]
struct Registry {
    handles: HashMap<MatchId, MatchHandle>,
    // Oldest first
    order: VecDeque<MatchId>,
}

pub struct Arena {
    config: EngineConfig,
    hub: Arc<BroadcastHub>,
    registry: RwLock<Registry>,
}

impl Arena {
    pub fn new(config: EngineConfig, hub: Arc<BroadcastHub>) -> Self {
        Self {
            config,
            hub,
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate `config` and start a match between two built-in agents
    pub async fn start_match(&self, config: &MatchConfig) -> Result<MatchHandle> {
        let mut valid = config.validate()?;
        // Agents draw from their own side's stream of the match seed
        let seed = *valid.seed.get_or_insert_with(random_seed);
        let agents: PerSide<Arc<dyn Agent>> = PerSide::new(
            Arc::new(PersonalityAgent::new(valid.red, seed)),
            Arc::new(PersonalityAgent::new(valid.blue, seed)),
        );
        self.start_match_with_agents(valid, agents).await
    }

    /// Start a match with caller-supplied agents
    pub async fn start_match_with_agents(
        &self,
        config: ValidMatchConfig,
        agents: PerSide<Arc<dyn Agent>>,
    ) -> Result<MatchHandle> {
        self.config.validate()?;
        let id = MatchId::generate();

        let mut registry = self.registry.write().await;
        self.make_room(&mut registry).await?;

        let (engine, handle) = MatchEngine::new(
            id.clone(),
            config,
            agents,
            self.hub.clone(),
            EngineSettings::from(&self.config),
        );
        registry.handles.insert(id.clone(), handle.clone());
        registry.order.push_back(id.clone());
        drop(registry);

        info!(match_id = %id, game = %config.game_type, rounds = config.total_rounds, "match registered");
        engine.spawn();
        Ok(handle)
    }

    /// Drop the oldest finished match when at capacity
    async fn make_room(&self, registry: &mut Registry) -> Result<()> {
        if registry.handles.len() < self.config.max_matches {
            return Ok(());
        }
        let finished = registry
            .order
            .iter()
            .position(|id| registry.handles.get(id).is_some_and(|h| h.is_finished()));
        let Some(pos) = finished else {
            return Err(EngineError::ArenaFull(registry.handles.len()));
        };
        if let Some(id) = registry.order.remove(pos) {
            registry.handles.remove(&id);
            self.hub.log().remove(&id).await;
            debug!(match_id = %id, "evicted finished match");
        }
        Ok(())
    }

    pub async fn handle(&self, match_id: &MatchId) -> Result<MatchHandle> {
        self.registry
            .read()
            .await
            .handles
            .get(match_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownMatch(match_id.clone()))
    }

    pub async fn submit_move(&self, match_id: &MatchId, side: Side, mv: Move) -> Result<Seal> {
        self.handle(match_id).await?.submit_move(side, mv).await
    }

    pub async fn submit_prediction(
        &self,
        match_id: &MatchId,
        side: Side,
        prediction: Prediction,
    ) -> Result<u32> {
        self.handle(match_id)
            .await?
            .submit_prediction(side, prediction)
            .await
    }

    /// `round` defaults to the open round
    pub async fn submit_audience_vote(
        &self,
        match_id: &MatchId,
        voted_for: Side,
        round: Option<u32>,
    ) -> Result<u32> {
        let handle = self.handle(match_id).await?;
        match round {
            Some(round) => handle.submit_vote_for(round, voted_for).await,
            None => handle.submit_vote(voted_for).await,
        }
    }

    pub async fn abort_match(&self, match_id: &MatchId) -> Result<()> {
        self.handle(match_id).await?.abort()
    }

    pub async fn summary(&self, match_id: &MatchId) -> Result<MatchSummary> {
        Ok(self.handle(match_id).await?.summary())
    }

    pub async fn list(&self) -> Vec<MatchSummary> {
        let registry = self.registry.read().await;
        registry
            .order
            .iter()
            .filter_map(|id| registry.handles.get(id))
            .map(MatchHandle::summary)
            .collect()
    }

    /// Record of `personality` over the finished matches still held here
    pub async fn agent_stats(&self, personality: Personality) -> AgentStats {
        stats::agent_stats(personality, &self.list().await)
    }

    pub async fn leaderboard(&self) -> Vec<AgentStats> {
        stats::leaderboard(&self.list().await)
    }

    pub async fn replay(&self, match_id: &MatchId) -> Result<ReplayOutcome> {
        self.hub.log().replay(match_id).await
    }

    /// Block until the match ends
    pub async fn wait(&self, match_id: &MatchId) -> Result<MatchSummary> {
        Ok(self.handle(match_id).await?.wait().await)
    }

    /// Abort every live match and wait for all of them to end
    pub async fn shutdown(&self) -> Vec<MatchSummary> {
        let handles: Vec<MatchHandle> = self.registry.read().await.handles.values().cloned().collect();
        for handle in handles.iter().filter(|h| !h.is_finished()) {
            // Already gone is fine
            let _ = handle.abort();
        }
        futures::future::join_all(handles.iter().map(|h| h.wait())).await
    }

    /// Ping subscribers at the configured interval until the task is dropped
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = self.hub.clone();
        let every = self.config.heartbeat_interval();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately
            tick.tick().await;
            loop {
                tick.tick().await;
                hub.ping();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ExternalAgent;
    use crate::hub::{next_event, Broadcast};
    use colosseum_logic::{GameType, Personality};
    use std::time::Duration;

    fn arena(max_matches: usize) -> Arena {
        let config = EngineConfig {
            max_matches,
            thinking_deadline_ms: 1_000,
            heartbeat_interval_ms: 50,
            ..EngineConfig::default()
        };
        Arena::new(config, Arc::new(BroadcastHub::new(1024)))
    }

    fn external() -> PerSide<Arc<dyn Agent>> {
        PerSide::new(
            Arc::new(ExternalAgent::new("red")),
            Arc::new(ExternalAgent::new("blue")),
        )
    }

    fn valid(rounds: u32) -> ValidMatchConfig {
        MatchConfig::new(GameType::Auction, Personality::Aggressive, Personality::Defensive, rounds)
            .with_seed(4)
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_and_wait() {
        let arena = arena(4);
        let config = MatchConfig::new(
            GameType::ResourceWars,
            Personality::Chaotic,
            Personality::Defensive,
            2,
        )
        .with_seed(31);
        let handle = arena.start_match(&config).await.unwrap();
        let summary = arena.wait(handle.id()).await.unwrap();
        assert!(summary.is_finished());
        assert_eq!(summary.current_round, 2);

        let outcome = arena.replay(handle.id()).await.unwrap();
        assert_eq!(outcome.scores, summary.scores);
        assert_eq!(outcome.winner, summary.winner);
    }

    #[tokio::test]
    async fn test_invalid_config_starts_nothing() {
        let arena = arena(4);
        let mut config = MatchConfig::new(GameType::Auction, Personality::Aggressive, Personality::Adaptive, 3);
        config.game_type = "poker".to_string();
        assert!(matches!(
            arena.start_match(&config).await,
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(arena.list().await.is_empty());
        assert!(arena.hub().log().matches().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_match() {
        let arena = arena(4);
        let id = MatchId::from("match_nope");
        assert!(matches!(
            arena.abort_match(&id).await,
            Err(EngineError::UnknownMatch(_))
        ));
    }

    #[tokio::test]
    async fn test_full_arena_evicts_finished_only() {
        let arena = arena(1);
        let first = arena.start_match_with_agents(valid(1), external()).await.unwrap();
        assert!(matches!(
            arena.start_match_with_agents(valid(1), external()).await,
            Err(EngineError::ArenaFull(1))
        ));

        arena.abort_match(first.id()).await.unwrap();
        arena.wait(first.id()).await.unwrap();
        let second = arena.start_match_with_agents(valid(1), external()).await.unwrap();
        assert!(matches!(
            arena.summary(first.id()).await,
            Err(EngineError::UnknownMatch(_))
        ));
        arena.abort_match(second.id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_vote_rejected() {
        let arena = arena(4);
        let handle = arena.start_match_with_agents(valid(2), external()).await.unwrap();
        let mut rx = arena.hub().subscribe();
        while let Some(msg) = next_event(&mut rx).await {
            if let Broadcast::Event(env) = msg {
                if matches!(env.event, colosseum_logic::MatchEvent::RoundStart { .. }) {
                    break;
                }
            }
        }
        assert_eq!(
            arena.submit_audience_vote(handle.id(), Side::Blue, None).await.unwrap(),
            1
        );
        assert!(matches!(
            arena.submit_audience_vote(handle.id(), Side::Blue, Some(0)).await,
            Err(EngineError::StaleVote(_))
        ));
        arena.abort_match(handle.id()).await.unwrap();
        let summary = arena.wait(handle.id()).await.unwrap();
        assert!(summary.cancelled);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_live_matches() {
        let arena = arena(4);
        arena.start_match_with_agents(valid(3), external()).await.unwrap();
        arena.start_match_with_agents(valid(3), external()).await.unwrap();
        let summaries = arena.shutdown().await;
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.is_finished() && s.cancelled));
    }

    #[tokio::test]
    async fn test_stats_follow_finished_matches() {
        let arena = arena(8);
        for seed in [1, 2, 3] {
            let config = MatchConfig::new(GameType::ResourceWars, Personality::Aggressive, Personality::Defensive, 3)
                .with_seed(seed);
            let handle = arena.start_match(&config).await.unwrap();
            arena.wait(handle.id()).await.unwrap();
        }
        // A cancelled match does not count
        let live = arena.start_match_with_agents(valid(2), external()).await.unwrap();
        arena.abort_match(live.id()).await.unwrap();
        arena.wait(live.id()).await.unwrap();

        let summaries = arena.list().await;
        let aggressive = arena.agent_stats(Personality::Aggressive).await;
        assert_eq!(aggressive.total_matches, 3);
        let red_wins = summaries.iter().filter(|s| s.winner == Some(Side::Red)).count() as u32;
        assert_eq!(aggressive.wins, red_wins);
        assert!((0.0..=1.0).contains(&aggressive.avg_accuracy));
        assert_eq!(arena.agent_stats(Personality::Chaotic).await.total_matches, 0);

        let board = arena.leaderboard().await;
        assert_eq!(board.len(), 2);
        assert!(board[0].win_rate >= board[1].win_rate);
        assert_eq!(board.iter().map(|s| s.total_matches).sum::<u32>(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings() {
        let arena = Arc::new(arena(4));
        let mut rx = arena.hub().subscribe();
        let beat = arena.spawn_heartbeat();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(matches!(rx.try_recv(), Ok(Broadcast::Ping(_))));
        beat.abort();
    }
}
