//! Agent Colosseum match engine
//!
//! Runs timed, simultaneous-move matches between two agents on top of the
//! rules in `colosseum-logic`, and streams every step as an ordered event
//! log that can be replayed to the same outcome.

pub mod agent;
pub mod arena;
pub mod barrier;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod logging;
pub mod state;
pub mod stats;

pub use agent::{Agent, AgentTurn, ExternalAgent, PersonalityAgent, ScriptedAgent, ScriptedTurn, TurnContext};
pub use arena::Arena;
pub use barrier::{BarrierOutcome, CommitBarrier, Commitment, StreamedPrediction};
pub use config::{EngineConfig, LoggingConfig, MatchConfig, ValidMatchConfig};
pub use engine::{EngineSettings, MatchEngine, MatchHandle};
pub use error::{EngineError, Result};
pub use hub::{read_jsonl, Broadcast, BroadcastHub, EventContext, EventEnvelope, EventSink, JsonlSink, ReplayLog};
pub use state::{MatchId, MatchRecord, MatchSummary};
pub use stats::AgentStats;
