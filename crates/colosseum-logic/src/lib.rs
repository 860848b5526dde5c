//! Colosseum core logic
//!
//! Deterministic rules and bookkeeping for two-agent, simultaneous-move
//! matches. Nothing here does I/O or waits on anything: the engine crate
//! drives these types round by round.

mod moves;
mod phase;
mod poll;
mod prediction;
mod random;
mod seal;
mod side;

pub mod event;
pub mod personality;
pub mod replay;
pub mod rules;

pub use event::{AgentInfo, MatchEvent};
pub use moves::{AuctionMoveKind, GameType, Move, NegotiationMoveKind, Resource, ResourceMoveKind};
pub use personality::{plan_turn, Personality, TurnPlan};
pub use phase::Phase;
pub use poll::{AudiencePoll, AudienceVote, PollError, PollTally};
pub use prediction::{score_predictions, AccuracyTally, Prediction, RoundScore};
pub use random::{seed_from_str, stream, SeededRng};
pub use replay::{replay, ReplayError, ReplayOutcome};
pub use rules::{Board, GameState, ItemView, Resolution, RulesError, SideView};
pub use seal::{seal_move, Salt, Seal, SALT_LEN};
pub use side::{PerSide, Side};
