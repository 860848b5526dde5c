//! Rebuild a match from its event log
//!
//! Replay starts from a fresh [`GameState`] built from the logged
//! `match_start`, checks every revealed move against the seal published in
//! `thinking_end`, and re-resolves each round. Any disagreement with the log
//! is an error rather than a silently different outcome.

use thiserror::Error;

use crate::event::MatchEvent;
use crate::moves::{GameType, Move};
use crate::rules::{GameState, RulesError};
use crate::seal::Seal;
use crate::side::{PerSide, Side};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("log does not begin with match_start")]
    MissingStart,

    #[error("second match_start in one log")]
    DuplicateStart,

    #[error("{event} after match_end")]
    AfterEnd { event: &'static str },

    #[error("round {round}: {side} move revealed without a prior seal")]
    UnsealedMove { round: u32, side: Side },

    #[error("round {round}: {side} move does not match its seal")]
    SealMismatch { round: u32, side: Side },

    #[error("round {round}: replayed {what} differs from the log")]
    Diverged { round: u32, what: &'static str },

    #[error(transparent)]
    Rules(#[from] RulesError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReplayOutcome {
    pub match_id: String,
    pub game_type: GameType,
    pub scores: PerSide<i64>,
    pub winner: Option<Side>,
    pub rounds: u32,
    pub cancelled: bool,
    pub moves: Vec<PerSide<Move>>,
    pub final_state: GameState,
}

/// Fold a match's events, in log order, into its outcome
pub fn replay<'a>(events: impl IntoIterator<Item = &'a MatchEvent>) -> Result<ReplayOutcome, ReplayError> {
    let mut events = events.into_iter().filter(|e| !matches!(e, MatchEvent::Ping {}));

    let (match_id, mut state) = match events.next() {
        Some(MatchEvent::MatchStart {
            match_id,
            game_type,
            total_rounds,
            seed,
            ..
        }) => (match_id.clone(), GameState::new(*game_type, *total_rounds, *seed)),
        _ => return Err(ReplayError::MissingStart),
    };

    let mut seals: PerSide<Option<Seal>> = PerSide::default();
    let mut moves = Vec::new();
    let mut ended: Option<bool> = None;

    for event in events {
        if ended.is_some() {
            return Err(ReplayError::AfterEnd {
                event: event.type_name(),
            });
        }
        let round = state.rounds_played() + 1;
        match event {
            MatchEvent::MatchStart { .. } => return Err(ReplayError::DuplicateStart),
            MatchEvent::ThinkingEnd {
                agent, chosen_move, ..
            } => seals[*agent] = Some(*chosen_move),
            MatchEvent::Collapse {
                red_move,
                blue_move,
                reveal,
                resolution,
                ..
            } => {
                let revealed = PerSide::new(*red_move, *blue_move);
                for side in Side::BOTH {
                    let seal = seals[side]
                        .take()
                        .ok_or(ReplayError::UnsealedMove { round, side })?;
                    if !seal.verify(&revealed[side], &reveal[side]) {
                        return Err(ReplayError::SealMismatch { round, side });
                    }
                }
                let (next, replayed) = state.resolve(red_move, blue_move)?;
                if replayed.winner != resolution.winner
                    || replayed.resource_changes != resolution.resource_changes
                {
                    return Err(ReplayError::Diverged {
                        round,
                        what: "resolution",
                    });
                }
                state = next;
                moves.push(revealed);
            }
            MatchEvent::RoundEnd { round, scores, .. } => {
                if *scores != state.scores() {
                    return Err(ReplayError::Diverged {
                        round: *round,
                        what: "scores",
                    });
                }
            }
            MatchEvent::MatchEnd {
                winner,
                final_scores,
                cancelled,
                ..
            } => {
                if *final_scores != state.scores() {
                    return Err(ReplayError::Diverged {
                        round: state.rounds_played(),
                        what: "final scores",
                    });
                }
                let expected = if *cancelled { None } else { state.winner() };
                if *winner != expected {
                    return Err(ReplayError::Diverged {
                        round: state.rounds_played(),
                        what: "winner",
                    });
                }
                ended = Some(*cancelled);
            }
            MatchEvent::RoundStart { .. }
            | MatchEvent::ThinkingStart { .. }
            | MatchEvent::Prediction { .. }
            | MatchEvent::Ping {} => {}
        }
    }

    let cancelled = ended.unwrap_or(false);
    Ok(ReplayOutcome {
        match_id,
        game_type: state.game_type(),
        scores: state.scores(),
        winner: if cancelled { None } else { state.winner() },
        rounds: state.rounds_played(),
        cancelled,
        moves,
        final_state: state,
    })
}
