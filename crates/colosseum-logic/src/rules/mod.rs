//! Game rules: the closed set of rule-sets a match can be played under
//!
//! A [`GameState`] is never mutated in place by callers. [`GameState::resolve`]
//! checks both moves, clones the state, applies the pair and hands back the
//! new state together with the round's [`Resolution`].

pub mod auction;
pub mod negotiation;
pub mod resource_wars;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::moves::{GameType, Move, Resource};
use crate::side::{PerSide, Side};

pub use auction::{AuctionItem, AuctionState, WonItem};
pub use negotiation::NegotiationState;
pub use resource_wars::ResourceWarsState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("{side} move '{mv}' is not legal in the current state")]
    IllegalMove { side: Side, mv: Move },

    #[error("expected a {expected} move, got a {found} move")]
    WrongGame { expected: GameType, found: GameType },

    #[error("game is already over")]
    Terminal,
}

/// Outcome of resolving one pair of moves
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub winner: Option<Side>,
    /// Resource id (pool name, "deal", item name) to per-side delta
    pub resource_changes: BTreeMap<String, PerSide<i64>>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_price: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_bid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<u32>,
}

/// The game as one side is allowed to see it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideView {
    pub side: Side,
    pub game_type: GameType,
    pub round: u32,
    pub total_rounds: u32,
    pub scores: PerSide<i64>,
    pub board: Board,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum Board {
    #[serde(rename_all = "camelCase")]
    ResourceWars {
        pools: BTreeMap<Resource, u32>,
        economy_bonus: PerSide<u32>,
    },
    #[serde(rename_all = "camelCase")]
    Negotiation {
        current_offer: Option<u32>,
        offer_by: Option<Side>,
        standing_offers: PerSide<Option<u32>>,
        my_walkaway: u32,
        bluffs_used: PerSide<u32>,
    },
    #[serde(rename_all = "camelCase")]
    Auction {
        item: Option<ItemView>,
        credits: PerSide<u32>,
        items_remaining: u32,
        upcoming: Vec<ItemView>,
    },
}

/// An auction item with at most the viewer's own valuation attached
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub name: String,
    pub base_value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_valuation: Option<i64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameState {
    ResourceWars(ResourceWarsState),
    Negotiation(NegotiationState),
    Auction(AuctionState),
}

impl GameState {
    /// Fresh state for a match. Hidden values (walkaways, valuations) are
    /// drawn from `seed`, so the same seed always yields the same game.
    pub fn new(game_type: GameType, total_rounds: u32, seed: u64) -> Self {
        match game_type {
            GameType::ResourceWars => GameState::ResourceWars(ResourceWarsState::new(total_rounds)),
            GameType::Negotiation => {
                GameState::Negotiation(NegotiationState::new(total_rounds, seed))
            }
            GameType::Auction => GameState::Auction(AuctionState::new(total_rounds, seed)),
        }
    }

    pub fn game_type(&self) -> GameType {
        match self {
            GameState::ResourceWars(_) => GameType::ResourceWars,
            GameState::Negotiation(_) => GameType::Negotiation,
            GameState::Auction(_) => GameType::Auction,
        }
    }

    pub fn rounds_played(&self) -> u32 {
        match self {
            GameState::ResourceWars(s) => s.rounds_played,
            GameState::Negotiation(s) => s.rounds_played,
            GameState::Auction(s) => s.rounds_played,
        }
    }

    pub fn total_rounds(&self) -> u32 {
        match self {
            GameState::ResourceWars(s) => s.total_rounds,
            GameState::Negotiation(s) => s.total_rounds,
            GameState::Auction(s) => s.total_rounds,
        }
    }

    pub fn scores(&self) -> PerSide<i64> {
        match self {
            GameState::ResourceWars(s) => s.scores,
            GameState::Negotiation(s) => s.scores,
            GameState::Auction(s) => s.scores,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            GameState::ResourceWars(s) => s.is_terminal(),
            GameState::Negotiation(s) => s.is_terminal(),
            GameState::Auction(s) => s.is_terminal(),
        }
    }

    /// Every move `side` may commit right now. Empty once the game is over.
    pub fn legal_moves(&self, side: Side) -> Vec<Move> {
        if self.is_terminal() {
            return Vec::new();
        }
        match self {
            GameState::ResourceWars(s) => s.legal_moves(),
            GameState::Negotiation(s) => s.legal_moves(),
            GameState::Auction(s) => s.legal_moves(side),
        }
    }

    pub fn is_legal(&self, side: Side, mv: &Move) -> bool {
        self.check_move(side, mv).is_ok()
    }

    pub fn check_move(&self, side: Side, mv: &Move) -> Result<(), RulesError> {
        if self.is_terminal() {
            return Err(RulesError::Terminal);
        }
        if mv.game_type() != self.game_type() {
            return Err(RulesError::WrongGame {
                expected: self.game_type(),
                found: mv.game_type(),
            });
        }
        let legal = match self {
            GameState::ResourceWars(s) => s.is_legal(mv),
            GameState::Negotiation(s) => s.is_legal(mv),
            GameState::Auction(s) => s.is_legal(side, mv),
        };
        if legal {
            Ok(())
        } else {
            Err(RulesError::IllegalMove { side, mv: *mv })
        }
    }

    /// Move substituted for a side that did not commit in time
    pub fn fallback_move(&self) -> Move {
        match self {
            GameState::ResourceWars(_) => ResourceWarsState::fallback(),
            GameState::Negotiation(_) => NegotiationState::fallback(),
            GameState::Auction(_) => AuctionState::fallback(),
        }
    }

    /// Resolve one round. `self` is left untouched.
    pub fn resolve(&self, red: &Move, blue: &Move) -> Result<(GameState, Resolution), RulesError> {
        self.check_move(Side::Red, red)?;
        self.check_move(Side::Blue, blue)?;

        let wrong = |found: &Move| RulesError::WrongGame {
            expected: self.game_type(),
            found: found.game_type(),
        };

        let mut next = self.clone();
        let resolution = match &mut next {
            GameState::ResourceWars(s) => {
                let r = red.as_resource().ok_or_else(|| wrong(red))?;
                let b = blue.as_resource().ok_or_else(|| wrong(blue))?;
                s.apply(PerSide::new(r, b))
            }
            GameState::Negotiation(s) => {
                let r = red.as_negotiation().ok_or_else(|| wrong(red))?;
                let b = blue.as_negotiation().ok_or_else(|| wrong(blue))?;
                s.apply(PerSide::new(r, b))
            }
            GameState::Auction(s) => {
                let r = red.as_auction().ok_or_else(|| wrong(red))?;
                let b = blue.as_auction().ok_or_else(|| wrong(blue))?;
                s.apply(PerSide::new(r, b))
            }
        };
        Ok((next, resolution))
    }

    /// Match winner on the current scores; `None` is a draw
    pub fn winner(&self) -> Option<Side> {
        if let GameState::Negotiation(s) = self {
            if s.deal_price.is_none() {
                return None;
            }
        }
        let scores = self.scores();
        if scores.red > scores.blue {
            Some(Side::Red)
        } else if scores.blue > scores.red {
            Some(Side::Blue)
        } else {
            None
        }
    }

    /// Public snapshot for observers. Never contains hidden per-side values.
    pub fn snapshot(&self) -> serde_json::Value {
        match self {
            GameState::ResourceWars(s) => s.snapshot(),
            GameState::Negotiation(s) => s.snapshot(),
            GameState::Auction(s) => s.snapshot(),
        }
    }

    /// What `side` may see: the public state plus its own secrets
    pub fn view_for(&self, side: Side) -> SideView {
        let board = match self {
            GameState::ResourceWars(s) => s.board(),
            GameState::Negotiation(s) => s.board(side),
            GameState::Auction(s) => s.board(side),
        };
        SideView {
            side,
            game_type: self.game_type(),
            round: self.rounds_played() + 1,
            total_rounds: self.total_rounds(),
            scores: self.scores(),
            board,
        }
    }
}

pub(crate) fn round_winner(delta: PerSide<i64>) -> Option<Side> {
    if delta.red > delta.blue {
        Some(Side::Red)
    } else if delta.blue > delta.red {
        Some(Side::Blue)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::{AuctionMoveKind, NegotiationMoveKind, ResourceMoveKind};
    use proptest::prelude::*;

    #[test]
    fn test_wrong_game_rejected() {
        let state = GameState::new(GameType::ResourceWars, 3, 1);
        let mv = Move::auction(AuctionMoveKind::Pass, 0);
        assert_eq!(
            state.check_move(Side::Red, &mv),
            Err(RulesError::WrongGame {
                expected: GameType::ResourceWars,
                found: GameType::Auction
            })
        );
    }

    #[test]
    fn test_resolve_leaves_input_untouched() {
        let state = GameState::new(GameType::ResourceWars, 3, 1);
        let red = Move::resource(ResourceMoveKind::AggressiveBid, Resource::A, 80);
        let blue = Move::resource(ResourceMoveKind::Retreat, Resource::C, 50);
        let (next, resolution) = state.resolve(&red, &blue).unwrap();
        assert_eq!(state.rounds_played(), 0);
        assert_eq!(state.scores(), PerSide::new(0, 0));
        assert_eq!(next.rounds_played(), 1);
        assert_eq!(resolution.winner, Some(Side::Red));
    }

    #[test]
    fn test_terminal_state_refuses_moves() {
        let mut state = GameState::new(GameType::Negotiation, 1, 9);
        let pass = Move::negotiation(NegotiationMoveKind::Reject, 0);
        state = state.resolve(&pass, &pass).unwrap().0;
        assert!(state.is_terminal());
        assert!(state.legal_moves(Side::Red).is_empty());
        assert_eq!(state.resolve(&pass, &pass).unwrap_err(), RulesError::Terminal);
    }

    #[test]
    fn test_fallbacks_are_legal() {
        for game in GameType::ALL {
            let state = GameState::new(game, game.default_rounds(), 77);
            let fallback = state.fallback_move();
            for side in Side::BOTH {
                assert!(state.is_legal(side, &fallback), "{} fallback", game);
            }
        }
    }

    #[test]
    fn test_snapshot_hides_secrets() {
        let negotiation = GameState::new(GameType::Negotiation, 5, 3);
        let text = negotiation.snapshot().to_string();
        assert!(!text.contains("alkaway\":"), "{}", text);

        let auction = GameState::new(GameType::Auction, 8, 3);
        let text = auction.snapshot().to_string();
        assert!(!text.to_lowercase().contains("valuation"), "{}", text);
    }

    #[test]
    fn test_view_shows_only_own_secret() {
        let state = GameState::new(GameType::Negotiation, 5, 21);
        let GameState::Negotiation(inner) = &state else {
            panic!("expected negotiation");
        };
        let red = state.view_for(Side::Red);
        let blue = state.view_for(Side::Blue);
        match (red.board, blue.board) {
            (
                Board::Negotiation { my_walkaway: r, .. },
                Board::Negotiation { my_walkaway: b, .. },
            ) => {
                assert_eq!(r, inner.walkaway.red);
                assert_eq!(b, inner.walkaway.blue);
            }
            other => panic!("unexpected boards {:?}", other),
        }
    }

    fn game_strategy() -> impl Strategy<Value = GameType> {
        prop_oneof![
            Just(GameType::ResourceWars),
            Just(GameType::Negotiation),
            Just(GameType::Auction),
        ]
    }

    proptest! {
        #[test]
        fn prop_random_legal_play_stays_consistent(
            game in game_strategy(),
            seed in any::<u64>(),
            rounds in 1u32..12,
            picks in proptest::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 12),
        ) {
            let mut state = GameState::new(game, rounds, seed);
            let mut played = 0;
            for (ri, bi) in picks {
                if state.is_terminal() {
                    break;
                }
                let red_moves = state.legal_moves(Side::Red);
                let blue_moves = state.legal_moves(Side::Blue);
                prop_assert!(!red_moves.is_empty() && !blue_moves.is_empty());
                let red = *ri.get(&red_moves);
                let blue = *bi.get(&blue_moves);
                let (next, _) = state.resolve(&red, &blue).unwrap();
                prop_assert_eq!(next.rounds_played(), state.rounds_played() + 1);
                state = next;
                played += 1;
            }
            prop_assert!(played <= rounds);
            prop_assert!(state.rounds_played() <= state.total_rounds());
        }
    }
}
