//! Resource Wars: both sides contest three shared pools
//!
//! Each move turns a budget allocation into power on one or more pools. The
//! stronger side on a pool captures part of it; captured units are score.

use std::collections::BTreeMap;

use serde_json::json;

use super::{round_winner, Board, Resolution};
use crate::moves::{Move, Resource, ResourceMoveKind};
use crate::side::{PerSide, Side};

/// Per-round allocation ceiling
pub const BUDGET: u32 = 100;
pub const STARTING_POOL: u32 = 100;
/// Smallest capture a winning side takes from a non-empty pool
pub const MIN_CAPTURE: u32 = 5;

type Claim = (ResourceMoveKind, Resource, u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceWarsState {
    pub pools: [u32; 3],
    /// Compounding bonus earned by retreating
    pub economy_bonus: PerSide<u32>,
    pub scores: PerSide<i64>,
    pub rounds_played: u32,
    pub total_rounds: u32,
}

impl ResourceWarsState {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            pools: [STARTING_POOL; 3],
            economy_bonus: PerSide::default(),
            scores: PerSide::default(),
            rounds_played: 0,
            total_rounds,
        }
    }

    pub fn pool(&self, resource: Resource) -> u32 {
        self.pools[resource.index()]
    }

    pub fn is_terminal(&self) -> bool {
        self.rounds_played >= self.total_rounds || self.pools.iter().all(|p| *p == 0)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(ResourceMoveKind::ALL.len() * 3 * (BUDGET as usize + 1));
        for kind in ResourceMoveKind::ALL {
            for target in Resource::ALL {
                for amount in 0..=BUDGET {
                    moves.push(Move::resource(kind, target, amount));
                }
            }
        }
        moves
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        matches!(mv.as_resource(), Some((_, _, amount)) if amount <= BUDGET)
    }

    pub fn fallback() -> Move {
        Move::resource(ResourceMoveKind::DefensiveSpread, Resource::A, 60)
    }

    pub(crate) fn apply(&mut self, claims: PerSide<Claim>) -> Resolution {
        // Retreats pay out before power is computed
        for side in Side::BOTH {
            let (kind, _, amount) = claims[side];
            if kind == ResourceMoveKind::Retreat {
                self.economy_bonus[side] += amount / 10;
            }
        }

        let power = claims.map(|side, claim| power_of(claim, self.economy_bonus[side]));

        let mut changes = BTreeMap::new();
        let mut delta = PerSide::<i64>::default();
        for resource in Resource::ALL {
            let i = resource.index();
            let (red, blue) = (power.red[i], power.blue[i]);
            if red == 0 && blue == 0 {
                continue;
            }
            let mut change = PerSide::<i64>::default();
            if red != blue {
                let taker = if red > blue { Side::Red } else { Side::Blue };
                let diff = red.abs_diff(blue);
                let capture = self.pools[i].min(MIN_CAPTURE.max(diff / 2));
                self.pools[i] -= capture;
                change[taker] = capture as i64;
                delta[taker] += capture as i64;
            }
            changes.insert(resource.as_str().to_string(), change);
        }

        self.scores.red += delta.red;
        self.scores.blue += delta.blue;
        self.rounds_played += 1;

        let winner = round_winner(delta);
        let describe = |(kind, target, amount): Claim| {
            format!("{} on {} ({})", kind.as_str(), target.as_str(), amount)
        };
        let verdict = match winner {
            Some(side) => format!("{} wins the round.", side),
            None => "Round is a draw.".to_string(),
        };
        Resolution {
            winner,
            resource_changes: changes,
            description: format!(
                "Red played {}, blue played {}. {}",
                describe(claims.red),
                describe(claims.blue),
                verdict
            ),
            ..Resolution::default()
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "game": "resource_wars",
            "resources": {
                "A": self.pools[0],
                "B": self.pools[1],
                "C": self.pools[2],
            },
            "economyBonus": self.economy_bonus,
            "scores": self.scores,
            "round": self.rounds_played,
            "totalRounds": self.total_rounds,
        })
    }

    pub(crate) fn board(&self) -> Board {
        Board::ResourceWars {
            pools: Resource::ALL
                .iter()
                .map(|r| (*r, self.pool(*r)))
                .collect(),
            economy_bonus: self.economy_bonus,
        }
    }
}

/// Power a claim puts on each pool
fn power_of((kind, target, amount): Claim, economy: u32) -> [u32; 3] {
    let mut power = [0u32; 3];
    let t = target.index();
    match kind {
        ResourceMoveKind::AggressiveBid => power[t] += amount + economy,
        ResourceMoveKind::DefensiveSpread => {
            let each = (amount + economy) / 3;
            for p in power.iter_mut() {
                *p += each;
            }
        }
        ResourceMoveKind::Bluff => power[t] += amount / 4 + economy,
        ResourceMoveKind::Counter => power[t] += (amount + economy) * 3 / 2,
        ResourceMoveKind::Retreat => {}
    }
    power
}
