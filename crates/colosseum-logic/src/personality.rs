//! Built-in personality agents
//!
//! Seeded stand-ins for external reasoning agents. Each turn a personality
//! guesses the opponent's next move a few different ways, picks a counter to
//! each guess and commits one move. Everything it sees comes from its own
//! [`SideView`] plus the revealed move history.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::moves::{AuctionMoveKind, Move, NegotiationMoveKind, Resource, ResourceMoveKind};
use crate::prediction::Prediction;
use crate::random::SeededRng;
use crate::rules::{Board, SideView};
use crate::side::{PerSide, Side};

/// How many recent opponent moves feed the guesses
const MEMORY: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    /// Commits big and bluffs often
    Aggressive,
    /// Spreads, counters and holds out for safe deals
    Defensive,
    /// Plays the counter to its best guess whenever it can
    Adaptive,
    /// Close to uniform
    Chaotic,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Aggressive,
        Personality::Defensive,
        Personality::Adaptive,
        Personality::Chaotic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Aggressive => "aggressive",
            Personality::Defensive => "defensive",
            Personality::Adaptive => "adaptive",
            Personality::Chaotic => "chaotic",
        }
    }

    /// Risk appetite in [0, 1]
    pub fn risk(self) -> f64 {
        match self {
            Personality::Aggressive => 0.8,
            Personality::Defensive => 0.3,
            Personality::Adaptive => 0.5,
            Personality::Chaotic => 0.6,
        }
    }

    /// Chance of playing the counter to the top guess instead of a free pick
    fn follow_rate(self) -> f64 {
        match self {
            Personality::Aggressive => 0.5,
            Personality::Defensive => 0.5,
            Personality::Adaptive => 0.85,
            Personality::Chaotic => 0.2,
        }
    }

    fn resource_weights(self) -> [(ResourceMoveKind, u32); 5] {
        use ResourceMoveKind::*;
        let w = match self {
            Personality::Aggressive => [45, 10, 25, 10, 10],
            Personality::Defensive => [10, 40, 5, 35, 10],
            Personality::Adaptive => [25, 25, 15, 25, 10],
            Personality::Chaotic => [20, 15, 30, 15, 20],
        };
        [
            (AggressiveBid, w[0]),
            (DefensiveSpread, w[1]),
            (Bluff, w[2]),
            (Counter, w[3]),
            (Retreat, w[4]),
        ]
    }

    /// Weights when not accepting: propose, reject, counter_offer, bluff_walkaway
    fn negotiation_weights(self) -> [(NegotiationMoveKind, u32); 4] {
        use NegotiationMoveKind::*;
        let w = match self {
            Personality::Aggressive => [40, 15, 25, 20],
            Personality::Defensive => [30, 20, 45, 5],
            Personality::Adaptive => [35, 15, 40, 10],
            Personality::Chaotic => [25, 25, 25, 25],
        };
        [
            (Propose, w[0]),
            (Reject, w[1]),
            (CounterOffer, w[2]),
            (BluffWalkaway, w[3]),
        ]
    }

    fn auction_weights(self) -> [(AuctionMoveKind, u32); 3] {
        use AuctionMoveKind::*;
        let w = match self {
            Personality::Aggressive => [70, 10, 20],
            Personality::Defensive => [50, 40, 10],
            Personality::Adaptive => [65, 25, 10],
            Personality::Chaotic => [40, 25, 35],
        };
        [(Bid, w[0]), (Pass, w[1]), (BluffBid, w[2])]
    }

    /// Fraction of private valuation this personality is willing to bid
    fn bid_fraction(self, rng: &mut SeededRng) -> f64 {
        match self {
            Personality::Aggressive => 0.95,
            Personality::Defensive => 0.6,
            Personality::Adaptive => 0.8,
            Personality::Chaotic => 0.3 + rng.next_unit() * 0.9,
        }
    }

    /// Budget committed to a resource move
    fn commitment(self, rng: &mut SeededRng) -> u32 {
        let (lo, hi) = match self {
            Personality::Aggressive => (70, 100),
            Personality::Defensive => (40, 70),
            Personality::Adaptive => (50, 85),
            Personality::Chaotic => (0, 100),
        };
        rng.range_inclusive(lo, hi) as u32
    }

    /// Negotiation margin over the walkaway at the start of a match
    fn margin(self, rng: &mut SeededRng) -> u32 {
        match self {
            Personality::Aggressive => 30,
            Personality::Defensive => 10,
            Personality::Adaptive => 20,
            Personality::Chaotic => rng.range_inclusive(0, 40) as u32,
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Personality::Aggressive),
            "defensive" => Ok(Personality::Defensive),
            "adaptive" | "balanced" => Ok(Personality::Adaptive),
            "chaotic" | "random" => Ok(Personality::Chaotic),
            other => Err(format!("unknown personality: {}", other)),
        }
    }
}

/// Predictions in the order they were produced, and the move to commit
#[derive(Clone, Debug, PartialEq)]
pub struct TurnPlan {
    pub predictions: Vec<Prediction>,
    pub chosen: Move,
}

/// Plan one turn: `branching` guesses at the opponent's move, each with a
/// counter, then one committed move that is legal for `view`.
pub fn plan_turn(
    personality: Personality,
    view: &SideView,
    opponent_history: &[Move],
    branching: u32,
    rng: &mut SeededRng,
) -> TurnPlan {
    let recent = &opponent_history[opponent_history.len().saturating_sub(MEMORY)..];
    match &view.board {
        Board::ResourceWars { pools, .. } => {
            let pools = Resource::ALL.map(|r| pools.get(&r).copied().unwrap_or(0));
            plan_resource_wars(personality, pools, recent, branching, rng)
        }
        Board::Negotiation {
            current_offer,
            standing_offers,
            my_walkaway,
            ..
        } => {
            let table = Table {
                side: view.side,
                current_offer: *current_offer,
                standing: *standing_offers,
                walkaway: *my_walkaway,
                round: view.round,
                total_rounds: view.total_rounds,
            };
            plan_negotiation(personality, &table, recent, branching, rng)
        }
        Board::Auction { item, credits, .. } => {
            let lot = item.as_ref().map(|i| Lot {
                base_value: i.base_value,
                valuation: i.my_valuation.unwrap_or(i.base_value as i64),
            });
            plan_auction(personality, lot, credits[view.side], recent, branching, rng)
        }
    }
}

// ── Shared helpers ──

/// Confidences for `n` guesses: a leading guess, a runner-up, then a floor
fn confidences(n: usize, rng: &mut SeededRng) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    let mut used: f64 = 0.0;
    for i in 0..n {
        let c = match i {
            0 => 0.45 + rng.next_unit() * 0.25,
            1 => 0.15 + rng.next_unit() * 0.20,
            _ => (1.0 - used).max(0.05),
        };
        used += c;
        out.push(c);
    }
    out
}

/// Weight kinds by how often the opponent played them lately
fn observed_weights<K: Copy + PartialEq>(kinds: &[K], seen: impl Iterator<Item = K> + Clone) -> Vec<(K, u32)> {
    kinds
        .iter()
        .map(|k| (*k, 2 + 4 * seen.clone().filter(|s| s == k).count() as u32))
        .collect()
}

/// Up to `n` weighted picks, without repeats until the options run out
fn distinct_picks<K: Copy + PartialEq>(options: &[(K, u32)], n: usize, rng: &mut SeededRng) -> Vec<K> {
    let mut left = options.to_vec();
    let mut picks = Vec::with_capacity(n);
    for _ in 0..n {
        if left.is_empty() {
            left = options.to_vec();
        }
        let Some(k) = rng.pick_weighted(&left) else {
            break;
        };
        left.retain(|(o, _)| *o != k);
        picks.push(k);
    }
    picks
}

fn assemble(
    guesses: Vec<(Move, Move, String)>,
    personality: Personality,
    own_pick: Move,
    rng: &mut SeededRng,
) -> TurnPlan {
    let conf = confidences(guesses.len(), rng);
    let follow = rng.next_unit() < personality.follow_rate();
    let chosen = match guesses.first() {
        Some((_, counter, _)) if follow => *counter,
        _ => own_pick,
    };
    let predictions = guesses
        .into_iter()
        .zip(conf)
        .map(|((opp, counter, why), c)| Prediction::new(opp, c, counter, why))
        .collect();
    TurnPlan { predictions, chosen }
}

// ── Resource Wars ──

fn plan_resource_wars(
    personality: Personality,
    pools: [u32; 3],
    recent: &[Move],
    branching: u32,
    rng: &mut SeededRng,
) -> TurnPlan {
    let seen = recent.iter().filter_map(Move::as_resource);
    let richest = richest_pool(pools, None);

    let likely_target = most_common(seen.clone().map(|(_, t, _)| t)).unwrap_or(richest);
    let likely_amount = average(seen.clone().map(|(_, _, a)| a)).unwrap_or(60).min(100);

    let weights = observed_weights(&ResourceMoveKind::ALL, seen.clone().map(|(k, _, _)| k));
    let guesses = distinct_picks(&weights, branching as usize, rng)
        .into_iter()
        .map(|kind| {
            let opp = Move::resource(kind, likely_target, likely_amount);
            let amount = personality.commitment(rng);
            let counter = resource_counter(kind, likely_target, pools, amount);
            let why = format!(
                "{} of their last {} moves point at {} on {}",
                seen.clone().filter(|(k, _, _)| *k == kind).count(),
                recent.len(),
                kind.as_str(),
                likely_target.as_str()
            );
            (opp, counter, why)
        })
        .collect();

    let kind = rng
        .pick_weighted(&personality.resource_weights())
        .unwrap_or(ResourceMoveKind::DefensiveSpread);
    let target = match personality {
        Personality::Aggressive | Personality::Adaptive => richest,
        _ => *rng.pick(&Resource::ALL).unwrap_or(&richest),
    };
    let own = Move::resource(kind, target, personality.commitment(rng));
    assemble(guesses, personality, own, rng)
}

fn resource_counter(predicted: ResourceMoveKind, target: Resource, pools: [u32; 3], amount: u32) -> Move {
    use ResourceMoveKind::*;
    match predicted {
        AggressiveBid => Move::resource(Counter, target, amount),
        Bluff => Move::resource(AggressiveBid, target, amount),
        Counter => Move::resource(AggressiveBid, richest_pool(pools, Some(target)), amount),
        DefensiveSpread | Retreat => Move::resource(AggressiveBid, richest_pool(pools, None), amount),
    }
}

fn richest_pool(pools: [u32; 3], avoid: Option<Resource>) -> Resource {
    Resource::ALL
        .iter()
        .copied()
        .filter(|r| Some(*r) != avoid)
        .max_by_key(|r| (pools[r.index()], core::cmp::Reverse(r.index())))
        .unwrap_or(Resource::A)
}

fn most_common<T: Copy + PartialEq>(items: impl Iterator<Item = T> + Clone) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for item in items.clone() {
        let n = items.clone().filter(|i| *i == item).count();
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((item, n));
        }
    }
    best.map(|(t, _)| t)
}

fn average(values: impl Iterator<Item = u32>) -> Option<u32> {
    let (sum, n) = values.fold((0u64, 0u64), |(s, n), v| (s + v as u64, n + 1));
    (n > 0).then(|| (sum / n) as u32)
}

// ── Negotiation ──

struct Table {
    side: Side,
    current_offer: Option<u32>,
    standing: PerSide<Option<u32>>,
    walkaway: u32,
    round: u32,
    total_rounds: u32,
}

impl Table {
    /// Price this side asks for now. Margins shrink as rounds run out.
    fn ask(&self, margin: u32) -> u32 {
        let left = self.total_rounds.saturating_sub(self.round) + 1;
        let margin = margin * left / self.total_rounds.max(1);
        match self.side {
            Side::Red => (self.walkaway + margin).min(100),
            Side::Blue => self.walkaway.saturating_sub(margin),
        }
    }

    fn acceptable(&self, price: u32, margin: u32) -> bool {
        match self.side {
            Side::Red => price >= self.walkaway + margin / 2,
            Side::Blue => price + margin / 2 <= self.walkaway,
        }
    }

    /// An offer at `price`, nudged off the current offer when countering
    fn offer(&self, kind: NegotiationMoveKind, price: u32) -> Move {
        let price = price.min(100);
        if kind == NegotiationMoveKind::CounterOffer && Some(price) == self.current_offer {
            let nudged = if price == 0 { 1 } else { price - 1 };
            return Move::negotiation(kind, nudged);
        }
        Move::negotiation(kind, price)
    }

    fn opponent_price(&self) -> Option<u32> {
        self.standing[self.side.opponent()]
    }
}

fn plan_negotiation(
    personality: Personality,
    table: &Table,
    recent: &[Move],
    branching: u32,
    rng: &mut SeededRng,
) -> TurnPlan {
    use NegotiationMoveKind::*;

    let margin = personality.margin(rng);
    let my_price = table.ask(margin);
    let seen = recent.iter().filter_map(Move::as_negotiation);
    let their_price = table.opponent_price().unwrap_or(match table.side {
        Side::Red => 50,
        Side::Blue => 45,
    });

    let weights = observed_weights(&NegotiationMoveKind::ALL, seen.clone().map(|(k, _)| k));
    let guesses = distinct_picks(&weights, branching as usize, rng)
        .into_iter()
        .map(|kind| {
            let opp = if kind.is_offer() {
                Move::negotiation(kind, their_price)
            } else {
                Move::negotiation(kind, 0)
            };
            let counter = match kind {
                Propose | CounterOffer if table.acceptable(their_price, margin) => {
                    Move::negotiation(Accept, 0)
                }
                Propose | CounterOffer => table.offer(CounterOffer, my_price),
                Accept => table.offer(Propose, my_price),
                Reject | BluffWalkaway => table.offer(Propose, table.ask(margin / 2)),
            };
            let why = match kind {
                Propose | CounterOffer => format!("they are likely to hold near {}", their_price),
                _ => format!("they have used {} {} time(s)", kind.as_str(), seen.clone().filter(|(k, _)| *k == kind).count()),
            };
            (opp, counter, why)
        })
        .collect();

    let own = match table.opponent_price() {
        Some(price) if table.acceptable(price, margin) => Move::negotiation(Accept, 0),
        _ => match rng.pick_weighted(&personality.negotiation_weights()).unwrap_or(Propose) {
            kind @ (Propose | CounterOffer) => table.offer(kind, my_price),
            kind => Move::negotiation(kind, 0),
        },
    };
    assemble(guesses, personality, own, rng)
}

// ── Auction ──

#[derive(Clone, Copy)]
struct Lot {
    base_value: u32,
    valuation: i64,
}

fn plan_auction(
    personality: Personality,
    lot: Option<Lot>,
    credits: u32,
    recent: &[Move],
    branching: u32,
    rng: &mut SeededRng,
) -> TurnPlan {
    use AuctionMoveKind::*;

    let pass = Move::auction(Pass, 0);
    let Some(lot) = lot.filter(|_| credits > 0) else {
        return TurnPlan {
            predictions: Vec::new(),
            chosen: pass,
        };
    };

    let willing = ((lot.valuation.max(0) as f64) * personality.bid_fraction(rng)) as u32;
    let willing = willing.min(credits);
    let bid = |amount: u32| {
        if amount == 0 || amount > willing {
            pass
        } else {
            Move::auction(Bid, amount.min(credits))
        }
    };

    let seen = recent.iter().filter_map(Move::as_auction);
    let their_bid = average(seen.clone().filter(|(k, _)| *k != Pass).map(|(_, a)| a))
        .unwrap_or(lot.base_value * 4 / 5)
        .max(1);

    let weights = observed_weights(&AuctionMoveKind::ALL, seen.clone().map(|(k, _)| k));
    let guesses = distinct_picks(&weights, branching as usize, rng)
        .into_iter()
        .map(|kind| {
            let (opp, counter) = match kind {
                Pass => (pass, bid(1)),
                Bid => (Move::auction(Bid, their_bid), bid(their_bid + 1)),
                BluffBid => (Move::auction(BluffBid, their_bid), bid(their_bid / 2 + 1)),
            };
            let why = format!(
                "{} is worth {} to me, they usually open near {}",
                lot.base_value, lot.valuation, their_bid
            );
            (opp, counter, why)
        })
        .collect();

    let own = match rng.pick_weighted(&personality.auction_weights()).unwrap_or(Pass) {
        kind @ (Bid | BluffBid) if willing > 0 => Move::auction(kind, willing),
        _ => pass,
    };
    assemble(guesses, personality, own, rng)
}
