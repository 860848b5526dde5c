//! Auction: a run of sealed first-price bids
//!
//! One item per round. The higher bid wins and pays its own bid; a bluff bid
//! competes at face value but pays half. Each side values every item
//! privately, and scores valuation minus price paid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Board, ItemView, Resolution};
use crate::moves::{AuctionMoveKind, Move};
use crate::random::{stream, SeededRng};
use crate::side::{PerSide, Side};

pub const TOTAL_ITEMS: usize = 8;
pub const STARTING_CREDITS: u32 = 1000;
/// Private valuation spread around the public base value
pub const VALUATION_SPREAD: (i64, i64) = (-30, 50);

const CATALOGUE: [(&str, u32); TOTAL_ITEMS] = [
    ("Alpha Core", 100),
    ("Beta Shield", 80),
    ("Gamma Drive", 120),
    ("Delta Array", 90),
    ("Epsilon Node", 110),
    ("Zeta Link", 70),
    ("Eta Pulse", 130),
    ("Theta Grid", 95),
];

type Bid = (AuctionMoveKind, u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionItem {
    pub name: String,
    pub base_value: u32,
    pub valuation: PerSide<i64>,
}

impl AuctionItem {
    fn public_view(&self) -> ItemView {
        ItemView {
            name: self.name.clone(),
            base_value: self.base_value,
            my_valuation: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WonItem {
    pub name: String,
    pub bid: u32,
    pub paid: u32,
    pub valuation: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionState {
    pub items: Vec<AuctionItem>,
    pub credits: PerSide<u32>,
    pub total_spent: PerSide<u32>,
    pub won_items: PerSide<Vec<WonItem>>,
    pub bluffs_used: PerSide<u32>,
    pub scores: PerSide<i64>,
    pub rounds_played: u32,
    pub total_rounds: u32,
    seed: u64,
}

impl AuctionState {
    /// One catalogue item per round, at most [`TOTAL_ITEMS`]
    pub fn new(total_rounds: u32, seed: u64) -> Self {
        let mut rng = SeededRng::new(seed, stream::AUCTION_VALUATION);
        let count = (total_rounds as usize).min(TOTAL_ITEMS);
        let items = CATALOGUE
            .iter()
            .take(count)
            .map(|(name, base)| {
                let mut value =
                    || *base as i64 + rng.range_inclusive(VALUATION_SPREAD.0, VALUATION_SPREAD.1);
                let red = value();
                let blue = value();
                AuctionItem {
                    name: (*name).to_string(),
                    base_value: *base,
                    valuation: PerSide::new(red, blue),
                }
            })
            .collect();
        Self::with_items(total_rounds, seed, items)
    }

    pub fn with_items(total_rounds: u32, seed: u64, items: Vec<AuctionItem>) -> Self {
        Self {
            items,
            credits: PerSide::new(STARTING_CREDITS, STARTING_CREDITS),
            total_spent: PerSide::default(),
            won_items: PerSide::default(),
            bluffs_used: PerSide::default(),
            scores: PerSide::default(),
            rounds_played: 0,
            total_rounds,
            seed,
        }
    }

    pub fn current_item(&self) -> Option<&AuctionItem> {
        self.items.get(self.rounds_played as usize)
    }

    pub fn items_remaining(&self) -> u32 {
        (self.items.len() as u32).saturating_sub(self.rounds_played)
    }

    pub fn is_terminal(&self) -> bool {
        self.items_remaining() == 0
            || self.rounds_played >= self.total_rounds
            || (self.credits.red == 0 && self.credits.blue == 0)
    }

    pub fn legal_moves(&self, side: Side) -> Vec<Move> {
        let credits = self.credits[side];
        let mut moves = Vec::with_capacity(1 + 2 * credits as usize);
        moves.push(Move::auction(AuctionMoveKind::Pass, 0));
        for amount in 1..=credits {
            moves.push(Move::auction(AuctionMoveKind::Bid, amount));
            moves.push(Move::auction(AuctionMoveKind::BluffBid, amount));
        }
        moves
    }

    pub fn is_legal(&self, side: Side, mv: &Move) -> bool {
        match mv.as_auction() {
            Some((AuctionMoveKind::Pass, amount)) => amount == 0,
            Some((_, amount)) => amount >= 1 && amount <= self.credits[side],
            None => false,
        }
    }

    pub fn fallback() -> Move {
        Move::auction(AuctionMoveKind::Pass, 0)
    }

    pub(crate) fn apply(&mut self, bids: PerSide<Bid>) -> Resolution {
        let round = self.rounds_played + 1;
        self.rounds_played = round;

        let Some(item) = self.items.get(round as usize - 1).cloned() else {
            return Resolution {
                description: "No item left to auction.".to_string(),
                ..Resolution::default()
            };
        };

        for side in Side::BOTH {
            if bids[side].0 == AuctionMoveKind::BluffBid {
                self.bluffs_used[side] += 1;
            }
        }

        let face = bids.map(|_, (kind, amount)| match kind {
            AuctionMoveKind::Pass => 0,
            _ => amount,
        });
        let header = format!("{} (base value {}).", item.name, item.base_value);

        if face.red == 0 && face.blue == 0 {
            return Resolution {
                description: format!("{} Both sides pass, the item goes unsold.", header),
                item_name: Some(item.name),
                ..Resolution::default()
            };
        }

        let tied = face.red == face.blue;
        let winner = if face.red > face.blue {
            Side::Red
        } else if face.blue > face.red {
            Side::Blue
        } else {
            self.tiebreak(round)
        };

        let (kind, bid) = bids[winner];
        // Legality already caps a bid at the bidder's credits
        let paid = match kind {
            AuctionMoveKind::BluffBid => bid / 2,
            _ => bid,
        };
        let valuation = item.valuation[winner];
        let net = valuation - paid as i64;

        self.credits[winner] -= paid;
        self.total_spent[winner] += paid;
        self.scores[winner] += net;
        self.won_items[winner].push(WonItem {
            name: item.name.clone(),
            bid,
            paid,
            valuation,
        });

        let mut change = PerSide::default();
        change[winner] = net;
        let mut changes = BTreeMap::new();
        changes.insert(item.name.clone(), change);

        let how = if tied { "takes the tiebreak at" } else { "wins with" };
        Resolution {
            winner: Some(winner),
            resource_changes: changes,
            description: format!(
                "{} {} {} {} (paid {}). Net value: {}.",
                header, winner, how, bid, paid, net
            ),
            item_name: Some(item.name),
            winning_bid: Some(bid),
            paid: Some(paid),
            ..Resolution::default()
        }
    }

    fn tiebreak(&self, round: u32) -> Side {
        let mut rng = SeededRng::new(self.seed, stream::AUCTION_TIEBREAK).for_round(round);
        if rng.next_range(2) == 0 {
            Side::Red
        } else {
            Side::Blue
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let won = self.won_items.as_ref().map(|_, items| {
            items
                .iter()
                .map(|w| json!({"name": w.name, "bid": w.bid, "paid": w.paid}))
                .collect::<Vec<_>>()
        });
        json!({
            "game": "auction",
            "round": self.rounds_played,
            "totalRounds": self.total_rounds,
            "credits": self.credits,
            "scores": self.scores,
            "totalSpent": self.total_spent,
            "currentItem": self.current_item().map(AuctionItem::public_view),
            "itemsRemaining": self.items_remaining(),
            "wonItems": won,
            "bluffsUsed": self.bluffs_used,
        })
    }

    pub(crate) fn board(&self, side: Side) -> Board {
        let item = self.current_item().map(|item| ItemView {
            my_valuation: Some(item.valuation[side]),
            ..item.public_view()
        });
        let upcoming = self
            .items
            .iter()
            .skip(self.rounds_played as usize + 1)
            .map(AuctionItem::public_view)
            .collect();
        Board::Auction {
            item,
            credits: self.credits,
            items_remaining: self.items_remaining(),
            upcoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AuctionMoveKind::*;

    fn single_item() -> AuctionState {
        AuctionState::with_items(
            1,
            5,
            vec![AuctionItem {
                name: "Alpha Core".to_string(),
                base_value: 100,
                valuation: PerSide::new(110, 120),
            }],
        )
    }

    #[test]
    fn test_higher_bid_wins_and_pays_own_bid() {
        let mut s = single_item();
        let res = s.apply(PerSide::new((Bid, 80), (Bid, 90)));
        assert_eq!(res.winner, Some(Side::Blue));
        assert_eq!(res.paid, Some(90));
        assert_eq!(s.credits, PerSide::new(1000, 910));
        assert_eq!(s.total_spent.blue, 90);
        assert_eq!(
            s.won_items.blue,
            vec![WonItem {
                name: "Alpha Core".to_string(),
                bid: 90,
                paid: 90,
                valuation: 120
            }]
        );
        assert_eq!(s.scores, PerSide::new(0, 30));
        assert_eq!(s.items_remaining(), 0);
        assert!(s.is_terminal());
    }

    #[test]
    fn test_all_in_bid_spends_every_credit() {
        let mut s = single_item();
        s.credits.red = 75;
        assert!(s.is_legal(Side::Red, &Move::auction(Bid, 75)));
        assert!(!s.is_legal(Side::Red, &Move::auction(Bid, 76)));
        assert!(!s.is_legal(Side::Red, &Move::auction(BluffBid, 76)));

        let res = s.apply(PerSide::new((Bid, 75), (Pass, 0)));
        assert_eq!(res.winner, Some(Side::Red));
        assert_eq!(res.paid, Some(75));
        assert_eq!(s.credits.red, 0);
        assert_eq!(s.scores.red, 110 - 75);
    }

    #[test]
    fn test_bluff_bid_pays_half() {
        let mut s = single_item();
        let res = s.apply(PerSide::new((BluffBid, 100), (Bid, 99)));
        assert_eq!(res.winner, Some(Side::Red));
        assert_eq!(res.winning_bid, Some(100));
        assert_eq!(res.paid, Some(50));
        assert_eq!(s.credits.red, 950);
        assert_eq!(s.scores.red, 60);
        assert_eq!(s.bluffs_used.red, 1);
    }

    #[test]
    fn test_both_pass_leaves_item_unsold() {
        let mut s = single_item();
        let res = s.apply(PerSide::new((Pass, 0), (Pass, 0)));
        assert_eq!(res.winner, None);
        assert!(s.won_items.red.is_empty() && s.won_items.blue.is_empty());
        assert_eq!(s.items_remaining(), 0);
    }

    #[test]
    fn test_tiebreak_is_deterministic() {
        let mut a = single_item();
        let mut b = single_item();
        let ra = a.apply(PerSide::new((Bid, 70), (Bid, 70)));
        let rb = b.apply(PerSide::new((Bid, 70), (Bid, 70)));
        assert!(ra.winner.is_some());
        assert_eq!(ra.winner, rb.winner);
        assert_eq!(ra.paid, Some(70));
    }

    #[test]
    fn test_item_count_follows_rounds() {
        assert_eq!(AuctionState::new(3, 1).items.len(), 3);
        assert_eq!(AuctionState::new(20, 1).items.len(), TOTAL_ITEMS);
        let s = AuctionState::new(8, 42);
        for item in &s.items {
            for side in Side::BOTH {
                let v = item.valuation[side] - item.base_value as i64;
                assert!((-30..=50).contains(&v));
            }
        }
    }

    #[test]
    fn test_bid_limited_by_credits() {
        let mut s = single_item();
        s.credits.red = 40;
        assert!(s.is_legal(Side::Red, &Move::auction(Bid, 40)));
        assert!(!s.is_legal(Side::Red, &Move::auction(Bid, 41)));
        assert!(!s.is_legal(Side::Red, &Move::auction(Bid, 0)));
        assert!(!s.is_legal(Side::Red, &Move::auction(Pass, 3)));
        assert!(s.is_legal(Side::Blue, &Move::auction(Bid, 41)));
    }

    #[test]
    fn test_out_of_credits_is_terminal() {
        let mut s = AuctionState::new(8, 1);
        s.credits = PerSide::new(0, 0);
        assert!(s.is_terminal());
        assert_eq!(s.legal_moves(Side::Red), vec![Move::auction(Pass, 0)]);
    }
}
