//! Negotiation: red sells, blue buys
//!
//! Both sides hold a hidden walkaway price drawn from the match seed. A deal
//! scores each side the value it captured beyond its own walkaway and ends
//! the game.

use std::collections::BTreeMap;

use serde_json::json;

use super::{round_winner, Board, Resolution};
use crate::moves::{Move, NegotiationMoveKind};
use crate::random::{stream, SeededRng};
use crate::side::{PerSide, Side};

pub const MAX_PRICE: u32 = 100;
pub const SELLER_WALKAWAY: (i64, i64) = (20, 45);
pub const BUYER_WALKAWAY: (i64, i64) = (55, 80);

type Offer = (NegotiationMoveKind, u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationState {
    /// Red's floor and blue's ceiling. Never part of a public snapshot.
    pub walkaway: PerSide<u32>,
    /// Last price each side put on the table and has not had rejected
    pub standing: PerSide<Option<u32>>,
    pub current_offer: Option<u32>,
    pub offer_by: Option<Side>,
    pub deal_price: Option<u32>,
    pub deal_round: Option<u32>,
    pub scores: PerSide<i64>,
    pub bluffs_used: PerSide<u32>,
    pub rounds_played: u32,
    pub total_rounds: u32,
}

impl NegotiationState {
    pub fn new(total_rounds: u32, seed: u64) -> Self {
        let mut rng = SeededRng::new(seed, stream::NEGOTIATION_WALKAWAY);
        let red = rng.range_inclusive(SELLER_WALKAWAY.0, SELLER_WALKAWAY.1) as u32;
        let blue = rng.range_inclusive(BUYER_WALKAWAY.0, BUYER_WALKAWAY.1) as u32;
        Self::with_walkaways(total_rounds, PerSide::new(red, blue))
    }

    pub fn with_walkaways(total_rounds: u32, walkaway: PerSide<u32>) -> Self {
        Self {
            walkaway,
            standing: PerSide::default(),
            current_offer: None,
            offer_by: None,
            deal_price: None,
            deal_round: None,
            scores: PerSide::default(),
            bluffs_used: PerSide::default(),
            rounds_played: 0,
            total_rounds,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.deal_price.is_some() || self.rounds_played >= self.total_rounds
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(2 * (MAX_PRICE as usize + 1) + 3);
        for price in 0..=MAX_PRICE {
            moves.push(Move::negotiation(NegotiationMoveKind::Propose, price));
            if Some(price) != self.current_offer {
                moves.push(Move::negotiation(NegotiationMoveKind::CounterOffer, price));
            }
        }
        moves.push(Move::negotiation(NegotiationMoveKind::Accept, 0));
        moves.push(Move::negotiation(NegotiationMoveKind::Reject, 0));
        moves.push(Move::negotiation(NegotiationMoveKind::BluffWalkaway, 0));
        moves
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        let Some((kind, price)) = mv.as_negotiation() else {
            return false;
        };
        match kind {
            NegotiationMoveKind::Propose => price <= MAX_PRICE,
            NegotiationMoveKind::CounterOffer => {
                price <= MAX_PRICE && Some(price) != self.current_offer
            }
            NegotiationMoveKind::Accept
            | NegotiationMoveKind::Reject
            | NegotiationMoveKind::BluffWalkaway => price == 0,
        }
    }

    pub fn fallback() -> Move {
        Move::negotiation(NegotiationMoveKind::Reject, 0)
    }

    pub(crate) fn apply(&mut self, offers: PerSide<Offer>) -> Resolution {
        self.rounds_played += 1;
        let mut notes = Vec::new();

        let is = |side: Side, kind: NegotiationMoveKind| offers[side].0 == kind;

        for side in Side::BOTH {
            if is(side, NegotiationMoveKind::BluffWalkaway) {
                self.bluffs_used[side] += 1;
                notes.push(format!("{} bluffs a walkaway.", side));
            }
        }
        if Side::BOTH
            .iter()
            .all(|s| is(*s, NegotiationMoveKind::BluffWalkaway))
        {
            notes.push("Both sides walk away from the table.".to_string());
            return Resolution {
                description: notes.join(" "),
                ..Resolution::default()
            };
        }

        // A reject withdraws whatever the opponent had standing
        for side in Side::BOTH {
            if !is(side, NegotiationMoveKind::Reject) {
                continue;
            }
            let opponent = side.opponent();
            if self.standing[opponent].take().is_some() {
                notes.push(format!("{} rejects {}'s offer.", side, opponent));
                if self.offer_by == Some(opponent) {
                    self.current_offer = self.standing[side];
                    self.offer_by = self.standing[side].map(|_| side);
                }
            } else {
                notes.push(format!("{} rejects, but nothing is on the table.", side));
            }
        }

        let fresh = offers.map(|_, (kind, price)| kind.is_offer().then_some(price));
        let binding = |side: Side| {
            let opponent = side.opponent();
            fresh[opponent]
                .or(self.standing[opponent])
                .map(|price| (price, opponent))
        };
        let deal = match (
            is(Side::Red, NegotiationMoveKind::Accept),
            is(Side::Blue, NegotiationMoveKind::Accept),
        ) {
            (true, true) => self.current_offer.zip(self.offer_by),
            (true, false) => binding(Side::Red),
            (false, true) => binding(Side::Blue),
            (false, false) => None,
        };

        if let Some((price, offered_by)) = deal {
            return self.close_deal(price, offered_by, notes);
        }

        for side in Side::BOTH {
            if is(side, NegotiationMoveKind::Accept) {
                notes.push(format!("{} accepts, but there is nothing to accept.", side));
            }
            if let Some(price) = fresh[side] {
                self.standing[side] = Some(price);
                self.current_offer = Some(price);
                self.offer_by = Some(side);
                let verb = if is(side, NegotiationMoveKind::Propose) {
                    "proposes"
                } else {
                    "counters at"
                };
                notes.push(format!("{} {} {}.", side, verb, price));
            }
        }

        Resolution {
            description: notes.join(" "),
            ..Resolution::default()
        }
    }

    fn close_deal(&mut self, price: u32, offered_by: Side, mut notes: Vec<String>) -> Resolution {
        self.deal_price = Some(price);
        self.deal_round = Some(self.rounds_played);
        self.current_offer = Some(price);
        self.offer_by = Some(offered_by);

        let gains = PerSide::new(
            (price as i64 - self.walkaway.red as i64).max(0),
            (self.walkaway.blue as i64 - price as i64).max(0),
        );
        self.scores.red += gains.red;
        self.scores.blue += gains.blue;

        notes.push(format!(
            "Deal struck at {}. Red gains {}, blue gains {}.",
            price, gains.red, gains.blue
        ));
        let mut changes = BTreeMap::new();
        changes.insert("deal".to_string(), gains);
        Resolution {
            winner: round_winner(gains),
            resource_changes: changes,
            description: notes.join(" "),
            deal_price: Some(price),
            ..Resolution::default()
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "game": "negotiation",
            "round": self.rounds_played,
            "totalRounds": self.total_rounds,
            "currentOffer": self.current_offer,
            "offerBy": self.offer_by,
            "standingOffers": self.standing,
            "dealPrice": self.deal_price,
            "dealRound": self.deal_round,
            "scores": self.scores,
            "bluffsUsed": self.bluffs_used,
        })
    }

    pub(crate) fn board(&self, side: Side) -> Board {
        Board::Negotiation {
            current_offer: self.current_offer,
            offer_by: self.offer_by,
            standing_offers: self.standing,
            my_walkaway: self.walkaway[side],
            bluffs_used: self.bluffs_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NegotiationMoveKind::*;

    fn state() -> NegotiationState {
        NegotiationState::with_walkaways(3, PerSide::new(30, 70))
    }

    #[test]
    fn test_walkaways_in_range() {
        for seed in 0..200 {
            let s = NegotiationState::new(5, seed);
            assert!((20..=45).contains(&s.walkaway.red));
            assert!((55..=80).contains(&s.walkaway.blue));
        }
    }

    #[test]
    fn test_offer_then_accept_closes_deal() {
        let mut s = state();
        let r1 = s.apply(PerSide::new((Propose, 40), (CounterOffer, 55)));
        assert_eq!(r1.deal_price, None);
        assert_eq!(s.scores, PerSide::new(0, 0));
        assert_eq!(s.current_offer, Some(55));
        assert_eq!(s.offer_by, Some(Side::Blue));
        assert!(!s.is_terminal());

        let r2 = s.apply(PerSide::new((Propose, 50), (Accept, 0)));
        assert_eq!(r2.deal_price, Some(50));
        assert_eq!(s.deal_price, Some(50));
        assert_eq!(s.deal_round, Some(2));
        assert_eq!(s.scores, PerSide::new(20, 20));
        assert_eq!(r2.resource_changes["deal"], PerSide::new(20, 20));
        assert!(s.is_terminal());
    }

    #[test]
    fn test_accept_binds_to_standing_offer() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 60), (BluffWalkaway, 0)));
        let res = s.apply(PerSide::new((Reject, 0), (Accept, 0)));
        // Red's reject finds nothing of blue's to withdraw; blue takes red's 60
        assert_eq!(res.deal_price, Some(60));
        assert_eq!(s.scores, PerSide::new(30, 10));
        assert_eq!(res.winner, Some(Side::Red));
    }

    #[test]
    fn test_reject_withdraws_opponent_offer() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 60), (Reject, 0)));
        assert_eq!(s.standing.red, Some(60));

        s.apply(PerSide::new((Accept, 0), (Reject, 0)));
        assert_eq!(s.standing.red, None);
        assert_eq!(s.current_offer, None);
        assert_eq!(s.deal_price, None);
    }

    #[test]
    fn test_reject_without_offer_is_noop() {
        let mut s = state();
        let before = s.clone();
        let res = s.apply(PerSide::new((Reject, 0), (Reject, 0)));
        assert_eq!(res.winner, None);
        assert!(res.resource_changes.is_empty());
        assert_eq!(s.standing, before.standing);
        assert_eq!(s.current_offer, None);
        assert_eq!(s.rounds_played, 1);
    }

    #[test]
    fn test_mutual_bluff_freezes_round() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 45), (Reject, 0)));
        s.apply(PerSide::new((BluffWalkaway, 0), (BluffWalkaway, 0)));
        assert_eq!(s.bluffs_used, PerSide::new(1, 1));
        assert_eq!(s.current_offer, Some(45));
        assert_eq!(s.deal_price, None);
    }

    #[test]
    fn test_crossing_offers_do_not_close() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 40), (Propose, 60)));
        assert_eq!(s.deal_price, None);
        assert_eq!(s.current_offer, Some(60));
        assert_eq!(s.offer_by, Some(Side::Blue));
    }

    #[test]
    fn test_both_accept_closes_at_current_offer() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 40), (Propose, 60)));
        let res = s.apply(PerSide::new((Accept, 0), (Accept, 0)));
        assert_eq!(res.deal_price, Some(60));
    }

    #[test]
    fn test_counter_must_differ_from_current_offer() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 50), (Reject, 0)));
        assert!(!s.is_legal(&Move::negotiation(CounterOffer, 50)));
        assert!(s.is_legal(&Move::negotiation(CounterOffer, 51)));
        assert!(s.is_legal(&Move::negotiation(Propose, 50)));
        assert!(!s.is_legal(&Move::negotiation(Accept, 5)));
        assert!(!s.is_legal(&Move::negotiation(Propose, 101)));
    }

    #[test]
    fn test_gain_never_negative() {
        let mut s = state();
        s.apply(PerSide::new((Propose, 90), (Accept, 0)));
        assert_eq!(s.scores, PerSide::new(60, 0));
    }
}
