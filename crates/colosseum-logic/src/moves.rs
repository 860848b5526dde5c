//! Game types and the moves agents commit each round

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ── Game types ──

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    ResourceWars,
    Negotiation,
    Auction,
}

impl GameType {
    pub const ALL: [GameType; 3] = [
        GameType::ResourceWars,
        GameType::Negotiation,
        GameType::Auction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GameType::ResourceWars => "resource_wars",
            GameType::Negotiation => "negotiation",
            GameType::Auction => "auction",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GameType::ResourceWars => "Resource Wars",
            GameType::Negotiation => "Negotiation",
            GameType::Auction => "Auction",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GameType::ResourceWars => {
                "Contest three shared resource pools with bids, spreads, bluffs and counters"
            }
            GameType::Negotiation => {
                "Red sells, blue buys; close a deal beyond your hidden walkaway price"
            }
            GameType::Auction => {
                "Sealed first-price bids on a run of items with hidden private valuations"
            }
        }
    }

    pub fn default_rounds(self) -> u32 {
        match self {
            GameType::ResourceWars => 10,
            GameType::Negotiation => 5,
            GameType::Auction => 8,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "resource_wars" | "resourcewars" => Ok(GameType::ResourceWars),
            "negotiation" => Ok(GameType::Negotiation),
            "auction" => Ok(GameType::Auction),
            other => Err(format!("unknown game type: {}", other)),
        }
    }
}

// ── Resource Wars ──

/// The three shared pools
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    A,
    B,
    C,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::A, Resource::B, Resource::C];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::A => "A",
            Resource::B => "B",
            Resource::C => "C",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Resource::A => 0,
            Resource::B => 1,
            Resource::C => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMoveKind {
    AggressiveBid,
    DefensiveSpread,
    Bluff,
    Counter,
    Retreat,
}

impl ResourceMoveKind {
    pub const ALL: [ResourceMoveKind; 5] = [
        ResourceMoveKind::AggressiveBid,
        ResourceMoveKind::DefensiveSpread,
        ResourceMoveKind::Bluff,
        ResourceMoveKind::Counter,
        ResourceMoveKind::Retreat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceMoveKind::AggressiveBid => "aggressive_bid",
            ResourceMoveKind::DefensiveSpread => "defensive_spread",
            ResourceMoveKind::Bluff => "bluff",
            ResourceMoveKind::Counter => "counter",
            ResourceMoveKind::Retreat => "retreat",
        }
    }
}

// ── Negotiation ──

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationMoveKind {
    Propose,
    Accept,
    Reject,
    CounterOffer,
    BluffWalkaway,
}

impl NegotiationMoveKind {
    pub const ALL: [NegotiationMoveKind; 5] = [
        NegotiationMoveKind::Propose,
        NegotiationMoveKind::Accept,
        NegotiationMoveKind::Reject,
        NegotiationMoveKind::CounterOffer,
        NegotiationMoveKind::BluffWalkaway,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NegotiationMoveKind::Propose => "propose",
            NegotiationMoveKind::Accept => "accept",
            NegotiationMoveKind::Reject => "reject",
            NegotiationMoveKind::CounterOffer => "counter_offer",
            NegotiationMoveKind::BluffWalkaway => "bluff_walkaway",
        }
    }

    /// Kinds that put a price on the table
    pub fn is_offer(self) -> bool {
        matches!(
            self,
            NegotiationMoveKind::Propose | NegotiationMoveKind::CounterOffer
        )
    }
}

// ── Auction ──

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionMoveKind {
    Bid,
    Pass,
    BluffBid,
}

impl AuctionMoveKind {
    pub const ALL: [AuctionMoveKind; 3] = [
        AuctionMoveKind::Bid,
        AuctionMoveKind::Pass,
        AuctionMoveKind::BluffBid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuctionMoveKind::Bid => "bid",
            AuctionMoveKind::Pass => "pass",
            AuctionMoveKind::BluffBid => "bluff_bid",
        }
    }
}

// ── Move ──

/// One committed move. The `game` tag keeps moves from different rule-sets apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum Move {
    ResourceWars {
        #[serde(rename = "type")]
        kind: ResourceMoveKind,
        target: Resource,
        amount: u32,
    },
    Negotiation {
        #[serde(rename = "type")]
        kind: NegotiationMoveKind,
        price: u32,
    },
    Auction {
        #[serde(rename = "type")]
        kind: AuctionMoveKind,
        amount: u32,
    },
}

impl Move {
    pub fn resource(kind: ResourceMoveKind, target: Resource, amount: u32) -> Self {
        Move::ResourceWars {
            kind,
            target,
            amount,
        }
    }

    pub fn negotiation(kind: NegotiationMoveKind, price: u32) -> Self {
        Move::Negotiation { kind, price }
    }

    pub fn auction(kind: AuctionMoveKind, amount: u32) -> Self {
        Move::Auction { kind, amount }
    }

    pub fn game_type(&self) -> GameType {
        match self {
            Move::ResourceWars { .. } => GameType::ResourceWars,
            Move::Negotiation { .. } => GameType::Negotiation,
            Move::Auction { .. } => GameType::Auction,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Move::ResourceWars { kind, .. } => kind.as_str(),
            Move::Negotiation { kind, .. } => kind.as_str(),
            Move::Auction { kind, .. } => kind.as_str(),
        }
    }

    /// Only resource moves aim at something
    pub fn target(&self) -> Option<Resource> {
        match self {
            Move::ResourceWars { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn amount(&self) -> u32 {
        match self {
            Move::ResourceWars { amount, .. } => *amount,
            Move::Negotiation { price, .. } => *price,
            Move::Auction { amount, .. } => *amount,
        }
    }

    pub fn as_resource(&self) -> Option<(ResourceMoveKind, Resource, u32)> {
        match *self {
            Move::ResourceWars {
                kind,
                target,
                amount,
            } => Some((kind, target, amount)),
            _ => None,
        }
    }

    pub fn as_negotiation(&self) -> Option<(NegotiationMoveKind, u32)> {
        match *self {
            Move::Negotiation { kind, price } => Some((kind, price)),
            _ => None,
        }
    }

    pub fn as_auction(&self) -> Option<(AuctionMoveKind, u32)> {
        match *self {
            Move::Auction { kind, amount } => Some((kind, amount)),
            _ => None,
        }
    }

    /// Stable textual form used for sealing, e.g. `resource_wars:aggressive_bid:A:60`
    pub fn canonical(&self) -> String {
        match self {
            Move::ResourceWars {
                kind,
                target,
                amount,
            } => format!(
                "resource_wars:{}:{}:{}",
                kind.as_str(),
                target.as_str(),
                amount
            ),
            Move::Negotiation { kind, price } => {
                format!("negotiation:{}:{}", kind.as_str(), price)
            }
            Move::Auction { kind, amount } => format!("auction:{}:{}", kind.as_str(), amount),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::ResourceWars {
                kind,
                target,
                amount,
            } => write!(f, "{} {} {}", kind.as_str(), target.as_str(), amount),
            Move::Negotiation { kind, price } if kind.is_offer() => {
                write!(f, "{} {}", kind.as_str(), price)
            }
            Move::Negotiation { kind, .. } => f.write_str(kind.as_str()),
            Move::Auction { kind: AuctionMoveKind::Pass, .. } => f.write_str("pass"),
            Move::Auction { kind, amount } => write!(f, "{} {}", kind.as_str(), amount),
        }
    }
}
