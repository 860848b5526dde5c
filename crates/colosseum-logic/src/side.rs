//! The two seats of a match and a pair container keyed by them

use core::fmt;
use core::ops::{Index, IndexMut};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// One of the two competing agents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    /// Turn order: red resolves first, blue second
    pub const BOTH: [Side; 2] = [Side::Red, Side::Blue];

    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Red => "red",
            Side::Blue => "blue",
        }
    }

    /// Stable stream index used when deriving per-side RNG streams
    pub fn index(self) -> u32 {
        match self {
            Side::Red => 0,
            Side::Blue => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(Side::Red),
            "blue" => Ok(Side::Blue),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// A value held once per side. Serializes as `{"red": .., "blue": ..}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub red: T,
    pub blue: T,
}

impl<T> PerSide<T> {
    pub fn new(red: T, blue: T) -> Self {
        Self { red, blue }
    }

    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            red: f(Side::Red),
            blue: f(Side::Blue),
        }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Red => &self.red,
            Side::Blue => &self.blue,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Red => &mut self.red,
            Side::Blue => &mut self.blue,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Side, T) -> U) -> PerSide<U> {
        PerSide {
            red: f(Side::Red, self.red),
            blue: f(Side::Blue, self.blue),
        }
    }

    pub fn as_ref(&self) -> PerSide<&T> {
        PerSide {
            red: &self.red,
            blue: &self.blue,
        }
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        self.get(side)
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        self.get_mut(side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_is_involution() {
        for side in Side::BOTH {
            assert_ne!(side, side.opponent());
            assert_eq!(side, side.opponent().opponent());
        }
    }

    #[test]
    fn test_per_side_serializes_by_name() {
        let pair = PerSide::new(3, 7);
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, r#"{"red":3,"blue":7}"#);
        assert_eq!(pair[Side::Blue], 7);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("Red".parse::<Side>(), Ok(Side::Red));
        assert_eq!("blue".parse::<Side>(), Ok(Side::Blue));
        assert!("green".parse::<Side>().is_err());
    }
}
