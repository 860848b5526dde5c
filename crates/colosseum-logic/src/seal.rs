//! Move sealing: `SHA256(salt || canonical move)`
//!
//! A seal can be published while the move stays hidden. Revealing the move
//! and salt later lets anyone check the move was not swapped.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::moves::Move;

pub const SALT_LEN: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seal(pub [u8; 32]);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt(pub [u8; SALT_LEN]);

pub fn seal_move(mv: &Move, salt: &Salt) -> Seal {
    let mut hasher = Sha256::new();
    hasher.update(salt.0);
    hasher.update(mv.canonical().as_bytes());
    Seal(hasher.finalize().into())
}

impl Seal {
    pub fn verify(&self, mv: &Move, salt: &Salt) -> bool {
        seal_move(mv, salt) == *self
    }
}

impl fmt::Debug for Seal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seal({})", hex::encode(self.0))
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(self.0))
    }
}

fn decode_hex<'de, D: Deserializer<'de>, const N: usize>(d: D) -> Result<[u8; N], D::Error> {
    let s = String::deserialize(d)?;
    let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
    bytes
        .try_into()
        .map_err(|_| serde::de::Error::custom(format!("expected {} hex bytes", N)))
}

impl Serialize for Seal {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Seal {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        decode_hex::<D, 32>(d).map(Seal)
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        decode_hex::<D, SALT_LEN>(d).map(Salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::{AuctionMoveKind, Resource, ResourceMoveKind};

    #[test]
    fn test_seal_verifies_only_the_sealed_move() {
        let salt = Salt([7u8; SALT_LEN]);
        let mv = Move::resource(ResourceMoveKind::Counter, Resource::C, 45);
        let seal = seal_move(&mv, &salt);
        assert!(seal.verify(&mv, &salt));
        assert!(!seal.verify(&Move::resource(ResourceMoveKind::Counter, Resource::C, 46), &salt));
        assert!(!seal.verify(&mv, &Salt([8u8; SALT_LEN])));
    }

    #[test]
    fn test_hex_serde() {
        let salt = Salt([0xab; SALT_LEN]);
        let json = serde_json::to_string(&salt).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(SALT_LEN)));
        let back: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, salt);

        let seal = seal_move(&Move::auction(AuctionMoveKind::Pass, 0), &salt);
        let back: Seal = serde_json::from_value(serde_json::to_value(seal).unwrap()).unwrap();
        assert_eq!(back, seal);

        assert!(serde_json::from_str::<Seal>("\"abcd\"").is_err());
    }
}
