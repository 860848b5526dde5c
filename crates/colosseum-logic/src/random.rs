//! Seeded pseudo-random number generator
//!
//! Every random draw the rules make (walkaway prices, item valuations,
//! auction tie-breaks) comes from a stream derived from the match seed, so a
//! match replayed from its event log reproduces the exact same state.

/// Stream ids for the independent draws a match needs
pub mod stream {
    pub const NEGOTIATION_WALKAWAY: u32 = 0x4E45_4730;
    pub const AUCTION_VALUATION: u32 = 0x4155_4330;
    pub const AUCTION_TIEBREAK: u32 = 0x4155_4331;
    pub const PERSONALITY: u32 = 0x5045_5230;
}

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// xorshift64* generator
///
/// Deterministic: same seed + stream = same sequence
#[derive(Clone, Debug)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    /// Create a generator for one named stream of a match seed
    pub fn new(seed: u64, stream: u32) -> Self {
        let mut state = seed ^ GOLDEN_GAMMA;
        state ^= (stream as u64).wrapping_mul(0x517cc1b727220a95);
        if state == 0 {
            state = GOLDEN_GAMMA;
        }

        // Warm up the generator
        let mut rng = Self { state };
        for _ in 0..8 {
            rng.next_u64();
        }
        rng
    }

    /// Fork a child generator for a specific round
    pub fn for_round(&self, round: u32) -> Self {
        let mut state = self.state ^ (round as u64).wrapping_mul(GOLDEN_GAMMA);
        if state == 0 {
            state = GOLDEN_GAMMA;
        }
        let mut rng = Self { state };
        rng.next_u64();
        rng
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545f4914f6cdd1d)
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Value in [0, max); 0 when max is 0
    pub fn next_range(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    /// Value in [lo, hi] (bounds swapped if reversed)
    pub fn range_inclusive(&mut self, lo: i64, hi: i64) -> i64 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let span = (hi - lo) as u64 + 1;
        lo + (self.next_u64() % span) as i64
    }

    /// Uniform float in [0, 1)
    pub fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Pick from `(value, weight)` pairs. Zero total weight falls back to the first entry.
    pub fn pick_weighted<T: Copy>(&mut self, options: &[(T, u32)]) -> Option<T> {
        let first = options.first()?.0;
        let total: u32 = options.iter().map(|(_, w)| *w).sum();
        if total == 0 {
            return Some(first);
        }
        let mut roll = self.next_range(total);
        for (value, weight) in options {
            if roll < *weight {
                return Some(*value);
            }
            roll -= weight;
        }
        Some(first)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_range(items.len() as u32) as usize)
    }
}

/// FNV-1a hash of a string, for seeds given as text
pub fn seed_from_str(s: &str) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
