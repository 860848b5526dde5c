//! Match phases and the transitions between them

use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Thinking,
    Committed,
    Revealed,
    RoundEnd,
    MatchEnd,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Thinking => "thinking",
            Phase::Committed => "committed",
            Phase::Revealed => "revealed",
            Phase::RoundEnd => "round_end",
            Phase::MatchEnd => "match_end",
        }
    }

    /// Forward transitions of the round loop. Any live phase may jump to
    /// `MatchEnd` when a match is aborted.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (MatchEnd, _) => false,
            (_, MatchEnd) => true,
            (Lobby, Thinking)
            | (Thinking, Committed)
            | (Committed, Revealed)
            | (Revealed, RoundEnd)
            | (RoundEnd, Thinking) => true,
            _ => false,
        }
    }

    /// Audience votes are open until collapse
    pub fn accepts_votes(self) -> bool {
        matches!(self, Phase::Thinking | Phase::Committed)
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::MatchEnd
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
