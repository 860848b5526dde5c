//! Audience poll: observers guess each round's winner before collapse

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::side::Side;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("voting for round {round} closed at collapse")]
    StaleVote { round: u32 },

    #[error("round {round} is not open for voting")]
    UnknownRound { round: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceVote {
    pub round: u32,
    pub voted_for: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_correct: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollTally {
    pub total_voted: u32,
    pub total_correct: u32,
}

impl PollTally {
    pub fn accuracy(&self) -> f64 {
        if self.total_voted == 0 {
            0.0
        } else {
            self.total_correct as f64 / self.total_voted as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoundStatus {
    Open,
    Closed,
    Settled,
}

#[derive(Debug, Default)]
pub struct AudiencePoll {
    rounds: BTreeMap<u32, RoundStatus>,
    votes: Vec<AudienceVote>,
    tally: PollTally,
}

impl AudiencePoll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_round(&mut self, round: u32) {
        self.rounds.entry(round).or_insert(RoundStatus::Open);
    }

    /// Stop taking votes for `round`. Called at collapse.
    pub fn close_round(&mut self, round: u32) {
        if let Some(status) = self.rounds.get_mut(&round) {
            if *status == RoundStatus::Open {
                *status = RoundStatus::Closed;
            }
        }
    }

    pub fn submit(&mut self, round: u32, voted_for: Side) -> Result<(), PollError> {
        match self.rounds.get(&round) {
            Some(RoundStatus::Open) => {
                self.votes.push(AudienceVote {
                    round,
                    voted_for,
                    was_correct: None,
                });
                Ok(())
            }
            Some(_) => Err(PollError::StaleVote { round }),
            None => Err(PollError::UnknownRound { round }),
        }
    }

    /// Mark every vote for `round` against the round winner. A drawn round
    /// makes every vote wrong. Settling twice is a no-op.
    pub fn settle(&mut self, round: u32, winner: Option<Side>) -> PollTally {
        self.close_round(round);
        if self.rounds.get(&round) == Some(&RoundStatus::Closed) {
            for vote in self.votes.iter_mut().filter(|v| v.round == round) {
                let correct = Some(vote.voted_for) == winner;
                vote.was_correct = Some(correct);
                self.tally.total_voted += 1;
                if correct {
                    self.tally.total_correct += 1;
                }
            }
            self.rounds.insert(round, RoundStatus::Settled);
        }
        self.tally
    }

    pub fn totals(&self) -> PollTally {
        self.tally
    }

    pub fn votes(&self) -> &[AudienceVote] {
        &self.votes
    }
}
