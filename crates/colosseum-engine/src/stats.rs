//! Per-personality records over finished matches
//!
//! Each side of a match counts as one appearance, so a mirror match counts
//! twice for its personality. Cancelled and unfinished matches are ignored.

use colosseum_logic::{Personality, Side};
use serde::Serialize;

use crate::state::MatchSummary;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub personality: Personality,
    pub total_matches: u32,
    pub wins: u32,
    pub win_rate: f64,
    /// Mean of the per-match prediction accuracy
    pub avg_accuracy: f64,
    pub avg_score: f64,
}

#[derive(Default)]
struct Totals {
    matches: u32,
    wins: u32,
    accuracy: f64,
    score: f64,
}

impl Totals {
    fn into_stats(self, personality: Personality) -> AgentStats {
        let mean = |sum: f64| {
            if self.matches == 0 {
                0.0
            } else {
                sum / self.matches as f64
            }
        };
        AgentStats {
            personality,
            total_matches: self.matches,
            wins: self.wins,
            win_rate: mean(self.wins as f64),
            avg_accuracy: mean(self.accuracy),
            avg_score: mean(self.score),
        }
    }
}

fn counted(summary: &MatchSummary) -> bool {
    summary.is_finished() && !summary.cancelled
}

fn totals<'a>(personality: Personality, summaries: impl IntoIterator<Item = &'a MatchSummary>) -> Totals {
    let mut totals = Totals::default();
    for summary in summaries.into_iter().filter(|s| counted(s)) {
        for side in Side::BOTH {
            if summary.agents[side].personality != Some(personality) {
                continue;
            }
            totals.matches += 1;
            if summary.winner == Some(side) {
                totals.wins += 1;
            }
            totals.accuracy += summary.accuracy[side];
            totals.score += summary.scores[side] as f64;
        }
    }
    totals
}

/// Record of one personality; all zero when it has not played
pub fn agent_stats<'a>(
    personality: Personality,
    summaries: impl IntoIterator<Item = &'a MatchSummary>,
) -> AgentStats {
    totals(personality, summaries).into_stats(personality)
}

/// Every personality that has played, best win rate first
pub fn leaderboard(summaries: &[MatchSummary]) -> Vec<AgentStats> {
    let mut rows: Vec<AgentStats> = Personality::ALL
        .iter()
        .map(|p| agent_stats(*p, summaries))
        .filter(|s| s.total_matches > 0)
        .collect();
    // Stable, so ties keep the personality order
    rows.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));
    rows
}
