//! Events a match emits, in the order observers receive them

use serde::{Deserialize, Serialize};

use crate::moves::{GameType, Move};
use crate::personality::Personality;
use crate::poll::PollTally;
use crate::prediction::Prediction;
use crate::rules::Resolution;
use crate::seal::{Salt, Seal};
use crate::side::{PerSide, Side};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<Personality>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    #[serde(rename_all = "camelCase")]
    MatchStart {
        match_id: String,
        game_type: GameType,
        agents: PerSide<AgentInfo>,
        total_rounds: u32,
        /// Seeds every hidden value, so the log alone can rebuild the game
        seed: u64,
        branching_factor: u32,
    },
    #[serde(rename_all = "camelCase")]
    RoundStart {
        round: u32,
        game_state: serde_json::Value,
    },
    ThinkingStart {
        agent: Side,
    },
    #[serde(rename_all = "camelCase")]
    Prediction {
        agent: Side,
        branch_index: u32,
        prediction: Prediction,
    },
    /// The chosen move is only present as a seal until collapse
    #[serde(rename_all = "camelCase")]
    ThinkingEnd {
        agent: Side,
        predictions: Vec<Prediction>,
        chosen_move: Seal,
        timed_out: bool,
    },
    #[serde(rename_all = "camelCase")]
    Collapse {
        red_predictions: Vec<Prediction>,
        blue_predictions: Vec<Prediction>,
        red_move: Move,
        blue_move: Move,
        reveal: PerSide<Salt>,
        resolution: Resolution,
    },
    #[serde(rename_all = "camelCase")]
    RoundEnd {
        round: u32,
        scores: PerSide<i64>,
        accuracy: PerSide<f64>,
        game_state: serde_json::Value,
        /// Sides that missed the deadline this round
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        degraded: Vec<Side>,
        audience: PollTally,
    },
    #[serde(rename_all = "camelCase")]
    MatchEnd {
        winner: Option<Side>,
        final_scores: PerSide<i64>,
        total_futures_simulated: u64,
        prediction_accuracy: PerSide<f64>,
        rounds_played: u32,
        #[serde(default)]
        cancelled: bool,
        audience: PollTally,
    },
    Ping {},
}

impl MatchEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            MatchEvent::MatchStart { .. } => "match_start",
            MatchEvent::RoundStart { .. } => "round_start",
            MatchEvent::ThinkingStart { .. } => "thinking_start",
            MatchEvent::Prediction { .. } => "prediction",
            MatchEvent::ThinkingEnd { .. } => "thinking_end",
            MatchEvent::Collapse { .. } => "collapse",
            MatchEvent::RoundEnd { .. } => "round_end",
            MatchEvent::MatchEnd { .. } => "match_end",
            MatchEvent::Ping {} => "ping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::NegotiationMoveKind;

    #[test]
    fn test_wire_shape() {
        let mv = Move::negotiation(NegotiationMoveKind::Propose, 40);
        let event = MatchEvent::Prediction {
            agent: Side::Red,
            branch_index: 0,
            prediction: Prediction::new(mv, 0.5, mv, "mirror"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "prediction");
        assert_eq!(json["branchIndex"], 0);
        assert_eq!(json["prediction"]["opponentMove"]["type"], "propose");
        assert!(json["prediction"].get("wasCorrect").is_none());

        let back: MatchEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_ping_is_bare() {
        let json = serde_json::to_string(&MatchEvent::Ping {}).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_match_end_draw_serializes_null_winner() {
        let event = MatchEvent::MatchEnd {
            winner: None,
            final_scores: PerSide::new(3, 3),
            total_futures_simulated: 12,
            prediction_accuracy: PerSide::new(0.5, 0.25),
            rounds_played: 2,
            cancelled: false,
            audience: PollTally::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["winner"].is_null());
        assert_eq!(json["totalFuturesSimulated"], 12);
        assert_eq!(event.type_name(), "match_end");
    }
}
