//! Predictions of the opponent's move and how they are scored

use serde::{Deserialize, Serialize};

use crate::moves::Move;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub opponent_move: Move,
    /// In [0, 1]. Shown to observers, never used for scoring.
    pub confidence: f64,
    pub counter: Move,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_correct: Option<bool>,
    /// Right kind, wrong details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_match: Option<bool>,
}

impl Prediction {
    pub fn new(opponent_move: Move, confidence: f64, counter: Move, reasoning: impl Into<String>) -> Self {
        Self {
            opponent_move,
            confidence: clamp_confidence(confidence),
            counter,
            reasoning: reasoning.into(),
            was_correct: None,
            partial_match: None,
        }
    }

    /// Strip anything only scoring may set and bring confidence into [0, 1].
    /// Fields are public, so predictions from outside pass through this first.
    pub fn normalized(self) -> Self {
        Self {
            confidence: clamp_confidence(self.confidence),
            was_correct: None,
            partial_match: None,
            ..self
        }
    }

    /// Same move kind and, for targeted moves, the same target
    pub fn matches(&self, actual: &Move) -> bool {
        self.opponent_move.game_type() == actual.game_type()
            && self.opponent_move.kind_name() == actual.kind_name()
            && self.opponent_move.target() == actual.target()
    }

    fn is_exact(&self, actual: &Move) -> bool {
        self.opponent_move == *actual
    }
}

/// Non-finite confidence counts as none at all
fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundScore {
    pub correct: u32,
    pub total: u32,
}

/// Annotate a round's predictions against what the opponent actually did
pub fn score_predictions(predictions: &[Prediction], actual: &Move) -> (Vec<Prediction>, RoundScore) {
    let mut score = RoundScore::default();
    let annotated = predictions
        .iter()
        .map(|p| {
            let correct = p.matches(actual);
            score.total += 1;
            if correct {
                score.correct += 1;
            }
            let partial = !correct
                && p.opponent_move.kind_name() == actual.kind_name()
                && !p.is_exact(actual);
            Prediction {
                was_correct: Some(correct),
                partial_match: Some(partial),
                ..p.clone()
            }
        })
        .collect();
    (annotated, score)
}

/// Running accuracy over a whole match
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyTally {
    pub correct: u32,
    pub total: u32,
}

impl AccuracyTally {
    pub fn record(&mut self, round: RoundScore) {
        self.correct += round.correct;
        self.total += round.total;
    }

    /// 0 until anything has been scored
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::{NegotiationMoveKind, Resource, ResourceMoveKind};
    use proptest::prelude::*;

    fn rw(kind: ResourceMoveKind, target: Resource, amount: u32) -> Move {
        Move::resource(kind, target, amount)
    }

    #[test]
    fn test_kind_and_target_decide_correctness() {
        let actual = rw(ResourceMoveKind::AggressiveBid, Resource::B, 70);
        let counter = rw(ResourceMoveKind::Counter, Resource::B, 60);
        let preds = vec![
            Prediction::new(rw(ResourceMoveKind::AggressiveBid, Resource::B, 10), 0.6, counter, "amount differs"),
            Prediction::new(rw(ResourceMoveKind::AggressiveBid, Resource::C, 70), 0.3, counter, "wrong pool"),
            Prediction::new(rw(ResourceMoveKind::Retreat, Resource::B, 70), 0.1, counter, "wrong kind"),
        ];
        let (annotated, score) = score_predictions(&preds, &actual);
        assert_eq!(score, RoundScore { correct: 1, total: 3 });
        let flags: Vec<_> = annotated.iter().map(|p| p.was_correct).collect();
        assert_eq!(flags, vec![Some(true), Some(false), Some(false)]);
        assert_eq!(annotated[1].partial_match, Some(true));
        assert_eq!(annotated[2].partial_match, Some(false));
        // Annotation keeps the original content
        assert_eq!(annotated[0].reasoning, "amount differs");
    }

    #[test]
    fn test_untargeted_moves_match_on_kind() {
        let actual = Move::negotiation(NegotiationMoveKind::Propose, 55);
        let counter = Move::negotiation(NegotiationMoveKind::Accept, 0);
        let p = Prediction::new(Move::negotiation(NegotiationMoveKind::Propose, 40), 0.5, counter, "");
        assert!(p.matches(&actual));
    }

    #[test]
    fn test_confidence_clamped() {
        let mv = Move::negotiation(NegotiationMoveKind::Reject, 0);
        assert_eq!(Prediction::new(mv, 1.7, mv, "").confidence, 1.0);
        assert_eq!(Prediction::new(mv, -0.2, mv, "").confidence, 0.0);
        assert_eq!(Prediction::new(mv, f64::NAN, mv, "").confidence, 0.0);
    }

    #[test]
    fn test_normalized_drops_outcome_flags() {
        let mv = Move::negotiation(NegotiationMoveKind::Reject, 0);
        let forged = Prediction {
            confidence: 7.5,
            was_correct: Some(true),
            partial_match: Some(false),
            ..Prediction::new(mv, 0.5, mv, "sure thing")
        };
        let clean = forged.normalized();
        assert_eq!(clean.confidence, 1.0);
        assert_eq!(clean.was_correct, None);
        assert_eq!(clean.partial_match, None);
        assert_eq!(clean.reasoning, "sure thing");

        let nan = Prediction { confidence: f64::NAN, ..Prediction::new(mv, 0.5, mv, "") }.normalized();
        assert_eq!(nan.confidence, 0.0);
        assert!(serde_json::to_string(&nan).unwrap().contains("\"confidence\":0.0"));
    }

    #[test]
    fn test_empty_tally_is_zero() {
        assert_eq!(AccuracyTally::default().accuracy(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_accuracy_bounded_and_monotone(rounds in proptest::collection::vec((0u32..5, 0u32..5), 0..30)) {
            let mut tally = AccuracyTally::default();
            let mut last_correct = 0;
            for (correct, extra) in rounds {
                tally.record(RoundScore { correct, total: correct + extra });
                let acc = tally.accuracy();
                prop_assert!((0.0..=1.0).contains(&acc));
                prop_assert!(tally.correct >= last_correct);
                last_correct = tally.correct;
            }
        }
    }
}
