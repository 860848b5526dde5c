//! Simultaneous commitment for one round
//!
//! Each side commits exactly one move. Until the barrier closes, the only
//! thing anyone can learn about a committed move is its seal. Closing hands
//! the moves to the engine, which is the first point either one is readable.

use colosseum_logic::{seal_move, Move, PerSide, Prediction, Salt, Seal, Side};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// A sealed move. Only ever handed out by [`CommitBarrier::await_both_or_timeout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub mv: Move,
    pub salt: Salt,
    pub seal: Seal,
}

/// A prediction accepted by the barrier, forwarded for live streaming
#[derive(Clone, Debug)]
pub struct StreamedPrediction {
    pub side: Side,
    pub round: u32,
    pub branch_index: u32,
    pub prediction: Prediction,
}

/// What the barrier held when it closed
#[derive(Debug)]
pub struct BarrierOutcome {
    pub moves: PerSide<Option<Commitment>>,
    pub predictions: PerSide<Vec<Prediction>>,
    /// Sides with no committed move, in turn order
    pub missing: Vec<Side>,
}

#[derive(Default)]
struct BarrierState {
    commits: PerSide<Option<Commitment>>,
    predictions: PerSide<Vec<Prediction>>,
    forfeited: PerSide<bool>,
    closed: bool,
}

impl BarrierState {
    fn settled(&self, side: Side) -> bool {
        self.commits[side].is_some() || self.forfeited[side]
    }
}

pub struct CommitBarrier {
    round: u32,
    branching: u32,
    state: Mutex<BarrierState>,
    notify: Notify,
    stream: mpsc::UnboundedSender<StreamedPrediction>,
}

impl CommitBarrier {
    pub fn new(round: u32, branching: u32, stream: mpsc::UnboundedSender<StreamedPrediction>) -> Self {
        Self {
            round,
            branching,
            state: Mutex::new(BarrierState::default()),
            notify: Notify::new(),
            stream,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn branching(&self) -> u32 {
        self.branching
    }

    /// Seal and store `side`'s move. The first commit wins; a second one is
    /// rejected and leaves the first in place.
    pub async fn commit(&self, side: Side, mv: Move) -> Result<Seal> {
        let mut state = self.state.lock().await;
        if state.closed || state.forfeited[side] {
            return Err(EngineError::RoundClosed {
                side,
                round: self.round,
            });
        }
        if state.commits[side].is_some() {
            return Err(EngineError::DoubleCommit {
                side,
                round: self.round,
            });
        }
        let salt = Salt(*Uuid::new_v4().as_bytes());
        let seal = seal_move(&mv, &salt);
        state.commits[side] = Some(Commitment { mv, salt, seal });
        drop(state);

        debug!(round = self.round, %side, "move committed");
        self.notify.notify_one();
        Ok(seal)
    }

    /// Accept one prediction from `side` and return its branch index. The
    /// prediction is normalized, then streamed while the barrier is locked,
    /// so anything accepted before close is already queued when close returns.
    pub async fn record_prediction(&self, side: Side, prediction: Prediction) -> Result<u32> {
        let prediction = prediction.normalized();
        let mut state = self.state.lock().await;
        if state.closed || state.forfeited[side] {
            return Err(EngineError::RoundClosed {
                side,
                round: self.round,
            });
        }
        let index = state.predictions[side].len() as u32;
        if index >= self.branching {
            return Err(EngineError::PredictionLimit {
                side,
                round: self.round,
                limit: self.branching,
            });
        }
        state.predictions[side].push(prediction.clone());
        // Receiver gone means the engine stopped listening; the barrier still holds it
        let _ = self.stream.send(StreamedPrediction {
            side,
            round: self.round,
            branch_index: index,
            prediction,
        });
        Ok(index)
    }

    /// `side` will not commit this round. Does nothing once it has.
    pub async fn forfeit(&self, side: Side) {
        let mut state = self.state.lock().await;
        if state.commits[side].is_none() && !state.closed {
            state.forfeited[side] = true;
            drop(state);
            debug!(round = self.round, %side, "side forfeited the round");
            self.notify.notify_one();
        }
    }

    pub async fn is_committed(&self, side: Side) -> bool {
        self.state.lock().await.commits[side].is_some()
    }

    pub async fn seal_of(&self, side: Side) -> Option<Seal> {
        self.state.lock().await.commits[side].as_ref().map(|c| c.seal)
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Wait until both sides have committed or forfeited, or until
    /// `deadline`, then close. Safe to drop before it completes; the barrier
    /// only closes when this returns.
    pub async fn await_both_or_timeout(&self, deadline: Instant) -> BarrierOutcome {
        loop {
            {
                let state = self.state.lock().await;
                if state.closed || Side::BOTH.iter().all(|s| state.settled(*s)) {
                    break;
                }
            }
            // notify_one keeps a permit, so a commit landing between the
            // check and this await is not lost
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                break;
            }
        }
        self.close().await
    }

    async fn close(&self) -> BarrierOutcome {
        let mut state = self.state.lock().await;
        state.closed = true;
        let moves = PerSide::new(state.commits.red.take(), state.commits.blue.take());
        let predictions = PerSide::new(
            std::mem::take(&mut state.predictions.red),
            std::mem::take(&mut state.predictions.blue),
        );
        let missing = Side::BOTH
            .iter()
            .copied()
            .filter(|s| moves[*s].is_none())
            .collect();
        BarrierOutcome {
            moves,
            predictions,
            missing,
        }
    }
}
