//! Event fan-out: the replay log, optional sinks and live subscribers
//!
//! The [`ReplayLog`] is the source of truth. An event is appended there
//! first; sinks and subscribers only ever see what the log accepted, in the
//! same order.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colosseum_logic::{replay, MatchEvent, Phase, ReplayOutcome};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::error::{EngineError, Result};
use crate::state::MatchId;

/// Where and when an event happened
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub match_id: MatchId,
    /// Position in the match's log, from 0
    pub seq: u64,
    pub round: u32,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
}

/// One line of the event stream: the event's own fields plus `context`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: MatchEvent,
    pub context: EventContext,
}

impl EventEnvelope {
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What live subscribers receive
#[derive(Clone, Debug)]
pub enum Broadcast {
    Event(Arc<EventEnvelope>),
    /// Keep-alive, not part of any match log
    Ping(DateTime<Utc>),
}

impl Broadcast {
    pub fn to_json_line(&self) -> Result<String> {
        match self {
            Broadcast::Event(envelope) => envelope.to_json_line(),
            Broadcast::Ping(at) => Ok(serde_json::json!({ "type": "ping", "timestamp": at }).to_string()),
        }
    }
}

// ── Replay log ──

/// Append-only, in-memory log of every match's events
#[derive(Default)]
pub struct ReplayLog {
    matches: RwLock<HashMap<MatchId, Vec<Arc<EventEnvelope>>>>,
}

impl ReplayLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event. Its `seq` must be exactly the next slot.
    pub async fn append(&self, envelope: Arc<EventEnvelope>) -> Result<()> {
        let mut matches = self.matches.write().await;
        let log = matches.entry(envelope.context.match_id.clone()).or_default();
        let expected = log.len() as u64;
        if envelope.context.seq != expected {
            return Err(EngineError::SequenceGap {
                match_id: envelope.context.match_id.clone(),
                seq: envelope.context.seq,
                expected,
            });
        }
        log.push(envelope);
        Ok(())
    }

    pub async fn events(&self, match_id: &MatchId) -> Result<Vec<Arc<EventEnvelope>>> {
        self.matches
            .read()
            .await
            .get(match_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownMatch(match_id.clone()))
    }

    /// Bare events in log order
    pub async fn match_events(&self, match_id: &MatchId) -> Result<Vec<MatchEvent>> {
        Ok(self
            .events(match_id)
            .await?
            .iter()
            .map(|e| e.event.clone())
            .collect())
    }

    pub async fn len(&self, match_id: &MatchId) -> usize {
        self.matches
            .read()
            .await
            .get(match_id)
            .map_or(0, Vec::len)
    }

    pub async fn matches(&self) -> Vec<MatchId> {
        let mut ids: Vec<_> = self.matches.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn remove(&self, match_id: &MatchId) -> bool {
        self.matches.write().await.remove(match_id).is_some()
    }

    /// Rebuild the match from its log alone
    pub async fn replay(&self, match_id: &MatchId) -> Result<ReplayOutcome> {
        let events = self.match_events(match_id).await?;
        Ok(replay(&events)?)
    }
}

// ── Sinks ──

/// Secondary destination for accepted events. A failing sink is logged
/// and skipped; it never holds up the match.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn append(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// Newline-delimited JSON, one envelope per line
pub struct JsonlSink {
    name: String,
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonlSink {
    pub fn new(name: impl Into<String>, writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }

    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::create(path).await?;
        Ok(Self::new(path.display().to_string(), Box::new(file)))
    }

    pub fn stdout() -> Self {
        Self::new("stdout", Box::new(tokio::io::stdout()))
    }
}

#[async_trait]
impl EventSink for JsonlSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut line = envelope.to_json_line()?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Read back a file written by [`JsonlSink`]. Blank lines and pings are skipped.
pub async fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<EventEnvelope>> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut envelopes = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line)?;
        if value.get("context").is_none() {
            continue;
        }
        envelopes.push(serde_json::from_value(value)?);
    }
    Ok(envelopes)
}

// ── Hub ──

pub struct BroadcastHub {
    tx: broadcast::Sender<Broadcast>,
    log: Arc<ReplayLog>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            log: Arc::new(ReplayLog::new()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn log(&self) -> &Arc<ReplayLog> {
        &self.log
    }

    /// Live stream of every match. Slow subscribers lag and lose events;
    /// the replay log keeps the full history.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.tx.subscribe()
    }

    /// Log, then sinks, then subscribers. Only a log failure is an error.
    pub async fn publish(&self, envelope: EventEnvelope) -> Result<Arc<EventEnvelope>> {
        let envelope = Arc::new(envelope);
        self.log.append(envelope.clone()).await?;

        for sink in &self.sinks {
            if let Err(e) = sink.append(&envelope).await {
                error!(
                    sink = sink.name(),
                    match_id = %envelope.context.match_id,
                    seq = envelope.context.seq,
                    error = %e,
                    "event sink failed"
                );
            }
        }

        // No subscribers is fine
        if self.tx.send(Broadcast::Event(envelope.clone())).is_err() {
            debug!(seq = envelope.context.seq, "no live subscribers");
        }
        Ok(envelope)
    }

    pub fn ping(&self) {
        if self.tx.send(Broadcast::Ping(Utc::now())).is_err() {
            debug!("heartbeat with no subscribers");
        }
    }
}

/// Drain a subscription until it closes, skipping over lag
pub async fn next_event(rx: &mut broadcast::Receiver<Broadcast>) -> Option<Broadcast> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "subscriber lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colosseum_logic::Side;

    fn envelope(match_id: &str, seq: u64, event: MatchEvent) -> EventEnvelope {
        EventEnvelope {
            event,
            context: EventContext {
                match_id: MatchId::from(match_id),
                seq,
                round: 1,
                phase: Phase::Thinking,
                timestamp: Utc::now(),
            },
        }
    }

    fn thinking(seq: u64) -> EventEnvelope {
        envelope("match_a", seq, MatchEvent::ThinkingStart { agent: Side::Red })
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn append(&self, _envelope: &EventEnvelope) -> Result<()> {
            Err(EngineError::Sink("disk full".to_string()))
        }
    }

    #[test]
    fn test_envelope_wire_shape() {
        let env = thinking(4);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "thinking_start");
        assert_eq!(json["agent"], "red");
        assert_eq!(json["context"]["matchId"], "match_a");
        assert_eq!(json["context"]["seq"], 4);
        assert_eq!(json["context"]["phase"], "thinking");

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[tokio::test]
    async fn test_log_rejects_sequence_gaps() {
        let log = ReplayLog::new();
        log.append(Arc::new(thinking(0))).await.unwrap();
        let err = log.append(Arc::new(thinking(2))).await.unwrap_err();
        assert!(matches!(err, EngineError::SequenceGap { seq: 2, expected: 1, .. }));
        log.append(Arc::new(thinking(1))).await.unwrap();
        assert_eq!(log.len(&MatchId::from("match_a")).await, 2);
    }

    #[tokio::test]
    async fn test_logs_are_per_match() {
        let log = ReplayLog::new();
        log.append(Arc::new(thinking(0))).await.unwrap();
        log.append(Arc::new(envelope("match_b", 0, MatchEvent::Ping {})))
            .await
            .unwrap();
        assert_eq!(log.matches().await.len(), 2);
        assert!(matches!(
            log.events(&MatchId::from("match_c")).await,
            Err(EngineError::UnknownMatch(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribers_see_log_order() {
        let hub = BroadcastHub::new(16);
        let mut rx = hub.subscribe();
        for seq in 0..3 {
            hub.publish(thinking(seq)).await.unwrap();
        }
        for seq in 0..3 {
            match next_event(&mut rx).await {
                Some(Broadcast::Event(env)) => assert_eq!(env.context.seq, seq),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_publish() {
        let hub = BroadcastHub::new(16).with_sink(Arc::new(FailingSink));
        hub.publish(thinking(0)).await.unwrap();
        hub.publish(thinking(1)).await.unwrap();
        assert_eq!(hub.log().len(&MatchId::from("match_a")).await, 2);
    }

    #[tokio::test]
    async fn test_rejected_event_not_broadcast() {
        let hub = BroadcastHub::new(16);
        let mut rx = hub.subscribe();
        assert!(hub.publish(thinking(1)).await.is_err());
        hub.ping();
        assert!(matches!(next_event(&mut rx).await, Some(Broadcast::Ping(_))));
    }

    #[test]
    fn test_ping_line() {
        let line = Broadcast::Ping(Utc::now()).to_json_line().unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["type"], "ping");
    }

    #[tokio::test]
    async fn test_jsonl_file_round_trip() {
        let path = std::env::temp_dir().join(format!("colosseum-{}.jsonl", uuid::Uuid::new_v4()));
        let sink = JsonlSink::create(&path).await.unwrap();
        for seq in 0..3 {
            sink.append(&thinking(seq)).await.unwrap();
        }
        let back = read_jsonl(&path).await.unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[2].context.seq, 2);
        tokio::fs::remove_file(&path).await.ok();
    }
}
