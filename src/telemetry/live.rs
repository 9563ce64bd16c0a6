use std::io::{BufRead, BufReader, ErrorKind};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use rand::Rng;
use serde_json::{json, Value};
use crate::telemetry::{RingBuffer, Sample, TelemetryError};
/// Payload flag the rig monitor sets on samples it also persists.
pub const LIVE_MARKER: &str = "dbw";
pub fn is_live_marked(payload: &Value) -> bool {
    payload.get(LIVE_MARKER).and_then(Value::as_bool) == Some(true)
}
static NEXT_ARRIVAL: AtomicU64 = AtomicU64::new(1);
/// Process-wide ordering of message arrivals and gate changes. Later stamps compare greater.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArrivalStamp(u64);
impl ArrivalStamp {
    pub fn now() -> Self {
        ArrivalStamp(NEXT_ARRIVAL.fetch_add(1, Ordering::Relaxed))
    }
}
/// A push message stamped when the feed received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveMessage {
    pub arrived: ArrivalStamp,
    pub payload: String,
}
/// Sending half of a subscription, owned by the feed's reader thread. Dropping it closes the feed.
pub struct Publisher {
    tx: Sender<LiveMessage>,
    cancelled: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}
impl Publisher {
    /// Returns false once the subscriber cancelled or went away.
    pub fn publish(&self, payload: String) -> bool {
        let message = LiveMessage {
            arrived: ArrivalStamp::now(),
            payload,
        };
        !self.is_cancelled() && self.tx.send(message).is_ok()
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
impl Drop for Publisher {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
/// Receiving half of a push-channel subscription. Dropping it cancels the feed.
pub struct Subscription {
    rx: Receiver<LiveMessage>,
    cancelled: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}
impl Subscription {
    pub fn channel() -> (Publisher, Subscription) {
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        (
            Publisher {
                tx,
                cancelled: Arc::clone(&cancelled),
                closed: Arc::clone(&closed),
            },
            Subscription {
                rx,
                cancelled,
                closed,
            },
        )
    }
    /// Messages that arrived since the last call. Yields nothing after [`Subscription::cancel`].
    pub fn pending(&self) -> impl Iterator<Item = LiveMessage> + '_ {
        self.rx.try_iter().take_while(move |_| !self.is_cancelled())
    }
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
    /// The publishing side is gone: nothing new will arrive, though [`Subscription::pending`]
    /// may still hold messages.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
/// Reconnect schedule for a closed feed. The delay doubles after each failed attempt up to `max`.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    delay: Duration,
    next_attempt: Option<Instant>,
}
impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            delay: initial,
            next_attempt: None,
        }
    }
    pub fn delay(&self) -> Duration {
        self.delay
    }
    /// True once a reconnect is due. The first call after a reset only arms the timer.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_attempt {
            Some(at) => now >= at,
            None => {
                self.next_attempt = Some(now + self.delay);
                false
            }
        }
    }
    pub fn failed(&mut self, now: Instant) {
        self.delay = (self.delay * 2).min(self.max);
        self.next_attempt = Some(now + self.delay);
    }
    pub fn reset(&mut self) {
        self.delay = self.initial;
        self.next_attempt = None;
    }
}
impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}
/// A push channel scoped to the control domain. Each call starts a fresh subscription.
pub trait LiveFeed {
    fn subscribe(&self) -> Result<Subscription, TelemetryError>;
}
/// Newline-delimited JSON over TCP.
#[derive(Clone, Debug)]
pub struct TcpFeed {
    addr: String,
}
impl TcpFeed {
    const POLL: Duration = Duration::from_millis(200);
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}
impl LiveFeed for TcpFeed {
    fn subscribe(&self) -> Result<Subscription, TelemetryError> {
        let stream = TcpStream::connect(&self.addr)
            .map_err(|e| TelemetryError::Transport(format!("{}: {e}", self.addr)))?;
        stream.set_read_timeout(Some(Self::POLL))?;
        log::info!("live feed connected to {}", self.addr);
        let (publisher, subscription) = Subscription::channel();
        let addr = self.addr.clone();
        thread::spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while !publisher.is_cancelled() {
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let message = line.trim();
                        if !message.is_empty() && !publisher.publish(message.to_owned()) {
                            break;
                        }
                        line.clear();
                    }
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                    Err(e) => {
                        log::warn!("live feed {addr} read error: {e}");
                        break;
                    }
                }
            }
            log::info!("live feed {addr} closed");
        });
        Ok(subscription)
    }
}
/// Stand-in rig producing motor telemetry at a fixed rate. Every `db_write_every`-th message
/// carries the live marker.
#[derive(Clone, Debug)]
pub struct SimulatedFeed {
    interval: Duration,
    db_write_every: u32,
}
impl SimulatedFeed {
    pub fn new(interval: Duration, db_write_every: u32) -> Self {
        Self {
            interval,
            db_write_every: db_write_every.max(1),
        }
    }
}
impl Default for SimulatedFeed {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 3)
    }
}
impl LiveFeed for SimulatedFeed {
    fn subscribe(&self) -> Result<Subscription, TelemetryError> {
        let (publisher, subscription) = Subscription::channel();
        let interval = self.interval;
        let db_write_every = self.db_write_every;
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut tick: u64 = 0;
            loop {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs_f64();
                let phase = tick as f64 * 0.05;
                let mut message = json!({
                    "timestamp": now,
                    "actual_position": ((tick * 7) % 1000) as f64,
                    "actual_velocity": (phase.sin() * 3000.0).round(),
                    "phase_current":
                        (phase.cos() * 800.0 + rng.gen_range(-120.0..120.0f64)).round(),
                    "voltage_logic": 24_000.0 + rng.gen_range(-50.0..50.0f64).round(),
                });
                if tick % u64::from(db_write_every) == 0 {
                    message[LIVE_MARKER] = Value::Bool(true);
                }
                if !publisher.publish(message.to_string()) {
                    break;
                }
                tick += 1;
                thread::sleep(interval);
            }
        });
        Ok(subscription)
    }
}
/// Replays a fixed list of raw messages; useful for tests and deterministic playback.
#[derive(Clone, Debug, Default)]
pub struct ManualFeed {
    messages: Vec<String>,
}
impl ManualFeed {
    pub fn new(messages: impl IntoIterator<Item = String>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
        }
    }
}
impl LiveFeed for ManualFeed {
    fn subscribe(&self) -> Result<Subscription, TelemetryError> {
        let (publisher, subscription) = Subscription::channel();
        for message in &self.messages {
            publisher.publish(message.clone());
        }
        Ok(subscription)
    }
}
/// Why a push message was not admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Historical load for the current session has not completed.
    AwaitingHistory,
    SessionInactive,
    /// Valid JSON without the live marker.
    NotLive,
    Malformed,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Admitted { evicted: usize },
    Dropped(DropReason),
}
/// Session conditions an inbound message is admitted under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestGate {
    pub history_ready: bool,
    pub session_active: bool,
}
/// Admission policy for push messages into the ring buffer.
#[derive(Debug, Default)]
pub struct LiveIngestor {
    admitted: u64,
    dropped: u64,
}
impl LiveIngestor {
    pub fn ingest(
        &mut self,
        raw: &str,
        gate: IngestGate,
        buffer: &mut RingBuffer,
    ) -> IngestOutcome {
        let outcome = match Self::admit(raw, gate) {
            Ok(sample) => IngestOutcome::Admitted {
                evicted: buffer.push(sample),
            },
            Err(reason) => IngestOutcome::Dropped(reason),
        };
        match outcome {
            IngestOutcome::Admitted { .. } => self.admitted += 1,
            IngestOutcome::Dropped(_) => self.dropped += 1,
        }
        outcome
    }
    pub fn admitted(&self) -> u64 {
        self.admitted
    }
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
    fn admit(raw: &str, gate: IngestGate) -> Result<Sample, DropReason> {
        if !gate.history_ready {
            return Err(DropReason::AwaitingHistory);
        }
        if !gate.session_active {
            return Err(DropReason::SessionInactive);
        }
        let payload: Value = serde_json::from_str(raw).map_err(|e| {
            log::warn!("dropping unparsable live message: {e}");
            DropReason::Malformed
        })?;
        if !is_live_marked(&payload) {
            return Err(DropReason::NotLive);
        }
        Sample::from_live(payload).map_err(|e| {
            log::warn!("dropping live message: {e}");
            DropReason::Malformed
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    const OPEN: IngestGate = IngestGate {
        history_ready: true,
        session_active: true,
    };
    fn live(timestamp: f64, position: f64) -> String {
        json!({ "timestamp": timestamp, "dbw": true, "actual_position": position }).to_string()
    }
    #[test]
    fn admits_marked_samples_in_arrival_order() {
        let mut buffer = RingBuffer::with_capacity(3).unwrap();
        let mut ingestor = LiveIngestor::default();
        for (i, p) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            ingestor.ingest(&live(i as f64, p), OPEN, &mut buffer);
        }
        let positions: Vec<f64> = buffer.iter().map(|s| s.actual_position).collect();
        assert_eq!(positions, vec![2.0, 3.0, 4.0]);
        assert_eq!(ingestor.admitted(), 4);
    }
    #[test]
    fn gate_blocks_before_anything_else() {
        let mut buffer = RingBuffer::with_capacity(8).unwrap();
        let mut ingestor = LiveIngestor::default();
        let loading = IngestGate {
            history_ready: false,
            session_active: true,
        };
        let inactive = IngestGate {
            history_ready: true,
            session_active: false,
        };
        assert_eq!(
            ingestor.ingest(&live(1.0, 1.0), loading, &mut buffer),
            IngestOutcome::Dropped(DropReason::AwaitingHistory)
        );
        assert_eq!(
            ingestor.ingest(&live(1.0, 1.0), inactive, &mut buffer),
            IngestOutcome::Dropped(DropReason::SessionInactive)
        );
        assert!(buffer.is_empty());
        assert_eq!(ingestor.dropped(), 2);
    }
    #[test]
    fn unmarked_and_malformed_messages_leave_buffer_untouched() {
        let mut buffer = RingBuffer::with_capacity(8).unwrap();
        let mut ingestor = LiveIngestor::default();
        ingestor.ingest(&live(1.0, 1.0), OPEN, &mut buffer);
        let version = buffer.version();
        let unmarked = json!({ "timestamp": 2.0, "actual_position": 9 }).to_string();
        let marker_false = json!({ "timestamp": 2.0, "dbw": false }).to_string();
        assert_eq!(
            ingestor.ingest(&unmarked, OPEN, &mut buffer),
            IngestOutcome::Dropped(DropReason::NotLive)
        );
        assert_eq!(
            ingestor.ingest(&marker_false, OPEN, &mut buffer),
            IngestOutcome::Dropped(DropReason::NotLive)
        );
        for raw in ["{\"dbw\": true, \"timestamp\": ", "{\"dbw\": true}", "[1,2]"] {
            let outcome = ingestor.ingest(raw, OPEN, &mut buffer);
            assert!(matches!(
                outcome,
                IngestOutcome::Dropped(DropReason::Malformed | DropReason::NotLive)
            ));
        }
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.version(), version);
    }
    #[test]
    fn manual_feed_replays_then_cancels() {
        let feed = ManualFeed::new(vec!["a".to_string(), "b".to_string()]);
        let subscription = feed.subscribe().unwrap();
        let first: Vec<String> = subscription.pending().map(|m| m.payload).collect();
        assert_eq!(first, vec!["a", "b"]);
        let again = feed.subscribe().unwrap();
        again.cancel();
        assert_eq!(again.pending().count(), 0);
    }
    #[test]
    fn publisher_stops_after_subscriber_drops() {
        let (publisher, subscription) = Subscription::channel();
        assert!(publisher.publish("x".into()));
        drop(subscription);
        assert!(!publisher.publish("y".into()));
    }
    #[test]
    fn simulated_feed_marks_every_nth_message() {
        let feed = SimulatedFeed::new(Duration::from_millis(1), 2);
        let subscription = feed.subscribe().unwrap();
        let mut received = Vec::new();
        while received.len() < 4 {
            received.extend(subscription.pending());
            thread::sleep(Duration::from_millis(2));
        }
        let marks: Vec<bool> = received[..4]
            .iter()
            .map(|m| is_live_marked(&serde_json::from_str(&m.payload).unwrap()))
            .collect();
        assert_eq!(marks, vec![true, false, true, false]);
    }
    #[test]
    fn dropped_publisher_closes_subscription() {
        let (publisher, subscription) = Subscription::channel();
        publisher.publish("last".into());
        assert!(!subscription.is_closed());
        drop(publisher);
        assert!(subscription.is_closed());
        let left: Vec<String> = subscription.pending().map(|m| m.payload).collect();
        assert_eq!(left, vec!["last"]);
    }
    #[test]
    fn messages_are_stamped_in_arrival_order() {
        let (publisher, subscription) = Subscription::channel();
        let before = ArrivalStamp::now();
        publisher.publish("a".into());
        publisher.publish("b".into());
        let stamps: Vec<ArrivalStamp> = subscription.pending().map(|m| m.arrived).collect();
        assert!(before < stamps[0] && stamps[0] < stamps[1]);
        assert!(stamps[1] < ArrivalStamp::now());
    }
    #[test]
    fn backoff_doubles_until_capped_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(3));
        let t0 = Instant::now();
        assert!(!backoff.due(t0));
        assert!(!backoff.due(t0 + Duration::from_millis(500)));
        assert!(backoff.due(t0 + Duration::from_secs(1)));
        backoff.failed(t0 + Duration::from_secs(1));
        assert_eq!(backoff.delay(), Duration::from_secs(2));
        assert!(!backoff.due(t0 + Duration::from_secs(2)));
        assert!(backoff.due(t0 + Duration::from_secs(3)));
        backoff.failed(t0 + Duration::from_secs(3));
        assert_eq!(backoff.delay(), Duration::from_secs(3));
        backoff.reset();
        assert_eq!(backoff.delay(), Duration::from_secs(1));
        assert!(!backoff.due(t0 + Duration::from_secs(10)));
    }
}
