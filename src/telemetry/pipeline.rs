use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::telemetry::channel::{Channel, ChannelSelection};
use crate::telemetry::compose::{compose, ChartFrame, DerivedSeries};
use crate::telemetry::downsample::DEFAULT_MAX_RENDER_POINTS;
use crate::telemetry::export;
use crate::telemetry::history::{LoadResult, LoadTicket, SessionId};
use crate::telemetry::live::{
    ArrivalStamp, IngestGate, IngestOutcome, LiveIngestor, LiveMessage, Subscription,
};
use crate::telemetry::smoothing::SmoothingWindow;
use crate::telemetry::zoom::ZoomWindow;
use crate::telemetry::{RingBuffer, TelemetryError, DEFAULT_MAX_DATA_POINTS};
/// Lifecycle of the session currently shown.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    NoSession,
    /// Historical fetch in flight; live ingestion is closed.
    Loading { session_id: SessionId },
    /// Buffer holds history; live samples are admitted while the session is active.
    Populated { session_id: SessionId },
    /// Historical fetch failed; the buffer stays empty.
    Failed { session_id: SessionId, reason: String },
}
impl SessionState {
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionState::NoSession => None,
            SessionState::Loading { session_id }
            | SessionState::Populated { session_id }
            | SessionState::Failed { session_id, .. } => Some(*session_id),
        }
    }
}
/// Receives rebuilt frames and the zoom interval; the chart renderer implements this.
pub trait ChartSink {
    fn render(&mut self, frame: &ChartFrame);
    fn apply_zoom(&mut self, zoom: ZoomWindow);
}
#[derive(Clone, Copy, Debug)]
pub struct PipelineSettings {
    pub max_data_points: usize,
    pub max_render_points: usize,
    pub smoothing_window: SmoothingWindow,
    pub zoom: ZoomWindow,
    pub selection: ChannelSelection,
}
impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            max_render_points: DEFAULT_MAX_RENDER_POINTS,
            smoothing_window: SmoothingWindow::default(),
            zoom: ZoomWindow::default(),
            selection: ChannelSelection::default(),
        }
    }
}
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProcessingStats {
    pub last_duration: Duration,
    pub recompositions: u64,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DerivedKey {
    generation: u64,
    version: u64,
    window: SmoothingWindow,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChartKey {
    derived: DerivedKey,
    selection: ChannelSelection,
}
/// Owns one session view: buffer, admission gate, memoized derived series and zoom.
pub struct TelemetryPipeline {
    buffer: RingBuffer,
    ingestor: LiveIngestor,
    state: SessionState,
    // gate openings; a message is admitted only if it arrived after both
    populated_at: Option<ArrivalStamp>,
    active_since: Option<ArrivalStamp>,
    generation: u64,
    max_render_points: usize,
    window: SmoothingWindow,
    selection: ChannelSelection,
    zoom: ZoomWindow,
    derived: Option<(DerivedKey, Arc<DerivedSeries>)>,
    chart: Option<(ChartKey, Arc<ChartFrame>)>,
    synced: Option<ChartKey>,
    zoom_dirty: bool,
    stats: ProcessingStats,
}
impl TelemetryPipeline {
    pub fn new(settings: PipelineSettings) -> Result<Self, TelemetryError> {
        Ok(Self {
            buffer: RingBuffer::with_capacity(settings.max_data_points)?,
            ingestor: LiveIngestor::default(),
            state: SessionState::NoSession,
            populated_at: None,
            active_since: None,
            generation: 0,
            max_render_points: settings.max_render_points,
            window: settings.smoothing_window,
            selection: settings.selection,
            zoom: settings.zoom,
            derived: None,
            chart: None,
            synced: None,
            zoom_dirty: true,
            stats: ProcessingStats::default(),
        })
    }
    pub fn state(&self) -> &SessionState {
        &self.state
    }
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn session_active(&self) -> bool {
        self.active_since.is_some()
    }
    pub fn selection(&self) -> &ChannelSelection {
        &self.selection
    }
    pub fn smoothing_window(&self) -> SmoothingWindow {
        self.window
    }
    pub fn zoom(&self) -> ZoomWindow {
        self.zoom
    }
    pub fn stats(&self) -> ProcessingStats {
        self.stats
    }
    pub fn ingestor(&self) -> &LiveIngestor {
        &self.ingestor
    }
    /// Switches the view to another session (or none).
    ///
    /// Prior buffer and derived state are disposed before this returns, so nothing from the old
    /// session can be admitted or rendered afterwards. The returned ticket must accompany the
    /// historical fetch result.
    pub fn select_session(
        &mut self,
        session_id: Option<SessionId>,
        active: bool,
    ) -> Option<LoadTicket> {
        self.dispose();
        self.generation += 1;
        self.active_since = active.then(ArrivalStamp::now);
        match session_id {
            Some(session_id) => {
                log::info!(
                    "session {session_id} selected (generation {}, active: {active})",
                    self.generation
                );
                self.state = SessionState::Loading { session_id };
                Some(LoadTicket {
                    session_id,
                    generation: self.generation,
                })
            }
            None => {
                log::info!("no session selected");
                self.state = SessionState::NoSession;
                None
            }
        }
    }
    /// Unmounts the view.
    pub fn close(&mut self) {
        self.select_session(None, false);
    }
    /// Activation only admits messages that arrive after it; anything queued earlier is dropped.
    pub fn set_session_active(&mut self, active: bool) {
        match (active, self.active_since) {
            (true, None) => self.active_since = Some(ArrivalStamp::now()),
            (false, _) => self.active_since = None,
            (true, Some(_)) => {}
        }
    }
    /// Applies a resolved historical fetch if it still belongs to the current session.
    pub fn complete_load(&mut self, result: LoadResult) -> Result<(), TelemetryError> {
        let LoadResult { ticket, outcome } = result;
        let awaiting = matches!(
            self.state,
            SessionState::Loading { session_id } if session_id == ticket.session_id
        );
        if ticket.generation != self.generation || !awaiting {
            log::warn!(
                "discarding history for session {} (generation {}, current {})",
                ticket.session_id,
                ticket.generation,
                self.generation
            );
            return Err(TelemetryError::StaleSession {
                expected: self.generation,
                actual: ticket.generation,
            });
        }
        match outcome {
            Ok(samples) => {
                self.buffer.replace(samples);
                self.populated_at = Some(ArrivalStamp::now());
                log::info!(
                    "session {} populated with {} samples",
                    ticket.session_id,
                    self.buffer.len()
                );
                self.state = SessionState::Populated {
                    session_id: ticket.session_id,
                };
                Ok(())
            }
            Err(err) => {
                self.buffer.clear();
                self.state = SessionState::Failed {
                    session_id: ticket.session_id,
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }
    /// Ingests a message arriving now.
    pub fn ingest_live(&mut self, raw: &str) -> IngestOutcome {
        self.ingest_arrived(raw, ArrivalStamp::now())
    }
    /// Ingests a message under the gate as it stood when the message arrived, so anything
    /// queued while history was loading or the session was inactive stays out.
    pub fn ingest_message(&mut self, message: &LiveMessage) -> IngestOutcome {
        self.ingest_arrived(&message.payload, message.arrived)
    }
    fn ingest_arrived(&mut self, raw: &str, arrived: ArrivalStamp) -> IngestOutcome {
        let gate = IngestGate {
            history_ready: self.populated_at.map_or(false, |at| arrived > at),
            session_active: self.active_since.map_or(false, |at| arrived > at),
        };
        let outcome = self.ingestor.ingest(raw, gate, &mut self.buffer);
        if let IngestOutcome::Admitted { evicted } = outcome {
            log::debug!("live sample admitted ({evicted} evicted)");
        }
        outcome
    }
    /// Drains everything pending on `subscription`; returns how many samples were admitted.
    pub fn pump(&mut self, subscription: &Subscription) -> usize {
        subscription
            .pending()
            .filter(|message| {
                matches!(self.ingest_message(message), IngestOutcome::Admitted { .. })
            })
            .count()
    }
    pub fn set_selection(&mut self, channel: Channel, visible: bool) {
        self.selection.set(channel, visible);
    }
    pub fn toggle_channel(&mut self, channel: Channel) {
        self.selection.toggle(channel);
    }
    pub fn set_smoothing_window(&mut self, window: usize) -> Result<(), TelemetryError> {
        match SmoothingWindow::new(window) {
            Ok(window) => {
                self.window = window;
                Ok(())
            }
            Err(err) => {
                log::warn!("keeping smoothing window {}: {err}", self.window.get());
                Err(err)
            }
        }
    }
    pub fn set_zoom(&mut self, start: f64, end: f64) -> Result<(), TelemetryError> {
        let zoom = ZoomWindow::new(start, end).map_err(|err| {
            log::warn!("keeping zoom [{}, {}]: {err}", self.zoom.start(), self.zoom.end());
            err
        })?;
        if zoom != self.zoom {
            self.zoom = zoom;
            self.zoom_dirty = true;
        }
        Ok(())
    }
    /// Downsampled and smoothed view of the buffer, rebuilt only when its inputs changed.
    pub fn derived(&mut self) -> Arc<DerivedSeries> {
        let key = self.derived_key();
        if let Some((cached, series)) = &self.derived {
            if *cached == key {
                return Arc::clone(series);
            }
        }
        let started = Instant::now();
        let series = Arc::new(DerivedSeries::build(
            self.buffer.iter(),
            self.max_render_points,
            self.window,
        ));
        self.stats.last_duration = started.elapsed();
        self.stats.recompositions += 1;
        log::debug!(
            "recomposed {} of {} samples in {:?}",
            series.len(),
            self.buffer.len(),
            self.stats.last_duration
        );
        self.derived = Some((key, Arc::clone(&series)));
        series
    }
    /// Chart-ready series for the current selection. Selection changes reuse [`Self::derived`].
    pub fn chart(&mut self) -> Arc<ChartFrame> {
        let key = self.chart_key();
        if let Some((cached, frame)) = &self.chart {
            if *cached == key {
                return Arc::clone(frame);
            }
        }
        let derived = self.derived();
        let frame = Arc::new(compose(&derived, &self.selection));
        self.chart = Some((key, Arc::clone(&frame)));
        frame
    }
    /// Pushes pending changes into the renderer. A rebuilt frame always gets the zoom reasserted
    /// so the operator's view survives data growth. Returns true if anything was sent.
    pub fn sync(&mut self, sink: &mut dyn ChartSink) -> bool {
        let key = self.chart_key();
        let rebuilt = self.synced != Some(key);
        if rebuilt {
            let frame = self.chart();
            sink.render(&frame);
            self.synced = Some(key);
        }
        let reassert = rebuilt || self.zoom_dirty;
        if reassert {
            sink.apply_zoom(self.zoom);
            self.zoom_dirty = false;
        }
        reassert
    }
    /// Raw JSON of the current derived series, smoothed channel included.
    pub fn export_json(&mut self) -> Result<String, TelemetryError> {
        export::to_json(&self.derived())
    }
    pub fn export_to(&mut self, path: &Path) -> Result<(), TelemetryError> {
        export::write_json(&self.derived(), path)
    }
    fn dispose(&mut self) {
        if let Some(session_id) = self.state.session_id() {
            log::info!("session {session_id} cleared");
        }
        self.buffer.clear();
        self.populated_at = None;
        self.derived = None;
        self.chart = None;
        self.synced = None;
    }
    fn derived_key(&self) -> DerivedKey {
        DerivedKey {
            generation: self.generation,
            version: self.buffer.version(),
            window: self.window,
        }
    }
    fn chart_key(&self) -> ChartKey {
        ChartKey {
            derived: self.derived_key(),
            selection: self.selection,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::history::{HistoricalLoader, StaticHistory};
    use crate::telemetry::live::{DropReason, LiveFeed, ManualFeed};
    use serde_json::{json, Value};
    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<ChartFrame>,
        zooms: Vec<ZoomWindow>,
    }
    impl ChartSink for RecordingSink {
        fn render(&mut self, frame: &ChartFrame) {
            self.frames.push(frame.clone());
        }
        fn apply_zoom(&mut self, zoom: ZoomWindow) {
            self.zooms.push(zoom);
        }
    }
    fn history(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| json!({ "timestamp": i as f64, "actual_position": i, "phase_current": i }))
                .collect(),
        )
    }
    fn live(timestamp: f64) -> String {
        json!({ "timestamp": timestamp, "dbw": true, "actual_position": timestamp }).to_string()
    }
    fn pipeline(capacity: usize) -> TelemetryPipeline {
        TelemetryPipeline::new(PipelineSettings {
            max_data_points: capacity,
            ..PipelineSettings::default()
        })
        .unwrap()
    }
    fn loader() -> HistoricalLoader<StaticHistory> {
        HistoricalLoader::new(StaticHistory::new([(1, history(3)), (2, history(5))]), 4)
    }
    #[test]
    fn late_response_for_superseded_session_is_discarded() {
        let mut pipeline = pipeline(10);
        let loader = loader();
        let first = pipeline.select_session(Some(1), true).unwrap();
        let second = pipeline.select_session(Some(2), true).unwrap();
        let stale = pipeline.complete_load(loader.load(first));
        assert!(matches!(stale, Err(TelemetryError::StaleSession { .. })));
        assert!(pipeline.buffer().is_empty());
        assert_eq!(pipeline.state(), &SessionState::Loading { session_id: 2 });
        pipeline.complete_load(loader.load(second)).unwrap();
        assert_eq!(pipeline.state(), &SessionState::Populated { session_id: 2 });
        let positions: Vec<f64> = pipeline.buffer().iter().map(|s| s.actual_position).collect();
        assert_eq!(positions, vec![1.0, 2.0, 3.0, 4.0]);
    }
    #[test]
    fn reselecting_same_session_invalidates_older_ticket() {
        let mut pipeline = pipeline(10);
        let loader = loader();
        let old = pipeline.select_session(Some(1), false).unwrap();
        pipeline.select_session(Some(1), false).unwrap();
        assert!(pipeline.complete_load(loader.load(old)).is_err());
        assert!(pipeline.buffer().is_empty());
    }
    #[test]
    fn live_ingestion_waits_for_history() {
        let mut pipeline = pipeline(10);
        let ticket = pipeline.select_session(Some(1), true).unwrap();
        assert_eq!(
            pipeline.ingest_live(&live(10.0)),
            IngestOutcome::Dropped(DropReason::AwaitingHistory)
        );
        pipeline.complete_load(loader().load(ticket)).unwrap();
        assert!(matches!(
            pipeline.ingest_live(&live(11.0)),
            IngestOutcome::Admitted { .. }
        ));
        assert_eq!(pipeline.buffer().len(), 4);
        pipeline.select_session(Some(2), true);
        assert_eq!(
            pipeline.ingest_live(&live(12.0)),
            IngestOutcome::Dropped(DropReason::AwaitingHistory)
        );
        assert!(pipeline.buffer().is_empty());
    }
    #[test]
    fn inactive_session_admits_nothing() {
        let mut pipeline = pipeline(10);
        let ticket = pipeline.select_session(Some(1), false).unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        let feed = ManualFeed::new((0..5).map(|i| live(100.0 + i as f64)));
        let subscription = feed.subscribe().unwrap();
        assert_eq!(pipeline.pump(&subscription), 0);
        pipeline.set_session_active(true);
        let subscription = feed.subscribe().unwrap();
        assert_eq!(pipeline.pump(&subscription), 5);
        assert_eq!(pipeline.buffer().len(), 8);
    }
    #[test]
    fn capacity_evicts_live_overflow() {
        let mut pipeline = pipeline(3);
        let ticket = pipeline.select_session(Some(1), true).unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        for t in [10.0, 11.0] {
            pipeline.ingest_live(&live(t));
        }
        let positions: Vec<f64> = pipeline.buffer().iter().map(|s| s.actual_position).collect();
        assert_eq!(positions, vec![2.0, 10.0, 11.0]);
    }
    #[test]
    fn failed_fetch_leaves_explicit_error_and_empty_buffer() {
        let mut pipeline = pipeline(10);
        let broken = HistoricalLoader::new(StaticHistory::new([(5, json!({"error": "nope"}))]), 10);
        let ticket = pipeline.select_session(Some(5), true).unwrap();
        let err = pipeline.complete_load(broken.load(ticket)).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFormat(_)));
        assert!(matches!(pipeline.state(), SessionState::Failed { session_id: 5, .. }));
        assert!(pipeline.buffer().is_empty());
        assert_eq!(
            pipeline.ingest_live(&live(1.0)),
            IngestOutcome::Dropped(DropReason::AwaitingHistory)
        );
    }
    #[test]
    fn no_session_is_empty_not_an_error() {
        let mut pipeline = pipeline(10);
        assert!(pipeline.select_session(None, true).is_none());
        assert_eq!(pipeline.state(), &SessionState::NoSession);
        assert!(pipeline.chart().is_empty());
    }
    #[test]
    fn derived_series_is_memoized_per_input() {
        let mut pipeline = pipeline(10);
        let ticket = pipeline.select_session(Some(2), true).unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        let first = pipeline.derived();
        assert!(Arc::ptr_eq(&first, &pipeline.derived()));
        pipeline.toggle_channel(Channel::VoltageLogic);
        let chart = pipeline.chart();
        assert!(chart.series(Channel::VoltageLogic).is_some());
        assert!(Arc::ptr_eq(&first, &pipeline.derived()));
        assert_eq!(pipeline.stats().recompositions, 1);
        pipeline.ingest_live(&live(50.0));
        assert!(!Arc::ptr_eq(&first, &pipeline.derived()));
        pipeline.set_smoothing_window(2).unwrap();
        pipeline.derived();
        assert_eq!(pipeline.stats().recompositions, 3);
    }
    #[test]
    fn invalid_setters_keep_prior_state() {
        let mut pipeline = pipeline(10);
        pipeline.set_smoothing_window(4).unwrap();
        assert!(pipeline.set_smoothing_window(0).is_err());
        assert_eq!(pipeline.smoothing_window().get(), 4);
        pipeline.set_zoom(10.0, 20.0).unwrap();
        assert!(pipeline.set_zoom(30.0, 5.0).is_err());
        assert_eq!(pipeline.zoom(), ZoomWindow::new(10.0, 20.0).unwrap());
    }
    #[test]
    fn zoom_is_reasserted_after_every_rebuild() {
        let mut pipeline = pipeline(10);
        let mut sink = RecordingSink::default();
        let ticket = pipeline.select_session(Some(1), true).unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        assert!(pipeline.sync(&mut sink));
        assert_eq!((sink.frames.len(), sink.zooms.len()), (1, 1));
        assert!(!pipeline.sync(&mut sink));
        pipeline.set_zoom(20.0, 80.0).unwrap();
        pipeline.sync(&mut sink);
        assert_eq!((sink.frames.len(), sink.zooms.len()), (1, 2));
        pipeline.ingest_live(&live(9.0));
        pipeline.sync(&mut sink);
        assert_eq!((sink.frames.len(), sink.zooms.len()), (2, 3));
        assert_eq!(sink.zooms[2], ZoomWindow::new(20.0, 80.0).unwrap());
        assert_eq!(sink.frames[1].len(), 4);
    }
    #[test]
    fn export_contains_smoothed_channel() {
        let mut pipeline = pipeline(10);
        pipeline.set_smoothing_window(2).unwrap();
        let ticket = pipeline.select_session(Some(1), true).unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        let exported: Value = serde_json::from_str(&pipeline.export_json().unwrap()).unwrap();
        let rows = exported.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["phase_current_rolling_mean_large"], json!(1.5));
        assert_eq!(rows[0]["time"], json!("00:00:00.0"));
    }
    #[test]
    fn messages_queued_while_loading_are_never_admitted() {
        let mut pipeline = pipeline(10);
        let ticket = pipeline.select_session(Some(1), true).unwrap();
        let feed = ManualFeed::new((0..5).map(|i| live(100.0 + i as f64)));
        let queued = feed.subscribe().unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        assert_eq!(pipeline.pump(&queued), 0);
        assert_eq!(pipeline.buffer().len(), 3);
        assert_eq!(pipeline.ingestor().dropped(), 5);
        let fresh = feed.subscribe().unwrap();
        assert_eq!(pipeline.pump(&fresh), 5);
        assert_eq!(pipeline.buffer().len(), 8);
    }
    #[test]
    fn messages_queued_while_inactive_stay_out_after_activation() {
        let mut pipeline = pipeline(10);
        let ticket = pipeline.select_session(Some(1), false).unwrap();
        pipeline.complete_load(loader().load(ticket)).unwrap();
        let feed = ManualFeed::new([live(7.0), live(8.0)]);
        let queued = feed.subscribe().unwrap();
        pipeline.set_session_active(true);
        assert_eq!(pipeline.pump(&queued), 0);
        assert!(matches!(
            pipeline.ingest_live(&live(9.0)),
            IngestOutcome::Admitted { .. }
        ));
        assert_eq!(pipeline.buffer().len(), 4);
    }
}
