// src/gui.rs
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{Legend, Line, Plot, PlotPoint, PlotPoints};
use rig_telemetry::config::{ConsoleConfig, SharedHistory};
use rig_telemetry::telemetry::{
    render_chart_png, Backoff, ChartFrame, ChartSink, HistoricalLoader, LiveFeed, LoadResult,
    PlotStyle, SessionState, Subscription, TelemetryPipeline, ZoomWindow, CHANNEL_GROUPS,
};
const LEGEND_MAX_CHARS: usize = 20;
const LOG_LINES: usize = 8;
/// Last frame and zoom the pipeline pushed; the plot draws from here.
#[derive(Default)]
struct PlotSink {
    frame: ChartFrame,
    zoom: Option<ZoomWindow>,
}
impl ChartSink for PlotSink {
    fn render(&mut self, frame: &ChartFrame) {
        self.frame = frame.clone();
    }
    fn apply_zoom(&mut self, zoom: ZoomWindow) {
        self.zoom = Some(zoom);
    }
}
pub struct ConsoleApp {
    config: ConsoleConfig,
    pipeline: TelemetryPipeline,
    loader: Arc<HistoricalLoader<SharedHistory>>,
    feed: Box<dyn LiveFeed>,
    subscription: Option<Subscription>,
    reconnect: Backoff,
    load_tx: Sender<LoadResult>,
    load_rx: Receiver<LoadResult>,
    plot: PlotSink,
    // operator inputs
    session_input: String,
    session_active: bool,
    window_input: usize,
    zoom_start: f64,
    zoom_end: f64,
    log_messages: Vec<String>,
}
impl ConsoleApp {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let settings = config
            .pipeline_settings()
            .context("config does not describe a valid pipeline")?;
        let pipeline = TelemetryPipeline::new(settings)?;
        let loader = Arc::new(HistoricalLoader::new(
            config.history_source(),
            config.max_data_points,
        ));
        let (load_tx, load_rx) = channel();
        let mut app = Self {
            session_input: config.session_id.map(|id| id.to_string()).unwrap_or_default(),
            session_active: config.session_active,
            window_input: settings.smoothing_window.get(),
            zoom_start: settings.zoom.start(),
            zoom_end: settings.zoom.end(),
            feed: config.live_feed(),
            config,
            pipeline,
            loader,
            subscription: None,
            reconnect: Backoff::default(),
            load_tx,
            load_rx,
            plot: PlotSink::default(),
            log_messages: vec!["Rig telemetry console ready.".to_owned()],
        };
        app.connect_feed();
        if app.config.session_id.is_some() {
            app.select_session();
        }
        Ok(app)
    }
    fn log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::info!("{msg}");
        self.log_messages.push(format!("> {msg}"));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }
    fn connect_feed(&mut self) {
        if let Some(old) = self.subscription.take() {
            old.cancel();
        }
        match self.feed.subscribe() {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.reconnect.reset();
                self.log("Live feed subscribed");
            }
            Err(e) => {
                self.reconnect.failed(Instant::now());
                let retry = self.reconnect.delay().as_secs_f32();
                self.log(format!("Live feed unavailable: {e} (retry in {retry:.1}s)"));
            }
        }
    }
    fn select_session(&mut self) {
        let input = self.session_input.trim();
        let session_id = if input.is_empty() {
            None
        } else {
            match input.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    let msg = format!("'{input}' is not a session id");
                    self.log(msg);
                    return;
                }
            }
        };
        if let Some(ticket) = self.pipeline.select_session(session_id, self.session_active) {
            self.loader.spawn(ticket, self.load_tx.clone());
            self.log(format!("Loading session {}", ticket.session_id));
        }
    }
    fn poll_background(&mut self) {
        // drain live messages first so anything queued during a load is judged against Loading
        let closed = match &self.subscription {
            Some(subscription) => {
                self.pipeline.pump(subscription);
                subscription.is_closed()
            }
            None => false,
        };
        if closed {
            self.subscription = None;
            self.log("Live feed closed");
        }
        if self.subscription.is_none() && self.reconnect.due(Instant::now()) {
            self.connect_feed();
        }
        while let Ok(result) = self.load_rx.try_recv() {
            let session_id = result.ticket.session_id;
            match self.pipeline.complete_load(result) {
                Ok(()) => self.log(format!(
                    "Session {session_id}: {} samples",
                    self.pipeline.buffer().len()
                )),
                Err(e) => self.log(format!("Session {session_id}: {e}")),
            }
        }
        self.pipeline.sync(&mut self.plot);
        if let Some(zoom) = self.plot.zoom {
            self.zoom_start = zoom.start();
            self.zoom_end = zoom.end();
        }
    }
    fn export_json(&mut self) {
        let path = self.config.export_path.clone();
        match self.pipeline.export_to(&path) {
            Ok(()) => self.log(format!("Exported {}", path.display())),
            Err(e) => self.log(format!("Export failed: {e}")),
        }
    }
    fn export_png(&mut self) {
        let path = self.config.export_path.with_extension("png");
        let frame = self.pipeline.chart();
        let written = render_chart_png(&frame, self.pipeline.zoom(), &PlotStyle::default())
            .and_then(|png| std::fs::write(&path, png).map_err(Into::into));
        match written {
            Ok(()) => self.log(format!("Saved {}", path.display())),
            Err(e) => self.log(format!("Snapshot failed: {e}")),
        }
    }
    fn status_line(&self) -> String {
        let state = match self.pipeline.state() {
            SessionState::NoSession => "No session".to_owned(),
            SessionState::Loading { session_id } => format!("Session {session_id}: loading..."),
            SessionState::Populated { session_id } => format!("Session {session_id}"),
            SessionState::Failed { session_id, reason } => {
                format!("Session {session_id}: {reason}")
            }
        };
        let buffer = self.pipeline.buffer();
        let stats = self.pipeline.stats();
        let ingestor = self.pipeline.ingestor();
        let feed = if self.subscription.is_some() { "up" } else { "down" };
        let processing = format!(
            "Last Data Processing: {:.2}ms | Total Processes: {}",
            stats.last_duration.as_secs_f64() * 1e3,
            stats.recompositions
        );
        format!(
            "{state} | {}/{} samples | live {feed}: {} in, {} dropped | {processing}",
            buffer.len(),
            buffer.capacity(),
            ingestor.admitted(),
            ingestor.dropped(),
        )
    }
    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Session");
        ui.horizontal(|ui| {
            ui.label("ID");
            ui.text_edit_singleline(&mut self.session_input);
        });
        if ui.checkbox(&mut self.session_active, "Active").changed() {
            self.pipeline.set_session_active(self.session_active);
        }
        ui.horizontal(|ui| {
            if ui.button("Load").clicked() {
                self.select_session();
            }
            if ui.button("Close").clicked() {
                self.pipeline.close();
                self.log("Session closed");
            }
            if ui.button("Reconnect feed").clicked() {
                self.connect_feed();
            }
        });
        ui.separator();
        for (group, channels) in CHANNEL_GROUPS {
            ui.label(RichText::new(group).strong());
            for &channel in channels {
                let mut visible = self.pipeline.selection().is_visible(channel);
                let color = channel.color();
                let text = RichText::new(channel.display_name())
                    .color(Color32::from_rgb(color.r, color.g, color.b));
                if ui.checkbox(&mut visible, text).changed() {
                    self.pipeline.set_selection(channel, visible);
                }
            }
        }
        ui.separator();
        let window = ui.add(egui::Slider::new(&mut self.window_input, 1..=200).text("smoothing"));
        if window.changed() {
            if let Err(e) = self.pipeline.set_smoothing_window(self.window_input) {
                self.window_input = self.pipeline.smoothing_window().get();
                self.log(e.to_string());
            }
        }
        ui.label("Zoom Range");
        let start = ui.add(egui::Slider::new(&mut self.zoom_start, 0.0..=100.0).text("start"));
        let end = ui.add(egui::Slider::new(&mut self.zoom_end, 0.0..=100.0).text("end"));
        if start.changed() || end.changed() {
            if self.pipeline.set_zoom(self.zoom_start, self.zoom_end).is_err() {
                let zoom = self.pipeline.zoom();
                self.zoom_start = zoom.start();
                self.zoom_end = zoom.end();
            }
        }
        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Export JSON (with smoothing)").clicked() {
                self.export_json();
            }
            if ui.button("Save PNG").clicked() {
                self.export_png();
            }
        });
        ui.add_space(10.0);
        egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
            for m in &self.log_messages {
                ui.monospace(m);
            }
        });
    }
    fn chart(&self, ui: &mut egui::Ui) {
        let frame = &self.plot.frame;
        if frame.is_empty() {
            ui.label("No Data Available");
            return;
        }
        let range = self.plot.zoom.unwrap_or_default().index_range(frame.len());
        let axis = frame.time_axis.clone();
        Plot::new("telemetry")
            .legend(Legend::default())
            .height(400.0)
            .auto_bounds_x()
            .auto_bounds_y()
            // the zoom sliders own the visible range
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .allow_double_click_reset(false)
            .label_formatter(move |name, point: &PlotPoint| {
                let time = axis
                    .get(point.x.round().max(0.0) as usize)
                    .map(String::as_str)
                    .unwrap_or("");
                if name.is_empty() {
                    format!("Time: {time}")
                } else {
                    format!("Time: {time}\n{name}: {:.4}", point.y)
                }
            })
            .show(ui, |plot_ui| {
                for series in &frame.series {
                    let points: Vec<[f64; 2]> = range
                        .clone()
                        .map(|i| [i as f64, series.values[i]])
                        .collect();
                    let color = Color32::from_rgb(series.color.r, series.color.g, series.color.b);
                    plot_ui.line(
                        Line::new(PlotPoints::new(points))
                            .name(legend_label(&series.name))
                            .color(color)
                            .width(2.0),
                    );
                }
            });
        if let (Some(first), Some(last)) = (
            frame.time_axis.get(range.start),
            frame.time_axis.get(range.end.saturating_sub(1)),
        ) {
            ui.label(format!("{first} to {last}"));
        }
    }
}
/// Legend entries longer than the legend can hold get shortened.
fn legend_label(name: &str) -> String {
    if name.chars().count() > LEGEND_MAX_CHARS {
        let head: String = name.chars().take(LEGEND_MAX_CHARS - 2).collect();
        format!("{head}...")
    } else {
        name.to_owned()
    }
}
impl eframe::App for ConsoleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background();
        egui::SidePanel::left("controls").min_width(280.0).show(ctx, |ui| {
            self.controls(ui);
        });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(RichText::new(self.status_line()).small());
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart(ui);
        });
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
