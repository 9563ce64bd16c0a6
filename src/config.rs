use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::telemetry::{
    Channel, ChannelSelection, FileHistory, HistorySource, HttpHistory, LiveFeed,
    PipelineSettings, SessionId, SimulatedFeed, SmoothingWindow, TcpFeed, TelemetryError,
    ZoomWindow, DEFAULT_EXPORT_FILE, DEFAULT_MAX_DATA_POINTS, DEFAULT_MAX_RENDER_POINTS,
};
/// History source shared with the loader thread.
pub type SharedHistory = Box<dyn HistorySource + Send + Sync>;
/// Environment variable naming the config file when no path is passed on the command line.
pub const CONFIG_ENV: &str = "RIG_TELEMETRY_CONFIG";
/// Console settings. Every field has a default, so a partial file is fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub history_url: String,
    pub auth_token: Option<String>,
    pub history_timeout_secs: u64,
    /// Read sessions from `{history_dir}/{id}.json` instead of the backend.
    pub history_dir: Option<PathBuf>,
    /// `host:port` of the push channel; the simulated rig is used when unset.
    pub live_addr: Option<String>,
    pub max_data_points: usize,
    pub max_render_points: usize,
    pub smoothing_window: usize,
    pub zoom_start: f64,
    pub zoom_end: f64,
    /// Channel keys shown at startup; the console default when unset.
    pub visible_channels: Option<Vec<String>>,
    pub session_id: Option<SessionId>,
    pub session_active: bool,
    pub export_path: PathBuf,
}
impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            history_url: "http://127.0.0.1:8000".to_owned(),
            auth_token: None,
            history_timeout_secs: 10,
            history_dir: None,
            live_addr: None,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            max_render_points: DEFAULT_MAX_RENDER_POINTS,
            smoothing_window: SmoothingWindow::DEFAULT.get(),
            // the console opens zoomed onto the newest 45 %
            zoom_start: 55.0,
            zoom_end: 100.0,
            visible_channels: None,
            session_id: None,
            session_active: false,
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
        }
    }
}
impl ConsoleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
    /// Loads from `arg`, else from `$RIG_TELEMETRY_CONFIG`, else returns the defaults.
    pub fn discover(arg: Option<String>) -> Result<Self> {
        let path = arg.or_else(|| std::env::var(CONFIG_ENV).ok());
        match path {
            Some(path) => {
                log::info!("loading config from {path}");
                Self::load(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }
    pub fn validate(&self) -> Result<(), TelemetryError> {
        self.pipeline_settings().map(|_| ())
    }
    pub fn pipeline_settings(&self) -> Result<PipelineSettings, TelemetryError> {
        if self.max_data_points == 0 {
            return Err(TelemetryError::InvalidCapacity);
        }
        Ok(PipelineSettings {
            max_data_points: self.max_data_points,
            max_render_points: self.max_render_points,
            smoothing_window: SmoothingWindow::new(self.smoothing_window)?,
            zoom: ZoomWindow::new(self.zoom_start, self.zoom_end)?,
            selection: self.selection()?,
        })
    }
    fn selection(&self) -> Result<ChannelSelection, TelemetryError> {
        let Some(keys) = &self.visible_channels else {
            return Ok(ChannelSelection::default());
        };
        let mut selection = ChannelSelection::none();
        for key in keys {
            selection.set(key.parse::<Channel>()?, true);
        }
        Ok(selection)
    }
    pub fn history_source(&self) -> SharedHistory {
        match &self.history_dir {
            Some(dir) => Box::new(FileHistory::new(dir.clone())),
            None => Box::new(HttpHistory::new(
                self.history_url.clone(),
                self.auth_token.clone(),
                Duration::from_secs(self.history_timeout_secs),
            )),
        }
    }
    pub fn live_feed(&self) -> Box<dyn LiveFeed> {
        match &self.live_addr {
            Some(addr) => Box::new(TcpFeed::new(addr.clone())),
            None => Box::new(SimulatedFeed::default()),
        }
    }
}
