// src/telemetry/mod.rs
pub mod buffer;
pub mod channel;
pub mod compose;
pub mod downsample;
pub mod error;
pub mod export;
pub mod history;
pub mod live;
pub mod pipeline;
pub mod plot;
pub mod sample;
pub mod smoothing;
pub mod zoom;
pub use buffer::{RingBuffer, DEFAULT_MAX_DATA_POINTS};
pub use channel::{Channel, ChannelSelection, SeriesColor, CHANNEL_GROUPS};
pub use compose::{compose, ChartFrame, ChartSeries, DerivedSeries, SmoothedSample};
pub use downsample::{downsample, DEFAULT_MAX_RENDER_POINTS};
pub use error::TelemetryError;
pub use export::DEFAULT_EXPORT_FILE;
pub use history::{
    FileHistory, HistoricalLoader, HistorySource, HttpHistory, LoadResult, LoadTicket, SessionId,
    StaticHistory,
};
pub use live::{
    ArrivalStamp, Backoff, DropReason, IngestGate, IngestOutcome, LiveFeed, LiveIngestor,
    LiveMessage, ManualFeed, SimulatedFeed, Subscription, TcpFeed,
};
pub use pipeline::{ChartSink, PipelineSettings, ProcessingStats, SessionState, TelemetryPipeline};
pub use plot::{render_chart_png, PlotStyle};
pub use sample::{format_time, Sample};
pub use smoothing::{rolling_mean, SmoothingWindow};
pub use zoom::ZoomWindow;
