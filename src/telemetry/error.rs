use thiserror::Error;
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("historical fetch failed: {0}")]
    Transport(String),
    #[error("historical payload is not an ordered list: {0}")]
    InvalidFormat(String),
    #[error("malformed telemetry message: {0}")]
    MalformedMessage(String),
    #[error("stale response for session generation {actual}, current generation is {expected}")]
    StaleSession { expected: u64, actual: u64 },
    #[error("smoothing window must be at least 1, got {0}")]
    InvalidSmoothingWindow(usize),
    #[error("zoom window must satisfy 0 <= start <= end <= 100, got [{start}, {end}]")]
    InvalidZoom { start: f64, end: f64 },
    #[error("buffer capacity must be greater than zero")]
    InvalidCapacity,
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
impl From<ureq::Error> for TelemetryError {
    fn from(value: ureq::Error) -> Self {
        TelemetryError::Transport(value.to_string())
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for TelemetryError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        TelemetryError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for TelemetryError {
    fn from(value: image::ImageError) -> Self {
        TelemetryError::Plot(value.to_string())
    }
}
