use std::ops::Range;
use serde::Serialize;
use crate::telemetry::TelemetryError;
/// Percentage interval `[start, end]` over the current composed series.
///
/// Expressed in percent rather than indices so an operator's view keeps its meaning while the
/// series grows or gets evicted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ZoomWindow {
    start: f64,
    end: f64,
}
impl ZoomWindow {
    pub const FULL: ZoomWindow = ZoomWindow {
        start: 0.0,
        end: 100.0,
    };
    pub fn new(start: f64, end: f64) -> Result<Self, TelemetryError> {
        let in_bounds = (0.0..=100.0).contains(&start) && (0.0..=100.0).contains(&end);
        if !in_bounds || start > end {
            return Err(TelemetryError::InvalidZoom { start, end });
        }
        Ok(Self { start, end })
    }
    pub fn start(self) -> f64 {
        self.start
    }
    pub fn end(self) -> f64 {
        self.end
    }
    /// Indices of a `len`-point series that fall inside the window. Non-empty whenever `len > 0`.
    pub fn index_range(self, len: usize) -> Range<usize> {
        if len == 0 {
            return 0..0;
        }
        let scale = len as f64 / 100.0;
        let lo = ((self.start * scale).floor() as usize).min(len - 1);
        let hi = ((self.end * scale).ceil() as usize).clamp(lo + 1, len);
        lo..hi
    }
}
impl Default for ZoomWindow {
    fn default() -> Self {
        Self {
            start: 55.0,
            end: 100.0,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_window_shows_latest_portion() {
        let zoom = ZoomWindow::default();
        assert_eq!(zoom.index_range(100), 55..100);
        assert_eq!(zoom.index_range(20), 11..20);
        assert_eq!(zoom.index_range(0), 0..0);
    }
    #[test]
    fn mapping_follows_series_growth() {
        let zoom = ZoomWindow::new(25.0, 75.0).unwrap();
        assert_eq!(zoom.index_range(8), 2..6);
        assert_eq!(zoom.index_range(2_000), 500..1_500);
        assert_eq!(ZoomWindow::FULL.index_range(7), 0..7);
    }
    #[test]
    fn degenerate_window_keeps_one_point() {
        let zoom = ZoomWindow::new(100.0, 100.0).unwrap();
        assert_eq!(zoom.index_range(10), 9..10);
    }
    #[test]
    fn rejects_out_of_range_bounds() {
        for (start, end) in [(-1.0, 50.0), (10.0, 101.0), (60.0, 40.0), (f64::NAN, 10.0)] {
            assert!(matches!(
                ZoomWindow::new(start, end),
                Err(TelemetryError::InvalidZoom { .. })
            ));
        }
    }
}
