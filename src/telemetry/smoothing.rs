use crate::telemetry::TelemetryError;
/// Trailing window length, always at least one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SmoothingWindow(usize);
impl SmoothingWindow {
    pub const DEFAULT: SmoothingWindow = SmoothingWindow(15);
    pub fn new(window: usize) -> Result<Self, TelemetryError> {
        if window == 0 {
            return Err(TelemetryError::InvalidSmoothingWindow(window));
        }
        Ok(Self(window))
    }
    pub fn get(self) -> usize {
        self.0
    }
}
impl Default for SmoothingWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}
/// Trailing simple moving average using a running sum.
///
/// Index `i` holds the mean of `values[i + 1 - window..=i]`; positions without a full window
/// of history are `0.0`.
pub fn rolling_mean(values: &[f64], window: SmoothingWindow) -> Vec<f64> {
    let window = window.get();
    let mut out = vec![0.0; values.len()];
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            let mean = sum / window as f64;
            out[i] = if mean.is_finite() { mean } else { 0.0 };
        }
    }
    out
}
