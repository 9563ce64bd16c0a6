use serde::Serialize;
use crate::telemetry::channel::{Channel, ChannelSelection, SeriesColor};
use crate::telemetry::downsample::downsample;
use crate::telemetry::smoothing::{rolling_mean, SmoothingWindow};
use crate::telemetry::Sample;
/// A downsampled sample together with its smoothed phase current.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SmoothedSample {
    #[serde(flatten)]
    pub sample: Sample,
    pub phase_current_rolling_mean_large: f64,
}
impl SmoothedSample {
    pub fn value(&self, channel: Channel) -> f64 {
        if channel.is_smoothed() {
            self.phase_current_rolling_mean_large
        } else {
            self.sample.value(channel).unwrap_or(0.0)
        }
    }
}
/// Renderable snapshot of a buffer: downsampled, smoothed, with its time axis.
/// Always rebuilt from scratch, never edited.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DerivedSeries {
    pub samples: Vec<SmoothedSample>,
    pub time_axis: Vec<String>,
}
impl DerivedSeries {
    pub fn build<'a>(
        buffer: impl IntoIterator<Item = &'a Sample>,
        max_points: usize,
        window: SmoothingWindow,
    ) -> Self {
        let all: Vec<&Sample> = buffer.into_iter().collect();
        let picked = downsample(&all, max_points);
        let phase_current: Vec<f64> = picked.iter().map(|s| s.phase_current).collect();
        let smoothed = rolling_mean(&phase_current, window);
        let time_axis = picked.iter().map(|s| s.time.clone()).collect();
        let samples = picked
            .into_iter()
            .zip(smoothed)
            .map(|(sample, mean)| SmoothedSample {
                sample: sample.clone(),
                phase_current_rolling_mean_large: mean,
            })
            .collect();
        Self { samples, time_axis }
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
/// One chart line, aligned 1:1 with [`ChartFrame::time_axis`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSeries {
    #[serde(skip)]
    pub channel: Channel,
    pub key: &'static str,
    pub name: String,
    pub color: SeriesColor,
    pub values: Vec<f64>,
}
/// What the chart renderer consumes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChartFrame {
    pub time_axis: Vec<String>,
    pub series: Vec<ChartSeries>,
}
impl ChartFrame {
    pub fn series(&self, channel: Channel) -> Option<&ChartSeries> {
        self.series.iter().find(|s| s.channel == channel)
    }
    pub fn len(&self) -> usize {
        self.time_axis.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time_axis.is_empty()
    }
}
/// Materializes one series per visible channel. Values keep full precision; rounding is the
/// renderer's business.
pub fn compose(derived: &DerivedSeries, selection: &ChannelSelection) -> ChartFrame {
    let series = selection
        .visible()
        .map(|channel| ChartSeries {
            channel,
            key: channel.key(),
            name: channel.display_name(),
            color: channel.color(),
            values: derived.samples.iter().map(|s| s.value(channel)).collect(),
        })
        .collect();
    ChartFrame {
        time_axis: derived.time_axis.clone(),
        series,
    }
}
