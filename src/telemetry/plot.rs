use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::telemetry::compose::ChartFrame;
use crate::telemetry::zoom::ZoomWindow;
use crate::telemetry::TelemetryError;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub stroke_width: u32,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 400,
            background: RGBColor(255, 255, 255),
            stroke_width: 2,
        }
    }
}
/// Rasterizes the zoomed part of a composed chart to PNG, one line per series in its own color.
pub fn render_chart_png(
    frame: &ChartFrame,
    zoom: ZoomWindow,
    style: &PlotStyle,
) -> Result<Vec<u8>, TelemetryError> {
    if frame.is_empty() || frame.series.is_empty() {
        return Err(TelemetryError::Plot("chart frame has nothing to draw".into()));
    }
    let range = zoom.index_range(frame.len());
    let (y_min, y_max) = frame
        .series
        .iter()
        .flat_map(|s| s.values[range.clone()].iter().copied())
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let y_bounds = if (y_max - y_min).abs() < f64::EPSILON {
        (y_min - 1.0, y_max + 1.0)
    } else {
        let pad = (y_max - y_min) * 0.05;
        (y_min - pad, y_max + pad)
    };
    let x_end = (range.end - 1).max(range.start + 1) as f64;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(range.start as f64..x_end, y_bounds.0..y_bounds.1)?;
        for series in &frame.series {
            let color = RGBColor(series.color.r, series.color.g, series.color.b);
            let points = range
                .clone()
                .map(|i| (i as f64, series.values[i]));
            chart.draw_series(LineSeries::new(points, color.stroke_width(style.stroke_width)))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, TelemetryError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| TelemetryError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::channel::ChannelSelection;
    use crate::telemetry::compose::{compose, DerivedSeries};
    use crate::telemetry::smoothing::SmoothingWindow;
    use crate::telemetry::Sample;
    use serde_json::json;
    #[test]
    fn renders_png_for_zoomed_frame() {
        let samples: Vec<Sample> = (0..50)
            .map(|i| {
                Sample::from_live(json!({
                    "timestamp": i as f64,
                    "actual_position": (i as f64).sin(),
                    "phase_current": i
                }))
                .unwrap()
            })
            .collect();
        let derived = DerivedSeries::build(&samples, 2_000, SmoothingWindow::default());
        let frame = compose(&derived, &ChannelSelection::default());
        let png = render_chart_png(&frame, ZoomWindow::default(), &PlotStyle::default()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
    #[test]
    fn empty_frame_is_an_error() {
        let err = render_chart_png(&ChartFrame::default(), ZoomWindow::FULL, &PlotStyle::default())
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Plot(_)));
    }
}
