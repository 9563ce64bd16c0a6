use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::telemetry::compose::DerivedSeries;
use crate::telemetry::TelemetryError;
pub const DEFAULT_EXPORT_FILE: &str = "session_data_with_smoothing.json";
/// One JSON object per rendered sample, pass-through fields and smoothed value included.
pub fn to_json(series: &DerivedSeries) -> Result<String, TelemetryError> {
    Ok(serde_json::to_string(&series.samples)?)
}
pub fn write_json(series: &DerivedSeries, path: &Path) -> Result<(), TelemetryError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &series.samples)?;
    writer.flush()?;
    log::info!("exported {} samples to {}", series.len(), path.display());
    Ok(())
}
