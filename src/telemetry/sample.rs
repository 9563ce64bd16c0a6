use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use crate::telemetry::channel::Channel;
use crate::telemetry::TelemetryError;
/// Width of the time-axis label, `HH:MM:SS.d`.
pub const TIME_LABEL_LEN: usize = 10;
/// One telemetry observation, normalized from the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    /// Display label for the time axis.
    pub time: String,
    /// Epoch seconds, when the record carried a timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    pub actual_position: f64,
    pub actual_velocity: f64,
    pub phase_current: f64,
    pub voltage_logic: f64,
    /// Wire fields the console does not interpret, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl Sample {
    /// Normalizes a push-channel payload. A live sample must carry a usable timestamp.
    pub fn from_live(value: Value) -> Result<Self, TelemetryError> {
        Self::normalize(value, true)
    }
    /// Normalizes one historical record. A missing timestamp yields an empty time label.
    pub fn from_record(value: Value) -> Result<Self, TelemetryError> {
        Self::normalize(value, false)
    }
    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::ActualPosition => Some(self.actual_position),
            Channel::ActualVelocity => Some(self.actual_velocity),
            Channel::PhaseCurrent => Some(self.phase_current),
            Channel::VoltageLogic => Some(self.voltage_logic),
            Channel::PhaseCurrentRollingMean => None,
        }
    }
    fn normalize(value: Value, require_timestamp: bool) -> Result<Self, TelemetryError> {
        let Value::Object(mut fields) = value else {
            return Err(TelemetryError::MalformedMessage(
                "telemetry payload is not a JSON object".into(),
            ));
        };
        let timestamp = match fields.remove("timestamp") {
            Some(Value::Null) | None => None,
            Some(raw) => Some(parse_timestamp(&raw)?),
        };
        let time = match timestamp {
            Some(secs) => format_time(secs).ok_or_else(|| {
                TelemetryError::MalformedMessage(format!("timestamp {secs} is out of range"))
            })?,
            None if require_timestamp => {
                return Err(TelemetryError::MalformedMessage(
                    "live sample without timestamp".into(),
                ))
            }
            None => String::new(),
        };
        // A precomputed label on the wire is superseded by the one derived above.
        fields.remove("time");
        Ok(Self {
            time,
            timestamp,
            actual_position: take_channel(&mut fields, Channel::ActualPosition)?,
            actual_velocity: take_channel(&mut fields, Channel::ActualVelocity)?,
            phase_current: take_channel(&mut fields, Channel::PhaseCurrent)?,
            voltage_logic: take_channel(&mut fields, Channel::VoltageLogic)?,
            extra: fields,
        })
    }
}
fn take_channel(fields: &mut Map<String, Value>, channel: Channel) -> Result<f64, TelemetryError> {
    match fields.remove(channel.key()) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0)),
        Some(other) => Err(TelemetryError::MalformedMessage(format!(
            "channel `{}` is not numeric: {other}",
            channel.key()
        ))),
    }
}
/// Accepts epoch seconds or an ISO-8601 string (with or without offset, naive means UTC).
pub fn parse_timestamp(raw: &Value) -> Result<f64, TelemetryError> {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .filter(|secs| secs.is_finite())
            .ok_or_else(|| TelemetryError::MalformedMessage(format!("bad timestamp {n}"))),
        Value::String(s) => {
            let at = match DateTime::parse_from_rfc3339(s) {
                Ok(at) => at.with_timezone(&Utc),
                Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| Utc.from_utc_datetime(&naive))
                    .map_err(|e| {
                        TelemetryError::MalformedMessage(format!("bad timestamp `{s}`: {e}"))
                    })?,
            };
            Ok(at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1e9)
        }
        other => Err(TelemetryError::MalformedMessage(format!(
            "timestamp has unexpected type: {other}"
        ))),
    }
}
/// Formats epoch seconds as the UTC time-of-day label used on the time axis.
///
/// The instant is truncated to whole milliseconds first, then the label keeps the first
/// [`TIME_LABEL_LEN`] characters of `HH:MM:SS.mmm`.
pub fn format_time(epoch_secs: f64) -> Option<String> {
    if !epoch_secs.is_finite() {
        return None;
    }
    let millis = (epoch_secs * 1e3).trunc();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    let at = Utc.timestamp_millis_opt(millis as i64).single()?;
    let mut label = at.format("%H:%M:%S%.3f").to_string();
    label.truncate(TIME_LABEL_LEN);
    Some(label)
}
