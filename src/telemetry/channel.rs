use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Serializer};
use crate::telemetry::TelemetryError;
/// Named numeric quantities the console can chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    ActualPosition,
    ActualVelocity,
    PhaseCurrent,
    /// Trailing mean of [`Channel::PhaseCurrent`], produced by the smoother.
    PhaseCurrentRollingMean,
    VoltageLogic,
}
impl Channel {
    /// Emission order of composed series.
    pub const ALL: [Channel; 5] = [
        Channel::ActualPosition,
        Channel::ActualVelocity,
        Channel::PhaseCurrent,
        Channel::PhaseCurrentRollingMean,
        Channel::VoltageLogic,
    ];
    pub fn key(self) -> &'static str {
        match self {
            Channel::ActualPosition => "actual_position",
            Channel::ActualVelocity => "actual_velocity",
            Channel::PhaseCurrent => "phase_current",
            Channel::PhaseCurrentRollingMean => "phase_current_rolling_mean_large",
            Channel::VoltageLogic => "voltage_logic",
        }
    }
    pub fn display_name(self) -> String {
        self.key().replace('_', " ")
    }
    pub fn color(self) -> SeriesColor {
        match self {
            Channel::ActualPosition => SeriesColor::rgb(0x43, 0x61, 0xEE),
            Channel::ActualVelocity => SeriesColor::rgb(0x3A, 0x0C, 0xA3),
            Channel::PhaseCurrent => SeriesColor::rgb(0xF7, 0x25, 0x85),
            Channel::PhaseCurrentRollingMean => SeriesColor::rgb(0xFF, 0x9E, 0x00),
            Channel::VoltageLogic => SeriesColor::rgb(0x4C, 0xC9, 0xF0),
        }
    }
    pub fn is_smoothed(self) -> bool {
        self == Channel::PhaseCurrentRollingMean
    }
}
impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
impl FromStr for Channel {
    type Err = TelemetryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.key() == s)
            .ok_or_else(|| TelemetryError::UnknownChannel(s.to_string()))
    }
}
/// Operator-facing grouping of the channel toggles.
pub const CHANNEL_GROUPS: [(&str, &[Channel]); 2] = [
    (
        "Original Data",
        &[
            Channel::ActualPosition,
            Channel::ActualVelocity,
            Channel::PhaseCurrent,
            Channel::VoltageLogic,
        ],
    ),
    ("Smoothed Phase Current", &[Channel::PhaseCurrentRollingMean]),
];
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeriesColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
impl SeriesColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}
impl Serialize for SeriesColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}
/// Which channels are currently materialized as series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelSelection {
    visible: [bool; Channel::ALL.len()],
}
impl ChannelSelection {
    pub fn none() -> Self {
        Self {
            visible: [false; Channel::ALL.len()],
        }
    }
    pub fn all() -> Self {
        Self {
            visible: [true; Channel::ALL.len()],
        }
    }
    pub fn set(&mut self, channel: Channel, visible: bool) {
        self.visible[Self::slot(channel)] = visible;
    }
    pub fn toggle(&mut self, channel: Channel) {
        let slot = Self::slot(channel);
        self.visible[slot] = !self.visible[slot];
    }
    pub fn is_visible(&self, channel: Channel) -> bool {
        self.visible[Self::slot(channel)]
    }
    /// Visible channels in emission order.
    pub fn visible(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL
            .into_iter()
            .filter(move |channel| self.is_visible(*channel))
    }
    fn slot(channel: Channel) -> usize {
        channel as usize
    }
}
impl Default for ChannelSelection {
    fn default() -> Self {
        let mut selection = Self::none();
        selection.set(Channel::ActualPosition, true);
        selection.set(Channel::ActualVelocity, true);
        selection.set(Channel::PhaseCurrentRollingMean, true);
        selection
    }
}
