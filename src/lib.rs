//! Telemetry pipeline of the motor-rig operator console: historical load, live ingestion under a
//! fixed memory ceiling, stride downsampling, trailing-mean smoothing and chart composition.
pub mod config;
pub mod telemetry;
