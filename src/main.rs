// src/main.rs
mod gui;
use anyhow::{anyhow, Result};
use eframe::egui;
use rig_telemetry::config::ConsoleConfig;
fn main() -> Result<()> {
    env_logger::init();
    let config = ConsoleConfig::discover(std::env::args().nth(1))?;
    let app = gui::ConsoleApp::new(config)?;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 820.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("Rig Telemetry");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("rig-telemetry", options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow!("operator window failed: {e}"))
}
