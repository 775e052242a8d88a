mod app;

use anyhow::{Context, Result};
use eframe::egui;
use std::path::PathBuf;

use rtm_core::{get_config_path, load_or_demo, DashboardStore, RtmConfig};

use crate::app::DashboardApp;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional fixtures file as the only argument
    let fixtures = std::env::args().nth(1).map(PathBuf::from);

    let config_path = get_config_path()?;
    let config = RtmConfig::load_or_default(&config_path)?;
    let (workspace, fixtures_path) = load_or_demo(fixtures.as_deref(), &config)?;
    let store = DashboardStore::new(workspace, config).context("Invalid workspace")?;

    match &fixtures_path {
        Some(path) => log::info!("Dashboard backed by {}", path.display()),
        None => log::info!("No fixtures found, showing demo data"),
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 860.0])
            .with_min_inner_size([900.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "RTM Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(DashboardApp::new(store, fixtures_path)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to start GUI: {}", e))
}
