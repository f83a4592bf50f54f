mod app;
mod panels;

use eframe::egui;
use s3_browser::config::Config;
use tracing::warn;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let config = load_config();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "S3 Browser",
        options,
        Box::new(move |cc| Ok(Box::new(app::S3BrowserApp::new(cc, config)?))),
    )
}

fn load_config() -> Config {
    let from_file = Config::default_path()
        .filter(|path| path.exists())
        .map(|path| Config::from_file(&path));

    match from_file {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            warn!("Ignoring config file: {}", e);
            Config::default()
        }
        None => Config::from_env().unwrap_or_else(|e| {
            warn!("Ignoring environment config: {}", e);
            Config::default()
        }),
    }
}
