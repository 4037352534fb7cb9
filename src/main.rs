#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};

use image_query::app::ImageQueryApp;
use image_query::config::AppConfig;
use image_query::constants::{APP_TITLE, CONFIG_FILE_NAME, LOG_FILE_NAME};
use image_query::{history, library};

/// Select local images, type a question, and send both to a multimodal
/// generation model.
#[derive(Parser, Debug)]
#[command(name = "image-query", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Log at debug level instead of info
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("{} v{}", APP_TITLE, env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&cli.config)?;
    if !cli.config.exists() {
        match config.save(&cli.config) {
            Ok(()) => info!("Wrote default config to '{}'", cli.config.display()),
            Err(err) => warn!(
                "Could not write default config '{}': {}",
                cli.config.display(),
                err
            ),
        }
    }
    if config.resolved_api_key().is_none() {
        warn!("No API key configured; queries will fail until one is set");
    }

    let upload_dir = library::ensure_upload_dir(&config.upload_dir).await?;
    info!("Upload folder: {}", upload_dir.display());

    let history = history::load_query_log(&upload_dir).await;
    let folder_contents = match library::collect_staged_images(&upload_dir).await {
        Ok(images) => images,
        Err(err) => {
            warn!("Could not list the upload folder: {}", err);
            Vec::new()
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([780.0, 900.0])
            .with_min_inner_size([560.0, 640.0]),
        ..Default::default()
    };

    let app = ImageQueryApp::new(config, history, folder_contents);
    eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|err| anyhow::anyhow!("Failed to run the application: {}", err))
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE_NAME)
        .with_context(|| format!("Unable to open log file '{}'", LOG_FILE_NAME))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .init();
    Ok(())
}
