//! KampanIO - telemetry ingestion daemon for a remote vibration sensor
//!
//! Connects to the sensor over its datagram (or stream) link, keeps the
//! connection alive, and publishes calibrated axis-corrected samples for
//! viewers, plotters and exporters to consume.

use kampan_io::app::KampanApp;
use kampan_io::config::AppConfig;
use kampan_io::error::Result;
use std::env;
use std::path::Path;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `kampan-io <path>` (positional)
/// - `kampan-io --config <path>` (flag-based)
/// - `kampan-io -c <path>` (short flag)
///
/// Defaults to `/etc/kampanio.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/kampanio.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = if Path::new(&config_path).exists() {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::esp32_defaults()
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    log::info!("KampanIO v0.1.0 starting...");
    if Path::new(&config_path).exists() {
        log::info!("Using config: {config_path}");
    } else {
        log::info!("Config {config_path} not found, using ESP32 defaults");
    }
    log::info!(
        "Device: {} over {:?}, records: {:?}",
        config.link.peer_address,
        config.link.transport,
        config.records.format
    );

    let mut app = KampanApp::new(config);
    app.run()?;

    log::info!("KampanIO stopped");
    Ok(())
}
