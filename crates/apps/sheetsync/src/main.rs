//! sheetsync - copy unread Gmail messages into a Google Sheet
//!
//! Runs one sync pass and exits. Takes no arguments; settings come from
//! ~/.config/sheetsync/config.json.

use log::{error, info, warn};
use sheetsync::SyncConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Stdout)
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    info!("Starting Gmail to Sheets sync...");

    let config = match SyncConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match sheetsync::run(&config) {
        Ok(stats) => {
            if !stats.is_clean() {
                warn!(
                    "Sync finished with errors: {} parse failure(s), {} mark-read failure(s){}",
                    stats.parse_failures,
                    stats.mark_read_failures,
                    stats
                        .append_error
                        .as_deref()
                        .map(|e| format!(", append stopped: {}", e))
                        .unwrap_or_default()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
