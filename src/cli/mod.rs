//! Command-line entry points
//!
//! - `server`: HTTP API plus keep-alive watchdog
//! - `login`: one login from the terminal, jar printed as JSON

pub mod login;
pub mod server;

use crate::{Settings, config::ConfigLoader};
use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Load settings for a CLI command
///
/// Configuration precedence:
/// 1. Command line arguments (applied by the caller)
/// 2. Environment variables
/// 3. Configuration file (from --config, CAMPUS_GATEWAY_CONFIG or default location)
/// 4. Default values
///
/// A malformed file or environment value is an error, never replaced by
/// defaults.
pub(crate) fn load_settings(config: Option<&str>) -> anyhow::Result<Settings> {
    let config_path = match config {
        Some(path) => Some(std::path::PathBuf::from(path)),
        None => ConfigLoader::get_config_path(),
    };

    ConfigLoader::new()
        .load(config_path.as_deref())
        .context("Failed to load configuration")
}

/// Logging filter precedence: --verbose, then RUST_LOG, then config level
pub(crate) fn env_filter(settings: &Settings, verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(&settings.logging.level)
    }
}

/// Install the global subscriber, writing to stderr when stdout carries output
pub(crate) fn init_logging(settings: &Settings, verbose: bool, to_stderr: bool) {
    let filter = env_filter(settings, verbose);
    // A subscriber may already be installed when embedded or under test
    let _ = if to_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
}
