//! Locating and layering configuration sources
//!
//! The file (if any) is read first, the deployment environment is applied on
//! top, and the result is validated. Command-line flags are applied by the
//! CLI afterwards.

use crate::{Result, config::Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_VAR: &str = "CAMPUS_GATEWAY_CONFIG";

/// Builds [`Settings`] from file and environment
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Config file to use when none is given on the command line
    ///
    /// `CAMPUS_GATEWAY_CONFIG` wins when it names an existing file, then
    /// `<config dir>/campus-gateway/config.toml`.
    pub fn get_config_path() -> Option<PathBuf> {
        let from_env = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        if let Some(path) = &from_env {
            if path.is_file() {
                debug!(path = %path.display(), "Config file from {}", CONFIG_PATH_VAR);
                return from_env;
            }
            warn!(path = %path.display(), "{} names a missing file, ignoring it", CONFIG_PATH_VAR);
        }

        let default_path = dirs::config_dir()?.join("campus-gateway").join("config.toml");
        default_path.is_file().then(|| {
            debug!(path = %default_path.display(), "Config file from the user config dir");
            default_path
        })
    }

    /// File, then environment, then validation
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(&self, config_file: Option<&Path>) -> Result<Settings> {
        let base = match config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                Settings::from_file(path)?
            }
            Some(path) => {
                warn!(path = %path.display(), "Configuration file not found, using defaults");
                Settings::default()
            }
            None => Settings::default(),
        };

        let settings = base.merge_with_env()?;
        settings.validate()?;

        info!(
            proxy_enabled = settings.proxy.enabled,
            proxy_endpoints = settings.proxy.endpoints.len(),
            cache = ?settings.cache.backend,
            "Configuration ready"
        );
        Ok(settings)
    }
}
