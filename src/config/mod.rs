//! Configuration management for the gateway
//!
//! This module handles loading and managing configuration settings
//! for both the HTTP server and one-shot CLI logins.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{
    CacheBackend, FailoverMode, NetworkSettings, PortalSettings, ProxySettings, RotationPolicy,
    SessionSettings, Settings, WatchdogSettings,
};

/// Serializes unit tests that touch process environment variables
#[cfg(test)]
pub(crate) static ENV_TEST_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
