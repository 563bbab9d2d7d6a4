//! Version information reported by `/ping` and `--version`

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the current gateway version
pub fn get_version() -> &'static str {
    VERSION
}

/// Version string including the build commit, when the build recorded one
pub fn get_detailed_version() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", VERSION, hash),
        None => VERSION.to_string(),
    }
}
