//! Utility functions and helpers
//!
//! This module contains utility functions used throughout the application.

pub mod encoding;
pub mod version;

pub use encoding::decode_text;
pub use version::{VERSION, get_detailed_version, get_version};
