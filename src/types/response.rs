//! Response type definitions
//!
//! Every API answer, success or failure, is a `{code, message}` envelope.

use crate::Error;
use serde::{Deserialize, Serialize};

/// `{code, message}` envelope; `code` 0 is success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    /// Caller-facing rendering of `error`
    pub fn from_error(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.user_message(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&Error> for ApiResponse {
    fn from(error: &Error) -> Self {
        Self::from_error(error)
    }
}

/// Ping response for health checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    /// Server uptime in seconds
    pub server_uptime: u64,

    /// Server version
    pub version: String,

    /// Last keep-alive probe reached the academic system
    pub egress_ok: bool,

    /// Keep-alive failures since the last success
    pub consecutive_failures: u64,
}

impl PingResponse {
    pub fn new(server_uptime: u64, version: impl Into<String>) -> Self {
        Self {
            server_uptime,
            version: version.into(),
            egress_ok: true,
            consecutive_failures: 0,
        }
    }

    pub fn with_connectivity(mut self, egress_ok: bool, consecutive_failures: u64) -> Self {
        self.egress_ok = egress_ok;
        self.consecutive_failures = consecutive_failures;
        self
    }
}
