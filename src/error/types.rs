//! Gateway error taxonomy
//!
//! Classifies every failure the gateway can surface and maps it onto the
//! signed integer codes and user-facing messages the API contract exposes.

use thiserror::Error;

/// Why the portal refused a login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// "用户名或密码错误"
    BadCredentials,
    /// The portal asks the user to bind a phone before entering
    PhoneNotBound,
    /// "当前账号无权登录"
    Unauthorized,
    /// Still on the CAS page but no known marker matched
    Unknown,
}

impl AuthFailure {
    /// Message shown to the end user
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthFailure::BadCredentials => "账号或密码错误!",
            AuthFailure::PhoneNotBound => "未绑定手机号!",
            AuthFailure::Unauthorized => "无权登录此账号!",
            AuthFailure::Unknown => "未知登录错误!",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            AuthFailure::BadCredentials => "bad credentials",
            AuthFailure::PhoneNotBound => "phone not bound",
            AuthFailure::Unauthorized => "account not authorized",
            AuthFailure::Unknown => "unrecognized portal rejection",
        };
        f.write_str(reason)
    }
}

/// Main error type for the application
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client errors that escaped transport classification
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session store backend errors
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The portal rejected the credentials
    #[error("Authentication failed: {failure}")]
    Auth {
        /// Which rejection the portal reported
        failure: AuthFailure,
    },

    /// The portal demands a password change before login
    #[error("Password expired: the portal requires a password change")]
    PasswordExpired,

    /// Portal page malformed, undecodable or in maintenance
    #[error("Upstream error during {stage}: {message}")]
    Upstream {
        /// Protocol stage that observed the problem
        stage: String,
        /// What was wrong with the page
        message: String,
    },

    /// Every egress path failed
    #[error("Transport error after {attempts} attempt(s): {message}")]
    Transport {
        /// Last underlying failure
        message: String,
        /// Number of endpoints tried
        attempts: usize,
    },

    /// The lab-system ticket hand-off did not complete
    #[error("Lab cookie derivation failed: {message}")]
    Derivation {
        /// Description of the failure
        message: String,
    },

    /// Cache operation errors
    #[error("Cache error during {operation}: {details}")]
    Cache {
        /// The cache operation that failed
        operation: String,
        /// Detailed error description
        details: String,
    },

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// Proxy configuration errors
    #[error("Proxy error with config '{config}': {message}")]
    Proxy {
        /// The proxy configuration that caused the error
        config: String,
        /// Error message describing the proxy issue
        message: String,
    },

    /// Validation errors
    #[error("Validation failed for {field}: {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Error message describing the validation failure
        message: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an authentication error
    pub fn auth(failure: AuthFailure) -> Self {
        Self::Auth { failure }
    }

    /// Create an upstream (portal content) error
    pub fn upstream(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, attempts: usize) -> Self {
        Self::Transport {
            message: message.into(),
            attempts,
        }
    }

    /// Create a derivation error
    pub fn derivation(message: impl Into<String>) -> Self {
        Self::Derivation {
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Cache {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Create a configuration error
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a proxy error
    pub fn proxy(config: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Proxy {
            config: config.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable code returned to API callers
    ///
    /// `-3` marks login failures the user can fix, `-1` everything else.
    pub fn code(&self) -> i32 {
        match self {
            Error::Auth { .. } | Error::PasswordExpired | Error::Validation { .. } => -3,
            _ => -1,
        }
    }

    /// Message suitable for the end user
    pub fn user_message(&self) -> String {
        match self {
            Error::Auth { failure } => failure.user_message().to_string(),
            Error::PasswordExpired => "请修改密码!".to_string(),
            Error::Validation { message, .. } => message.clone(),
            Error::Transport { .. } => "VPN通道已关闭!".to_string(),
            Error::Http(e) if e.is_connect() || e.is_timeout() => "VPN通道已关闭!".to_string(),
            Error::Upstream { .. } | Error::Json(..) => "请稍后再试!".to_string(),
            Error::Derivation { .. } => "实验系统登录失败，请稍后再试!".to_string(),
            _ => "服务器开小差了~".to_string(),
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Upstream { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Redis(e) => e.is_connection_dropped() || e.is_timeout(),
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(..) => "http",
            Error::Json(..) => "json",
            Error::Toml(..) => "toml",
            Error::Url(..) => "url",
            Error::Io(..) => "io",
            Error::Redis(..) => "redis",
            Error::Auth { .. } => "auth",
            Error::PasswordExpired => "password_expired",
            Error::Upstream { .. } => "upstream",
            Error::Transport { .. } => "transport",
            Error::Derivation { .. } => "derivation",
            Error::Cache { .. } => "cache",
            Error::Config { .. } => "config",
            Error::Proxy { .. } => "proxy",
            Error::Validation { .. } => "validation",
            Error::Internal { .. } => "internal",
        }
    }
}
