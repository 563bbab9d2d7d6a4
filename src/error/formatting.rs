//! Error formatting utilities
//!
//! Renders errors with their cause chain, for terminal output and as
//! structured log fields.

use crate::Error;
use std::error::Error as StdError;

/// Format error for display, appending nested causes
pub fn format_error(error: &Error) -> String {
    let formatted = match error {
        Error::Upstream { stage, message } => format!("Portal error at {}: {}", stage, message),

        Error::Transport { message, attempts } => {
            format!(
                "All egress paths failed ({} attempt(s)): {}",
                attempts, message
            )
        }

        Error::Proxy { config, message } => {
            format!("Proxy error with config '{}': {}", config, message)
        }

        Error::Validation { field, message } => {
            format!("Validation failed for {}: {}", field, message)
        }

        // For standard errors, use their Display implementation
        _ => error.to_string(),
    };

    let mut result = formatted;
    let mut source = error.source();

    while let Some(cause) = source {
        if !result.contains(&cause.to_string()) {
            result = format!("{} (caused by {})", result, cause);
        }
        source = cause.source();
    }

    result
}

/// Format error for logging with structured data
pub fn format_error_for_logging(error: &Error) -> serde_json::Value {
    let mut log_data = serde_json::json!({
        "message": format_error(error),
        "category": error.category(),
        "code": error.code(),
        "retryable": error.is_retryable(),
    });

    match error {
        Error::Transport { attempts, .. } => {
            log_data["attempts"] = serde_json::Value::Number((*attempts).into());
        }
        Error::Upstream { stage, .. } => {
            log_data["stage"] = serde_json::Value::String(stage.clone());
        }
        Error::Auth { failure } => {
            log_data["auth_failure"] = serde_json::Value::String(failure.to_string());
        }
        _ => {}
    }

    log_data
}
