//! Service-level error types
//!
//! Each layer owns its own `thiserror` enum (`ConfigError`, `LlmError`,
//! `DatastoreError`, `ModuleError`, `AuthError`). `ServiceError` wraps the
//! ones that can abort startup or the server loop.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Error type for startup and server operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] crate::datastore::DatastoreError),

    #[error("Server error: {message}")]
    Server { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Create server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

static CONNECTION_STRING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(postgres(?:ql)?://[^:/\s]+):[^@\s]+@").expect("dsn pattern is valid")
});

/// Strip credentials and secret-looking paths from a fault description
///
/// Fault messages come from third-party errors (HTTP clients, drivers) and
/// are returned to callers in the `error` field, so they are redacted and
/// capped at 500 bytes.
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    sanitized = CONNECTION_STRING_PATTERN
        .replace_all(&sanitized, "${1}:***@")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}
