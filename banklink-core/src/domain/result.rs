//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// `NotConfigured` and `InvalidCredentials` are expected, user-facing
/// outcomes. `Upstream`, `Transport`, `Timeout` and `Store` are faults that
/// get logged with full context and shown to users as "integration
/// unavailable".
#[derive(Error, Debug)]
pub enum Error {
    #[error("Aggregator integration is not configured")]
    NotConfigured,

    #[error("Invalid aggregator credentials: {0}")]
    InvalidCredentials(String),

    /// Refresh token rejected. Consumed inside the token lifecycle and
    /// never returned to callers.
    #[error("Aggregator token expired")]
    TokenExpired,

    #[error("Aggregator returned HTTP {status}")]
    Upstream { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Deleting connection {connection_id} left {} transaction(s) behind", .failed_transaction_ids.len())]
    PartialDelete {
        connection_id: String,
        failed_transaction_ids: Vec<String>,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the same call may succeed if simply repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Store(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
