// ABOUTME: Unified error handling for the whoop-sync crate
// ABOUTME: Defines the AppError taxonomy and the AppResult alias used everywhere
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Result alias used throughout the crate.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// Variants map onto the failure taxonomy of the sync pipeline:
/// - `Auth` — bad credentials, revoked grant, exhausted refresh retries,
///   authorization timeout or denial. Recoverable by re-running `auth`.
/// - `Api` — any non-2xx response from the resource API, carrying the
///   status and response body for diagnostics. Never retried.
/// - `Network` — transport-level failures before an HTTP status exists.
/// - `Database` — persistence failures, including malformed records that
///   would corrupt watermark-based resume if skipped silently.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication or authorization failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-2xx response from the WHOOP API
    #[error("WHOOP API error (status {status}): {body}")]
    Api {
        /// HTTP status code returned by the API
        status: u16,
        /// Response body, surfaced verbatim for diagnostics
        body: String,
    },

    /// Transport-level HTTP failure
    #[error("Network error: {0}")]
    Network(String),

    /// Database operation failure
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token persistence failure
    #[error("Token storage error: {0}")]
    Token(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create an API error from a status code and response body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a token storage error
    pub fn token(msg: impl Into<String>) -> Self {
        Self::Token(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("Migration failed: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("I/O error: {err}"))
    }
}
