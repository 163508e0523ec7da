// ABOUTME: Environment-based configuration for the whoop-sync tool
// ABOUTME: Reads WHOOP_* variables with defaults and validates required credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

use crate::errors::{AppError, AppResult};

/// Default WHOOP API base URL
const DEFAULT_API_BASE_URL: &str = "https://api.prod.whoop.com";
/// Default OAuth authorization endpoint
const DEFAULT_AUTH_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
/// Default OAuth token endpoint
const DEFAULT_TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
/// Default redirect URI registered with the WHOOP developer dashboard
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// OAuth scopes requested during authorization.
///
/// `offline` is required for the provider to issue a refresh token.
pub const SCOPES: &[&str] = &[
    "offline",
    "read:recovery",
    "read:cycles",
    "read:workout",
    "read:sleep",
    "read:profile",
    "read:body_measurement",
];

/// Application configuration loaded from environment variables.
///
/// All fields are public so tests can construct a config pointing at
/// mock endpoints without going through the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// WHOOP application client ID (`WHOOP_CLIENT_ID`, required)
    pub client_id: String,
    /// WHOOP application client secret (`WHOOP_CLIENT_SECRET`, required)
    pub client_secret: String,
    /// OAuth redirect URI; the callback listener binds to its port and path
    pub redirect_uri: String,
    /// Host address the callback listener binds to
    pub callback_host: String,
    /// Path to the SQLite database file
    pub db_path: String,
    /// Path to the persisted token file
    pub tokens_file: PathBuf,
    /// Days to back off the watermark on incremental resume
    pub lookback_days: i64,
    /// WHOOP API base URL (overridable for tests)
    pub api_base_url: String,
    /// OAuth authorization endpoint (overridable for tests)
    pub auth_url: String,
    /// OAuth token endpoint (overridable for tests)
    pub token_url: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `WHOOP_CLIENT_ID` or
    /// `WHOOP_CLIENT_SECRET` is missing or empty, or if
    /// `WHOOP_SYNC_LOOKBACK_DAYS` is not a non-negative integer.
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            client_id: env_or("WHOOP_CLIENT_ID", ""),
            client_secret: env_or("WHOOP_CLIENT_SECRET", ""),
            redirect_uri: env_or("WHOOP_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            callback_host: env_or("WHOOP_CALLBACK_HOST", "0.0.0.0"),
            db_path: env_or("WHOOP_DB_PATH", "whoop.db"),
            tokens_file: PathBuf::from(env_or("WHOOP_TOKENS_FILE", "tokens.json")),
            lookback_days: parse_lookback(&env_or("WHOOP_SYNC_LOOKBACK_DAYS", "1"))?,
            api_base_url: env_or("WHOOP_API_BASE_URL", DEFAULT_API_BASE_URL),
            auth_url: env_or("WHOOP_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: env_or("WHOOP_TOKEN_URL", DEFAULT_TOKEN_URL),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate that the required credentials are present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the client ID or secret is empty.
    pub fn validate(&self) -> AppResult<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AppError::config(
                "WHOOP_CLIENT_ID and WHOOP_CLIENT_SECRET must be set",
            ));
        }
        Ok(())
    }

    /// Space-joined scope string for token requests.
    #[must_use]
    pub fn scope_string() -> String {
        SCOPES.join(" ")
    }

    /// Socket address the callback listener binds to, derived from the
    /// configured host and the redirect URI's port.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the redirect URI or host cannot be
    /// parsed.
    pub fn callback_addr(&self) -> AppResult<SocketAddr> {
        let url = Url::parse(&self.redirect_uri)
            .map_err(|e| AppError::config(format!("Invalid WHOOP_REDIRECT_URI: {e}")))?;
        let port = url.port_or_known_default().unwrap_or(8080);
        format!("{}:{port}", self.callback_host)
            .parse()
            .map_err(|e| AppError::config(format!("Invalid WHOOP_CALLBACK_HOST: {e}")))
    }

    /// Path component of the redirect URI, served by the callback listener.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the redirect URI cannot be parsed.
    pub fn callback_path(&self) -> AppResult<String> {
        let url = Url::parse(&self.redirect_uri)
            .map_err(|e| AppError::config(format!("Invalid WHOOP_REDIRECT_URI: {e}")))?;
        Ok(url.path().to_owned())
    }

    /// SQLite connection URL for the configured database path.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.db_path)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_lookback(raw: &str) -> AppResult<i64> {
    let days: i64 = raw.parse().map_err(|_| {
        AppError::config(format!(
            "WHOOP_SYNC_LOOKBACK_DAYS must be a non-negative integer, got {raw:?}"
        ))
    })?;
    if days < 0 {
        return Err(AppError::config(
            "WHOOP_SYNC_LOOKBACK_DAYS must be non-negative",
        ));
    }
    Ok(days)
}
