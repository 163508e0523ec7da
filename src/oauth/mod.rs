// ABOUTME: OAuth2 authorization-code flow and token lifecycle for the WHOOP API
// ABOUTME: Interactive authorize via loopback listener, refresh with rotation, expiry margin
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth token lifecycle management.
//!
//! [`AuthFlow`] owns the token state machine:
//!
//! ```text
//! Unauthenticated -> AwaitingCallback -> Authenticated
//!        ^                                    |
//!        +-------- refresh failure ----------+
//! ```
//!
//! The token is held in an explicit session object behind a mutex and
//! checkpointed to disk through [`TokenStore`] on every change. WHOOP
//! rotates refresh tokens: every successful refresh replaces both tokens,
//! and the pre-rotation refresh token must never be retried.

/// Loopback HTTP listener for the interactive redirect
pub mod callback;
/// Durable token persistence
pub mod token_store;

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use callback::{CallbackOutcome, CallbackServer};
pub use token_store::TokenStore;

/// Seconds before hard expiry at which a token is treated as expired,
/// so refresh happens proactively rather than on a failed request.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Access-token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Maximum refresh attempts; only HTTP 401 is retried.
const REFRESH_MAX_ATTEMPTS: u32 = 3;

/// Minimum entropy of the anti-CSRF state nonce, in bytes.
const STATE_NONCE_BYTES: usize = 24;

/// The OAuth token triple.
///
/// Exclusively owned by [`AuthFlow`]; mutated in place on every refresh
/// and persisted as a whole through [`TokenStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Bearer token attached to API requests
    pub access_token: String,
    /// Rotating refresh token; replaced on every successful refresh
    pub refresh_token: String,
    /// Absolute expiry instant, unix seconds
    pub expires_at: i64,
}

impl Token {
    /// True when the token is within [`EXPIRY_MARGIN_SECS`] of its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - EXPIRY_MARGIN_SECS
    }
}

/// Authentication state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No usable credentials
    Unauthenticated,
    /// Listener up, waiting for the provider redirect
    AwaitingCallback,
    /// Token triple held and believed valid (modulo expiry)
    Authenticated,
}

#[derive(Debug)]
struct Session {
    token: Option<Token>,
    state: AuthState,
}

/// Token endpoint response for both grant types.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now().timestamp() + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        }
    }
}

/// Drives the OAuth authorization-code exchange and refresh cycle.
pub struct AuthFlow {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    callback_addr: std::net::SocketAddr,
    callback_path: String,
    http: reqwest::Client,
    store: TokenStore,
    session: Mutex<Session>,
}

impl AuthFlow {
    /// Build an auth flow from configuration and a token store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the redirect URI cannot be parsed.
    pub fn new(config: &Config, store: TokenStore) -> AppResult<Self> {
        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            callback_addr: config.callback_addr()?,
            callback_path: config.callback_path()?,
            http: reqwest::Client::new(),
            store,
            session: Mutex::new(Session {
                token: None,
                state: AuthState::Unauthenticated,
            }),
        })
    }

    /// Build the provider's authorization URL with the given state nonce.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the configured authorization endpoint
    /// is not a valid URL.
    pub fn authorization_url(&self, state: &str) -> AppResult<Url> {
        Url::parse_with_params(
            &self.auth_url,
            [
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", &Config::scope_string()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::config(format!("Invalid authorization URL: {e}")))
    }

    /// Run the interactive authorization flow.
    ///
    /// Binds the loopback listener, prints the authorization URL for the
    /// operator to visit out-of-band, waits for the first terminal event
    /// (code, error, or timeout), tears the listener down, and on success
    /// exchanges the code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` on timeout, provider-reported error, state
    /// nonce mismatch, or failed code exchange.
    pub async fn authorize(&self, timeout: Duration) -> AppResult<()> {
        let state_nonce = generate_state_nonce();
        let auth_url = self.authorization_url(&state_nonce)?;

        let mut server = CallbackServer::bind(self.callback_addr, &self.callback_path).await?;
        self.set_state(AuthState::AwaitingCallback).await;

        println!("\n{}", "=".repeat(70));
        println!("AUTHENTICATION REQUIRED");
        println!("{}", "=".repeat(70));
        println!("\nVisit this URL in your browser to authenticate:\n\n{auth_url}\n");
        println!("{}", "=".repeat(70));
        println!("\nWaiting for authorization (timeout: {}s)...", timeout.as_secs());

        let outcome = tokio::time::timeout(timeout, server.wait()).await;
        server.shutdown().await;

        match outcome {
            Err(_) => {
                self.set_state(AuthState::Unauthenticated).await;
                Err(AppError::auth(format!(
                    "Authorization timed out after {}s",
                    timeout.as_secs()
                )))
            }
            Ok(Err(err)) => {
                self.set_state(AuthState::Unauthenticated).await;
                Err(err)
            }
            Ok(Ok(CallbackOutcome::Error(error))) => {
                self.set_state(AuthState::Unauthenticated).await;
                Err(AppError::auth(format!("Authorization denied: {error}")))
            }
            Ok(Ok(CallbackOutcome::Code { code, state })) => {
                if state.as_deref() != Some(state_nonce.as_str()) {
                    self.set_state(AuthState::Unauthenticated).await;
                    return Err(AppError::auth(
                        "OAuth state mismatch - possible CSRF attack",
                    ));
                }
                info!("authorization code received");
                self.exchange_code(&code).await
            }
        }
    }

    /// Exchange an authorization code for the initial token triple.
    ///
    /// # Errors
    ///
    /// Any non-200 status is a hard failure carrying the response body;
    /// the state machine drops back to `Unauthenticated`.
    pub async fn exchange_code(&self, code: &str) -> AppResult<()> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::network(format!("Token exchange request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            self.set_state(AuthState::Unauthenticated).await;
            return Err(AppError::auth(format!(
                "Token exchange failed (status {status}): {body}"
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::auth(format!("Malformed token response: {e}")))?
            .into_token();

        self.store.save(&token)?;
        let mut session = self.session.lock().await;
        session.token = Some(token);
        session.state = AuthState::Authenticated;
        info!("authentication successful, tokens saved");
        Ok(())
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// HTTP 401 is treated as transient and retried up to three attempts
    /// with exponential backoff (1s, 2s); any other non-200 fails
    /// immediately. A successful refresh rotates the refresh token, so the
    /// stored triple always reflects the newest rotation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` when no refresh token is stored, retries
    /// are exhausted, or the provider rejects the grant; the state machine
    /// drops back to `Unauthenticated`.
    pub async fn refresh_access_token(&self) -> AppResult<()> {
        // Hold the session lock for the whole refresh so concurrent callers
        // never race a rotation.
        let mut session = self.session.lock().await;
        let refresh_token = session
            .token
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or_else(|| AppError::auth("No refresh token stored; run `whoop-sync auth`"))?;
        let scope = Config::scope_string();

        for attempt in 1..=REFRESH_MAX_ATTEMPTS {
            let response = self
                .http
                .post(&self.token_url)
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                    ("scope", scope.as_str()),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ])
                .send()
                .await
                .map_err(|e| AppError::network(format!("Token refresh request failed: {e}")))?;

            let status = response.status();
            if status == StatusCode::OK {
                let token = response
                    .json::<TokenResponse>()
                    .await
                    .map_err(|e| AppError::auth(format!("Malformed refresh response: {e}")))?
                    .into_token();
                self.store.save(&token)?;
                session.token = Some(token);
                session.state = AuthState::Authenticated;
                debug!("access token refreshed");
                return Ok(());
            }

            if status == StatusCode::UNAUTHORIZED && attempt < REFRESH_MAX_ATTEMPTS {
                let delay = Duration::from_secs(1 << (attempt - 1));
                warn!(
                    attempt,
                    "token refresh rejected with 401, retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            session.state = AuthState::Unauthenticated;
            return Err(AppError::auth(format!(
                "Token refresh failed (status {status}): {body}"
            )));
        }

        session.state = AuthState::Unauthenticated;
        Err(AppError::auth(
            "Token refresh failed after 3 attempts; run `whoop-sync auth`",
        ))
    }

    /// True when no expiry is known or the token is within the safety
    /// margin of its recorded expiry.
    pub async fn is_token_expired(&self) -> bool {
        let session = self.session.lock().await;
        session.token.as_ref().map_or(true, Token::is_expired)
    }

    /// Return a currently valid access token, refreshing if needed.
    ///
    /// This is the only access path API calls should use; callers never
    /// read the raw token field directly.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` when no token is stored and when a needed
    /// refresh fails.
    pub async fn valid_access_token(&self) -> AppResult<String> {
        if self.is_token_expired().await {
            self.refresh_access_token().await?;
        }
        let session = self.session.lock().await;
        session
            .token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| AppError::auth("No access token; run `whoop-sync auth`"))
    }

    /// Load persisted tokens into the session. Fail-soft: a missing or
    /// malformed token file leaves the flow unauthenticated.
    ///
    /// Returns true when a complete token triple was loaded.
    pub async fn load_stored_tokens(&self) -> bool {
        let Some(token) = self.store.load() else {
            return false;
        };
        if token.access_token.is_empty() || token.refresh_token.is_empty() {
            return false;
        }
        let mut session = self.session.lock().await;
        session.token = Some(token);
        session.state = AuthState::Authenticated;
        true
    }

    /// True when a complete token triple is held in memory.
    pub async fn is_authenticated(&self) -> bool {
        let session = self.session.lock().await;
        session
            .token
            .as_ref()
            .is_some_and(|t| !t.access_token.is_empty() && !t.refresh_token.is_empty())
    }

    /// Current state machine position.
    pub async fn state(&self) -> AuthState {
        self.session.lock().await.state
    }

    /// Clear persisted and in-memory tokens unconditionally.
    ///
    /// Run before an explicit re-authentication so a stale grant can never
    /// shadow the new one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Token` if the token file cannot be removed.
    pub async fn clear_tokens(&self) -> AppResult<()> {
        self.store.clear()?;
        let mut session = self.session.lock().await;
        session.token = None;
        session.state = AuthState::Unauthenticated;
        Ok(())
    }

    async fn set_state(&self, state: AuthState) {
        self.session.lock().await.state = state;
    }
}

/// Generate a base64url state nonce with at least 16 bytes of entropy.
fn generate_state_nonce() -> String {
    let mut bytes = [0u8; STATE_NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
