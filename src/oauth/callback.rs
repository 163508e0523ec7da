// ABOUTME: Transient local HTTP listener that receives the OAuth redirect
// ABOUTME: Hands the first terminal event (code or error) to the waiting authorize call
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// Terminal event delivered by the provider's redirect.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Authorization code arrived, with the echoed anti-CSRF state
    Code {
        /// Authorization code to exchange for tokens
        code: String,
        /// `state` parameter echoed back by the provider
        state: Option<String>,
    },
    /// The provider reported an error (e.g. the user denied access)
    Error(String),
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
struct ListenerState {
    // Consumed by the first terminal event; later redirects only get a page.
    outcome: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

/// Short-lived loopback HTTP server for the interactive authorization flow.
///
/// Serves the configured callback path plus `GET /health`, which answers a
/// fixed liveness payload independent of the OAuth path. The server runs on
/// a background task and is torn down synchronously via [`Self::shutdown`].
pub struct CallbackServer {
    local_addr: SocketAddr,
    outcome_rx: oneshot::Receiver<CallbackOutcome>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind the listener and start serving.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if the address cannot be bound (typically
    /// because a previous listener still holds the port).
    pub async fn bind(addr: SocketAddr, callback_path: &str) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            AppError::auth(format!("Failed to bind callback listener on {addr}: {e}"))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::internal(format!("Failed to read listener address: {e}")))?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = ListenerState {
            outcome: Arc::new(Mutex::new(Some(outcome_tx))),
        };
        let app = Router::new()
            .route(callback_path, get(handle_callback))
            .route("/health", get(handle_health))
            .with_state(state);

        debug!("callback listener bound on {local_addr}");
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = server.await {
                warn!("callback listener error: {err}");
            }
        });

        Ok(Self {
            local_addr,
            outcome_rx,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    /// Address the listener is actually bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the first terminal callback event.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if the listener task exits before a
    /// redirect arrives.
    pub async fn wait(&mut self) -> AppResult<CallbackOutcome> {
        (&mut self.outcome_rx).await.map_err(|_| {
            AppError::auth("Callback listener closed before receiving a redirect")
        })
    }

    /// Stop the listener and wait for its task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
        debug!("callback listener stopped");
    }
}

async fn handle_callback(
    State(state): State<ListenerState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    if let Some(code) = params.code {
        deliver(
            &state,
            CallbackOutcome::Code {
                code,
                state: params.state,
            },
        );
        (
            StatusCode::OK,
            Html("<h1>Success!</h1><p>You can close this window.</p>".to_owned()),
        )
    } else if let Some(error) = params.error {
        let page = format!("<h1>Error</h1><p>{error}</p>");
        deliver(&state, CallbackOutcome::Error(error));
        (StatusCode::BAD_REQUEST, Html(page))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Html("<h1>Error</h1><p>Missing code parameter</p>".to_owned()),
        )
    }
}

async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn deliver(state: &ListenerState, outcome: CallbackOutcome) {
    let sender = state.outcome.lock().ok().and_then(|mut guard| guard.take());
    if let Some(tx) = sender {
        let _ = tx.send(outcome);
    }
}
