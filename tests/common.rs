// ABOUTME: Shared test fixtures: a mock WHOOP provider and config/token helpers
// ABOUTME: Serves scripted token responses and cursor-paginated resource pages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use whoop_sync::config::Config;
use whoop_sync::oauth::{Token, TokenStore};

pub const PROFILE_PATH: &str = "/developer/v2/user/profile/basic";
pub const BODY_PATH: &str = "/developer/v2/user/measurement/body";
pub const CYCLE_PATH: &str = "/developer/v2/cycle";
pub const RECOVERY_PATH: &str = "/developer/v2/recovery";
pub const SLEEP_PATH: &str = "/developer/v2/activity/sleep";
pub const WORKOUT_PATH: &str = "/developer/v2/activity/workout";

const TOKEN_PATH: &str = "/oauth/oauth2/token";

/// Shared mutable state behind the mock provider's endpoints.
#[derive(Default)]
pub struct ProviderState {
    /// Scripted (status, body) token responses, consumed front-to-back.
    /// When empty, the endpoint answers 200 with fresh rotating tokens.
    pub token_responses: Mutex<VecDeque<(u16, Value)>>,
    /// Every form body the token endpoint received, in order.
    pub token_requests: Mutex<Vec<HashMap<String, String>>>,
    /// Response bodies keyed by (path, nextToken query param).
    /// Missing keys answer an empty page.
    pub pages: Mutex<HashMap<(String, Option<String>), Value>>,
    /// Every (path, query params) pair a resource endpoint received.
    pub resource_requests: Mutex<Vec<(String, HashMap<String, String>)>>,
    /// When true, the next resource request is answered with 401 once.
    pub unauthorized_once: Mutex<bool>,
    /// One-shot (path, status, body) failure injection for a resource path.
    pub fail_once: Mutex<Option<(String, u16, String)>>,
}

/// Mock WHOOP API + OAuth provider on an ephemeral loopback port.
pub struct MockProvider {
    pub base_url: String,
    pub state: Arc<ProviderState>,
}

impl MockProvider {
    pub async fn spawn() -> Self {
        let state = Arc::new(ProviderState::default());
        let router = Router::new()
            .route(TOKEN_PATH, post(token_endpoint))
            .route(PROFILE_PATH, get(resource_endpoint))
            .route(BODY_PATH, get(resource_endpoint))
            .route(CYCLE_PATH, get(resource_endpoint))
            .route(RECOVERY_PATH, get(resource_endpoint))
            .route(SLEEP_PATH, get(resource_endpoint))
            .route(WORKOUT_PATH, get(resource_endpoint))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    /// Queue a scripted token endpoint response.
    pub fn script_token_response(&self, status: u16, body: Value) {
        self.state
            .token_responses
            .lock()
            .unwrap()
            .push_back((status, body));
    }

    /// Register the body served for `path` when `next_token` matches the
    /// request's `nextToken` param (None = first page).
    pub fn insert_page(&self, path: &str, next_token: Option<&str>, body: Value) {
        self.state
            .pages
            .lock()
            .unwrap()
            .insert((path.to_owned(), next_token.map(str::to_owned)), body);
    }

    pub fn set_unauthorized_once(&self) {
        *self.state.unauthorized_once.lock().unwrap() = true;
    }

    pub fn fail_path_once(&self, path: &str, status: u16, body: &str) {
        *self.state.fail_once.lock().unwrap() = Some((path.to_owned(), status, body.to_owned()));
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.state.token_requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, path: &str) -> Vec<HashMap<String, String>> {
        self.state
            .resource_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn clear_recorded_requests(&self) {
        self.state.resource_requests.lock().unwrap().clear();
        self.state.token_requests.lock().unwrap().clear();
    }
}

async fn token_endpoint(
    State(state): State<Arc<ProviderState>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let request_number = {
        let mut requests = state.token_requests.lock().unwrap();
        requests.push(form);
        requests.len()
    };

    let scripted = state.token_responses.lock().unwrap().pop_front();
    let (status, body) = scripted.unwrap_or_else(|| {
        (
            200,
            json!({
                "access_token": format!("access-token-{request_number}"),
                "refresh_token": format!("refresh-token-{request_number}"),
                "expires_in": 3600
            }),
        )
    });
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn resource_endpoint(
    State(state): State<Arc<ProviderState>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_owned();
    state
        .resource_requests
        .lock()
        .unwrap()
        .push((path.clone(), params.clone()));

    {
        let mut unauthorized = state.unauthorized_once.lock().unwrap();
        if *unauthorized {
            *unauthorized = false;
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid_token"})),
            );
        }
    }

    {
        let mut fail = state.fail_once.lock().unwrap();
        if fail.as_ref().is_some_and(|(p, _, _)| *p == path) {
            let (_, status, body) = fail.take().unwrap();
            return (
                StatusCode::from_u16(status).unwrap(),
                Json(json!({"error": body})),
            );
        }
    }

    let key = (path, params.get("nextToken").cloned());
    let body = state
        .pages
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| json!({"records": []}));
    (StatusCode::OK, Json(body))
}

/// Config pointing every endpoint at the mock provider, with the token
/// file and database under `dir`.
pub fn test_config(provider: &MockProvider, dir: &Path) -> Config {
    Config {
        client_id: "test-client".to_owned(),
        client_secret: "test-secret".to_owned(),
        redirect_uri: "http://127.0.0.1:8080/callback".to_owned(),
        callback_host: "127.0.0.1".to_owned(),
        db_path: dir.join("whoop.db").to_string_lossy().into_owned(),
        tokens_file: dir.join("tokens.json"),
        lookback_days: 1,
        api_base_url: provider.base_url.clone(),
        auth_url: format!("{}/oauth/oauth2/auth", provider.base_url),
        token_url: provider.token_url(),
    }
}

/// Write a token file the auth flow can load.
pub fn seed_token_file(config: &Config, access: &str, refresh: &str, expires_in_secs: i64) {
    let store = TokenStore::new(&config.tokens_file);
    store
        .save(&Token {
            access_token: access.to_owned(),
            refresh_token: refresh.to_owned(),
            expires_at: Utc::now().timestamp() + expires_in_secs,
        })
        .unwrap();
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

pub fn page_json(records: &[Value], next_token: Option<&str>) -> Value {
    match next_token {
        Some(token) => json!({"records": records, "next_token": token}),
        None => json!({"records": records}),
    }
}

pub fn cycle_json(id: i64, start: &str) -> Value {
    json!({
        "id": id,
        "user_id": 7,
        "created_at": start,
        "updated_at": start,
        "start": start,
        "end": null,
        "timezone_offset": "-05:00",
        "score_state": "SCORED",
        "score": {
            "strain": 12.5,
            "kilojoule": 8000.0,
            "average_heart_rate": 70,
            "max_heart_rate": 150
        }
    })
}

pub fn recovery_json(cycle_id: i64, updated_at: &str) -> Value {
    json!({
        "cycle_id": cycle_id,
        "sleep_id": format!("sleep-{cycle_id}"),
        "user_id": 7,
        "created_at": updated_at,
        "updated_at": updated_at,
        "score_state": "SCORED",
        "score": {
            "user_calibrating": false,
            "recovery_score": 67.0,
            "resting_heart_rate": 52.0,
            "hrv_rmssd_milli": 45.5,
            "spo2_percentage": 96.4,
            "skin_temp_celsius": 33.1
        }
    })
}

pub fn sleep_json(id: &str, start: &str) -> Value {
    json!({
        "id": id,
        "cycle_id": 1,
        "user_id": 7,
        "created_at": start,
        "updated_at": start,
        "start": start,
        "end": start,
        "timezone_offset": "-05:00",
        "nap": false,
        "score_state": "SCORED",
        "score": {
            "stage_summary": {
                "total_in_bed_time_milli": 28_800_000,
                "total_awake_time_milli": 1_200_000,
                "total_light_sleep_time_milli": 14_000_000,
                "total_slow_wave_sleep_time_milli": 6_000_000,
                "total_rem_sleep_time_milli": 7_600_000,
                "sleep_cycle_count": 5,
                "disturbance_count": 8
            },
            "respiratory_rate": 14.8,
            "sleep_performance_percentage": 88.0,
            "sleep_consistency_percentage": 74.0,
            "sleep_efficiency_percentage": 92.0
        }
    })
}

pub fn workout_json(id: &str, start: &str) -> Value {
    json!({
        "id": id,
        "user_id": 7,
        "created_at": start,
        "updated_at": start,
        "start": start,
        "end": start,
        "timezone_offset": "-05:00",
        "sport_name": "running",
        "sport_id": 0,
        "score_state": "SCORED",
        "score": {
            "strain": 10.2,
            "average_heart_rate": 140,
            "max_heart_rate": 175,
            "kilojoule": 2500.0,
            "percent_recorded": 100.0,
            "distance_meter": 8000.0,
            "altitude_gain_meter": 120.0,
            "altitude_change_meter": 5.0,
            "zone_durations": {
                "zone_zero_milli": 60_000,
                "zone_one_milli": 300_000,
                "zone_two_milli": 900_000,
                "zone_three_milli": 1_200_000,
                "zone_four_milli": 600_000,
                "zone_five_milli": 120_000
            }
        }
    })
}

pub fn profile_json() -> Value {
    json!({
        "user_id": 7,
        "email": "user@example.com",
        "first_name": "Ada",
        "last_name": "Lovelace"
    })
}

pub fn body_json() -> Value {
    json!({
        "height_meter": 1.75,
        "weight_kilogram": 70.5,
        "max_heart_rate": 192
    })
}
