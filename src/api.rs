// ABOUTME: Authenticated WHOOP v2 API client with cursor-based pagination
// ABOUTME: Bearer injection via AuthFlow, single 401 refresh-and-retry, lazy batch streams
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WHOOP developer API client.
//!
//! Collection endpoints are exposed as lazy [`Stream`]s of record batches.
//! Each page request carries a `limit` and, after the first page, the
//! `nextToken` cursor from the previous response; iteration stops when a
//! response omits the cursor. The streams are consumed by value and are
//! not restartable after exhaustion.

use std::sync::Arc;

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{BodyMeasurement, Cycle, Page, Recovery, Sleep, UserProfile, Workout};
use crate::oauth::AuthFlow;

/// Records requested per page.
pub const PAGE_LIMIT: u32 = 25;

const PROFILE_PATH: &str = "/developer/v2/user/profile/basic";
const BODY_MEASUREMENT_PATH: &str = "/developer/v2/user/measurement/body";
const CYCLES_PATH: &str = "/developer/v2/cycle";
const RECOVERIES_PATH: &str = "/developer/v2/recovery";
const SLEEPS_PATH: &str = "/developer/v2/activity/sleep";
const WORKOUTS_PATH: &str = "/developer/v2/activity/workout";

/// Optional, independent start/end bounds for collection queries.
///
/// Bounds are serialized as UTC timestamps at millisecond precision;
/// open-start, open-end, and fully bounded queries are all valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    /// Inclusive lower bound on record start
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on record start
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    fn query_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(start) = self.start {
            params.push(("start".to_owned(), format_timestamp(start)));
        }
        if let Some(end) = self.end {
            params.push(("end".to_owned(), format_timestamp(end)));
        }
        params
    }
}

/// Serialize a timestamp the way the WHOOP API expects:
/// ISO-8601 UTC with milliseconds and a literal `Z`.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Authenticated, paginated HTTP access to WHOOP resources.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthFlow>,
}

impl ApiClient {
    /// Create a client against the configured API base URL.
    #[must_use]
    pub fn new(config: &Config, auth: Arc<AuthFlow>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            auth,
        }
    }

    /// Fetch the authenticated user's basic profile.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` when no valid token can be obtained, or
    /// `AppError::Api` on a non-2xx response.
    pub async fn profile(&self) -> AppResult<UserProfile> {
        self.get_json(PROFILE_PATH, &[]).await
    }

    /// Fetch the user's body measurement reference data.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::profile`].
    pub async fn body_measurement(&self) -> AppResult<BodyMeasurement> {
        self.get_json(BODY_MEASUREMENT_PATH, &[]).await
    }

    /// Stream cycle batches within the given date range.
    pub fn cycles(&self, range: DateRange) -> impl Stream<Item = AppResult<Vec<Cycle>>> + '_ {
        self.collection(CYCLES_PATH, range)
    }

    /// Stream recovery batches within the given date range.
    pub fn recoveries(&self, range: DateRange) -> impl Stream<Item = AppResult<Vec<Recovery>>> + '_ {
        self.collection(RECOVERIES_PATH, range)
    }

    /// Stream sleep batches within the given date range.
    pub fn sleeps(&self, range: DateRange) -> impl Stream<Item = AppResult<Vec<Sleep>>> + '_ {
        self.collection(SLEEPS_PATH, range)
    }

    /// Stream workout batches within the given date range.
    pub fn workouts(&self, range: DateRange) -> impl Stream<Item = AppResult<Vec<Workout>>> + '_ {
        self.collection(WORKOUTS_PATH, range)
    }

    /// Lazily page through a collection endpoint.
    ///
    /// Yields non-empty record batches; an empty final page and a page
    /// with records but no cursor are both natural termination.
    fn collection<'a, T: DeserializeOwned + 'a>(
        &'a self,
        path: &'static str,
        range: DateRange,
    ) -> impl Stream<Item = AppResult<Vec<T>>> + 'a {
        try_stream! {
            let base_params = range.query_params();
            let mut next_token: Option<String> = None;
            loop {
                let mut query = base_params.clone();
                query.push(("limit".to_owned(), PAGE_LIMIT.to_string()));
                if let Some(ref token) = next_token {
                    query.push(("nextToken".to_owned(), token.clone()));
                }

                let page: Page<T> = self.get_json(path, &query).await?;
                debug!(path, records = page.records.len(), "fetched page");
                if !page.records.is_empty() {
                    yield page.records;
                }

                match page.next_token {
                    Some(token) if !token.is_empty() => next_token = Some(token),
                    _ => break,
                }
            }
        }
    }

    /// GET a JSON resource with a bearer header from the auth flow.
    ///
    /// On HTTP 401 despite a believed-valid token, performs exactly one
    /// refresh-and-retry (covers server-side early expiry or revocation
    /// not caught by the local expiry clock) before surfacing failure.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> AppResult<T> {
        let url = format!("{}{path}", self.base_url);
        let token = self.auth.valid_access_token().await?;

        let mut response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::network(format!("Request to {path} failed: {e}")))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "got 401 despite valid-looking token, refreshing once");
            self.auth.refresh_access_token().await?;
            let token = self.auth.valid_access_token().await?;
            response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| AppError::network(format!("Request to {path} failed: {e}")))?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::api(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::internal(format!("Failed to parse {path} response: {e}")))
    }
}
