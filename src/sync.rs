// ABOUTME: Sync orchestrator coordinating auth, paginated fetch, and upsert persistence
// ABOUTME: Incremental resume backs the stored watermark off by a configurable lookback
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental synchronization engine.
//!
//! Resources sync sequentially: cycles, recoveries, sleeps, workouts.
//! Unless a full sync or explicit start bound is requested, each resource
//! resumes from its stored watermark backed off by the lookback window.
//! The overlap deliberately re-fetches boundary records and records whose
//! score finalized after the previous sync; upserts make the re-delivery
//! harmless.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use tracing::info;

use crate::api::{ApiClient, DateRange};
use crate::config::Config;
use crate::database::{Database, Resource};
use crate::errors::AppResult;
use crate::oauth::AuthFlow;

/// Default wait for the interactive authorization redirect.
pub const AUTHORIZE_TIMEOUT: StdDuration = StdDuration::from_secs(300);

/// Caller-supplied bounds for a sync invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Ignore watermarks and fetch from the beginning of history
    pub full: bool,
    /// Explicit start bound; used as-is when present
    pub start: Option<DateTime<Utc>>,
    /// Explicit end bound
    pub end: Option<DateTime<Utc>>,
}

/// Per-type record counters from one sync invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Cycles upserted
    pub cycles: u64,
    /// Recoveries upserted
    pub recoveries: u64,
    /// Sleeps upserted
    pub sleeps: u64,
    /// Workouts upserted
    pub workouts: u64,
}

/// Coordinates AuthFlow, ApiClient, and the record store.
pub struct SyncEngine {
    auth: Arc<AuthFlow>,
    api: ApiClient,
    db: Database,
    lookback: Duration,
}

impl SyncEngine {
    /// Assemble the engine from its already-constructed parts.
    #[must_use]
    pub fn new(config: &Config, auth: Arc<AuthFlow>, api: ApiClient, db: Database) -> Self {
        Self {
            auth,
            api,
            db,
            lookback: Duration::days(config.lookback_days),
        }
    }

    /// Record store handle, for stats queries.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Ensure a usable session: load stored tokens, or fall back to the
    /// interactive authorization flow.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` when the interactive flow times out, is
    /// denied, or the code exchange fails.
    pub async fn authenticate(&self) -> AppResult<()> {
        if self.auth.load_stored_tokens().await && self.auth.is_authenticated().await {
            info!("using stored tokens");
            return Ok(());
        }
        self.auth.authorize(AUTHORIZE_TIMEOUT).await
    }

    /// Sync the user profile (singleton upsert).
    ///
    /// # Errors
    ///
    /// Propagates auth, API, and database failures unchanged.
    pub async fn sync_profile(&self) -> AppResult<()> {
        info!("syncing profile");
        let profile = self.api.profile().await?;
        self.db.upsert_profile(&profile).await?;
        info!("  user: {} {}", profile.first_name, profile.last_name);
        Ok(())
    }

    /// Sync body measurements (singleton upsert).
    ///
    /// # Errors
    ///
    /// Propagates auth, API, and database failures unchanged.
    pub async fn sync_body_measurement(&self) -> AppResult<()> {
        info!("syncing body measurements");
        let measurement = self.api.body_measurement().await?;
        self.db.upsert_body_measurement(&measurement).await?;
        Ok(())
    }

    /// Sync cycles incrementally.
    ///
    /// # Errors
    ///
    /// Propagates auth, API, and database failures unchanged; rows already
    /// upserted are retained.
    pub async fn sync_cycles(&self, options: SyncOptions) -> AppResult<u64> {
        let range = self.resume_range(Resource::Cycles, options).await?;
        log_resume(Resource::Cycles, range.start);
        let mut count = 0;
        let mut stream = pin!(self.api.cycles(range));
        while let Some(batch) = stream.next().await {
            for cycle in batch? {
                self.db.upsert_cycle(&cycle).await?;
                count += 1;
            }
        }
        info!("  synced {count} cycles");
        Ok(count)
    }

    /// Sync recoveries incrementally (watermark on `updated_at`).
    ///
    /// # Errors
    ///
    /// Propagates auth, API, and database failures unchanged.
    pub async fn sync_recoveries(&self, options: SyncOptions) -> AppResult<u64> {
        let range = self.resume_range(Resource::Recoveries, options).await?;
        log_resume(Resource::Recoveries, range.start);
        let mut count = 0;
        let mut stream = pin!(self.api.recoveries(range));
        while let Some(batch) = stream.next().await {
            for recovery in batch? {
                self.db.upsert_recovery(&recovery).await?;
                count += 1;
            }
        }
        info!("  synced {count} recoveries");
        Ok(count)
    }

    /// Sync sleeps incrementally.
    ///
    /// # Errors
    ///
    /// Propagates auth, API, and database failures unchanged.
    pub async fn sync_sleeps(&self, options: SyncOptions) -> AppResult<u64> {
        let range = self.resume_range(Resource::Sleeps, options).await?;
        log_resume(Resource::Sleeps, range.start);
        let mut count = 0;
        let mut stream = pin!(self.api.sleeps(range));
        while let Some(batch) = stream.next().await {
            for sleep in batch? {
                self.db.upsert_sleep(&sleep).await?;
                count += 1;
            }
        }
        info!("  synced {count} sleeps");
        Ok(count)
    }

    /// Sync workouts incrementally.
    ///
    /// # Errors
    ///
    /// Propagates auth, API, and database failures unchanged.
    pub async fn sync_workouts(&self, options: SyncOptions) -> AppResult<u64> {
        let range = self.resume_range(Resource::Workouts, options).await?;
        log_resume(Resource::Workouts, range.start);
        let mut count = 0;
        let mut stream = pin!(self.api.workouts(range));
        while let Some(batch) = stream.next().await {
            for workout in batch? {
                self.db.upsert_workout(&workout).await?;
                count += 1;
            }
        }
        info!("  synced {count} workouts");
        Ok(count)
    }

    /// Sync everything: profile, body measurement, then the four
    /// paginated resources in order. Each resource syncs independently;
    /// a failure aborts the invocation but retains prior progress.
    ///
    /// # Errors
    ///
    /// Propagates the first auth, API, or database failure.
    pub async fn sync_all(&self, options: SyncOptions) -> AppResult<SyncReport> {
        self.sync_profile().await?;
        self.sync_body_measurement().await?;

        let report = SyncReport {
            cycles: self.sync_cycles(options).await?,
            recoveries: self.sync_recoveries(options).await?,
            sleeps: self.sync_sleeps(options).await?,
            workouts: self.sync_workouts(options).await?,
        };

        let stats = self.db.stats().await?;
        for (table, count) in stats.as_pairs() {
            info!("  {table}: {count} records");
        }
        Ok(report)
    }

    /// Determine the fetch range for a resource.
    ///
    /// Full sync or an explicit start bound wins as-is. Otherwise the
    /// stored watermark, backed off by the lookback window, becomes the
    /// start; an empty table leaves the start open.
    async fn resume_range(&self, resource: Resource, options: SyncOptions) -> AppResult<DateRange> {
        if options.full || options.start.is_some() {
            return Ok(DateRange {
                start: options.start,
                end: options.end,
            });
        }
        let start = self
            .db
            .latest_date(resource)
            .await?
            .map(|watermark| watermark - self.lookback);
        Ok(DateRange {
            start,
            end: options.end,
        })
    }
}

fn log_resume(resource: Resource, start: Option<DateTime<Utc>>) {
    match start {
        Some(start) => info!("syncing {resource} from {start}"),
        None => info!("syncing {resource} from beginning"),
    }
}
