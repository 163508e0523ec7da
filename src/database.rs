// ABOUTME: SQLite record store with idempotent natural-key upserts per resource type
// ABOUTME: Provides watermark queries and row counts for incremental sync and stats
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent persistence for synced WHOOP records.
//!
//! Every upsert is a single insert-or-update statement binding all columns
//! and committed immediately, so a crash mid-sync loses at most the
//! in-flight record and re-ingesting an ID is last-write-wins. The store
//! never deletes.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::models::{BodyMeasurement, Cycle, Recovery, Sleep, UserProfile, Workout};

/// Resource types with paginated history and a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Physiological day-boundary cycles
    Cycles,
    /// Next-morning recovery scores
    Recoveries,
    /// Sleep activities
    Sleeps,
    /// Workout activities
    Workouts,
}

impl Resource {
    /// Table name, also used for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cycles => "cycles",
            Self::Recoveries => "recoveries",
            Self::Sleeps => "sleeps",
            Self::Workouts => "workouts",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-table row counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Rows in `cycles`
    pub cycles: i64,
    /// Rows in `recoveries`
    pub recoveries: i64,
    /// Rows in `sleeps`
    pub sleeps: i64,
    /// Rows in `workouts`
    pub workouts: i64,
}

impl StoreStats {
    /// Table-name/count pairs in sync order, for display.
    #[must_use]
    pub const fn as_pairs(&self) -> [(&'static str, i64); 4] {
        [
            ("cycles", self.cycles),
            ("recoveries", self.recoveries),
            ("sleeps", self.sleeps),
            ("workouts", self.workouts),
        ]
    }
}

/// SQLite-backed record store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and run embedded migrations.
    ///
    /// File-backed `sqlite:` URLs get `?mode=rwc` appended so the database
    /// file is created on first use.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let connection_url = if database_url.starts_with("sqlite:")
            && !database_url.contains('?')
            && !database_url.contains(":memory:")
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_url)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database ready at {database_url}");
        Ok(Self { pool })
    }

    /// Underlying connection pool, exposed for tests and external readers.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a cycle by its remote numeric ID.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the write fails.
    pub async fn upsert_cycle(&self, cycle: &Cycle) -> AppResult<()> {
        let score = cycle.score.as_ref();
        sqlx::query(
            r#"
            INSERT INTO cycles (
                id, user_id, created_at, updated_at, start, "end", timezone_offset,
                score_state, strain, kilojoule, average_heart_rate, max_heart_rate
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                user_id = excluded.user_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                start = excluded.start,
                "end" = excluded."end",
                timezone_offset = excluded.timezone_offset,
                score_state = excluded.score_state,
                strain = excluded.strain,
                kilojoule = excluded.kilojoule,
                average_heart_rate = excluded.average_heart_rate,
                max_heart_rate = excluded.max_heart_rate
            "#,
        )
        .bind(cycle.id)
        .bind(cycle.user_id)
        .bind(cycle.created_at)
        .bind(cycle.updated_at)
        .bind(cycle.start)
        .bind(cycle.end)
        .bind(cycle.timezone_offset.as_deref())
        .bind(cycle.score_state.as_str())
        .bind(score.and_then(|s| s.strain))
        .bind(score.and_then(|s| s.kilojoule))
        .bind(score.and_then(|s| s.average_heart_rate))
        .bind(score.and_then(|s| s.max_heart_rate))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert cycle {}: {e}", cycle.id)))?;
        Ok(())
    }

    /// Insert or replace a recovery by its owning cycle ID (one-to-one).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the write fails.
    pub async fn upsert_recovery(&self, recovery: &Recovery) -> AppResult<()> {
        let score = recovery.score.as_ref();
        sqlx::query(
            r"
            INSERT INTO recoveries (
                cycle_id, sleep_id, user_id, created_at, updated_at, score_state,
                user_calibrating, recovery_score, resting_heart_rate, hrv_rmssd_milli,
                spo2_percentage, skin_temp_celsius
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (cycle_id) DO UPDATE SET
                sleep_id = excluded.sleep_id,
                user_id = excluded.user_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                score_state = excluded.score_state,
                user_calibrating = excluded.user_calibrating,
                recovery_score = excluded.recovery_score,
                resting_heart_rate = excluded.resting_heart_rate,
                hrv_rmssd_milli = excluded.hrv_rmssd_milli,
                spo2_percentage = excluded.spo2_percentage,
                skin_temp_celsius = excluded.skin_temp_celsius
            ",
        )
        .bind(recovery.cycle_id)
        .bind(&recovery.sleep_id)
        .bind(recovery.user_id)
        .bind(recovery.created_at)
        .bind(recovery.updated_at)
        .bind(recovery.score_state.as_str())
        .bind(score.and_then(|s| s.user_calibrating))
        .bind(score.and_then(|s| s.recovery_score))
        .bind(score.and_then(|s| s.resting_heart_rate))
        .bind(score.and_then(|s| s.hrv_rmssd_milli))
        .bind(score.and_then(|s| s.spo2_percentage))
        .bind(score.and_then(|s| s.skin_temp_celsius))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::database(format!(
                "Failed to upsert recovery for cycle {}: {e}",
                recovery.cycle_id
            ))
        })?;
        Ok(())
    }

    /// Insert or replace a sleep by its opaque remote ID.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the write fails.
    pub async fn upsert_sleep(&self, sleep: &Sleep) -> AppResult<()> {
        let score = sleep.score.as_ref();
        let stage = score.and_then(|s| s.stage_summary.as_ref());
        sqlx::query(
            r#"
            INSERT INTO sleeps (
                id, cycle_id, user_id, created_at, updated_at, start, "end",
                timezone_offset, nap, score_state, total_in_bed_time_milli,
                total_awake_time_milli, total_light_sleep_time_milli,
                total_slow_wave_sleep_time_milli, total_rem_sleep_time_milli,
                sleep_cycle_count, disturbance_count, respiratory_rate,
                sleep_performance_percentage, sleep_consistency_percentage,
                sleep_efficiency_percentage
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            ON CONFLICT (id) DO UPDATE SET
                cycle_id = excluded.cycle_id,
                user_id = excluded.user_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                start = excluded.start,
                "end" = excluded."end",
                timezone_offset = excluded.timezone_offset,
                nap = excluded.nap,
                score_state = excluded.score_state,
                total_in_bed_time_milli = excluded.total_in_bed_time_milli,
                total_awake_time_milli = excluded.total_awake_time_milli,
                total_light_sleep_time_milli = excluded.total_light_sleep_time_milli,
                total_slow_wave_sleep_time_milli = excluded.total_slow_wave_sleep_time_milli,
                total_rem_sleep_time_milli = excluded.total_rem_sleep_time_milli,
                sleep_cycle_count = excluded.sleep_cycle_count,
                disturbance_count = excluded.disturbance_count,
                respiratory_rate = excluded.respiratory_rate,
                sleep_performance_percentage = excluded.sleep_performance_percentage,
                sleep_consistency_percentage = excluded.sleep_consistency_percentage,
                sleep_efficiency_percentage = excluded.sleep_efficiency_percentage
            "#,
        )
        .bind(&sleep.id)
        .bind(sleep.cycle_id)
        .bind(sleep.user_id)
        .bind(sleep.created_at)
        .bind(sleep.updated_at)
        .bind(sleep.start)
        .bind(sleep.end)
        .bind(sleep.timezone_offset.as_deref())
        .bind(sleep.nap)
        .bind(sleep.score_state.as_str())
        .bind(stage.and_then(|s| s.total_in_bed_time_milli))
        .bind(stage.and_then(|s| s.total_awake_time_milli))
        .bind(stage.and_then(|s| s.total_light_sleep_time_milli))
        .bind(stage.and_then(|s| s.total_slow_wave_sleep_time_milli))
        .bind(stage.and_then(|s| s.total_rem_sleep_time_milli))
        .bind(stage.and_then(|s| s.sleep_cycle_count))
        .bind(stage.and_then(|s| s.disturbance_count))
        .bind(score.and_then(|s| s.respiratory_rate))
        .bind(score.and_then(|s| s.sleep_performance_percentage))
        .bind(score.and_then(|s| s.sleep_consistency_percentage))
        .bind(score.and_then(|s| s.sleep_efficiency_percentage))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert sleep {}: {e}", sleep.id)))?;
        Ok(())
    }

    /// Insert or replace a workout by its opaque remote ID.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the write fails.
    pub async fn upsert_workout(&self, workout: &Workout) -> AppResult<()> {
        let score = workout.score.as_ref();
        let zones = score.and_then(|s| s.zone_durations.as_ref());
        sqlx::query(
            r#"
            INSERT INTO workouts (
                id, user_id, created_at, updated_at, start, "end", timezone_offset,
                sport_name, sport_id, score_state, strain, average_heart_rate,
                max_heart_rate, kilojoule, percent_recorded, distance_meter,
                altitude_gain_meter, altitude_change_meter, zone_zero_milli,
                zone_one_milli, zone_two_milli, zone_three_milli, zone_four_milli,
                zone_five_milli
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ON CONFLICT (id) DO UPDATE SET
                user_id = excluded.user_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                start = excluded.start,
                "end" = excluded."end",
                timezone_offset = excluded.timezone_offset,
                sport_name = excluded.sport_name,
                sport_id = excluded.sport_id,
                score_state = excluded.score_state,
                strain = excluded.strain,
                average_heart_rate = excluded.average_heart_rate,
                max_heart_rate = excluded.max_heart_rate,
                kilojoule = excluded.kilojoule,
                percent_recorded = excluded.percent_recorded,
                distance_meter = excluded.distance_meter,
                altitude_gain_meter = excluded.altitude_gain_meter,
                altitude_change_meter = excluded.altitude_change_meter,
                zone_zero_milli = excluded.zone_zero_milli,
                zone_one_milli = excluded.zone_one_milli,
                zone_two_milli = excluded.zone_two_milli,
                zone_three_milli = excluded.zone_three_milli,
                zone_four_milli = excluded.zone_four_milli,
                zone_five_milli = excluded.zone_five_milli
            "#,
        )
        .bind(&workout.id)
        .bind(workout.user_id)
        .bind(workout.created_at)
        .bind(workout.updated_at)
        .bind(workout.start)
        .bind(workout.end)
        .bind(workout.timezone_offset.as_deref())
        .bind(workout.sport_name.as_deref())
        .bind(workout.sport_id)
        .bind(workout.score_state.as_str())
        .bind(score.and_then(|s| s.strain))
        .bind(score.and_then(|s| s.average_heart_rate))
        .bind(score.and_then(|s| s.max_heart_rate))
        .bind(score.and_then(|s| s.kilojoule))
        .bind(score.and_then(|s| s.percent_recorded))
        .bind(score.and_then(|s| s.distance_meter))
        .bind(score.and_then(|s| s.altitude_gain_meter))
        .bind(score.and_then(|s| s.altitude_change_meter))
        .bind(zones.and_then(|z| z.zone_zero_milli))
        .bind(zones.and_then(|z| z.zone_one_milli))
        .bind(zones.and_then(|z| z.zone_two_milli))
        .bind(zones.and_then(|z| z.zone_three_milli))
        .bind(zones.and_then(|z| z.zone_four_milli))
        .bind(zones.and_then(|z| z.zone_five_milli))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert workout {}: {e}", workout.id)))?;
        Ok(())
    }

    /// Insert or replace the user profile (singleton per user).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the write fails.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_profile (user_id, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name
            ",
        )
        .bind(profile.user_id)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert profile: {e}")))?;
        Ok(())
    }

    /// Insert or replace the body measurement singleton row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the write fails.
    pub async fn upsert_body_measurement(&self, measurement: &BodyMeasurement) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO body_measurement (id, height_meter, weight_kilogram, max_heart_rate, updated_at)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                height_meter = excluded.height_meter,
                weight_kilogram = excluded.weight_kilogram,
                max_heart_rate = excluded.max_heart_rate,
                updated_at = excluded.updated_at
            ",
        )
        .bind(measurement.height_meter)
        .bind(measurement.weight_kilogram)
        .bind(measurement.max_heart_rate)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert body measurement: {e}")))?;
        Ok(())
    }

    /// Watermark for incremental resume: the maximum `start` stored, or
    /// for recoveries the maximum `updated_at` since recoveries mutate
    /// after their cycle completes. `None` when the table is empty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn latest_date(&self, resource: Resource) -> AppResult<Option<DateTime<Utc>>> {
        let sql = match resource {
            Resource::Cycles => "SELECT MAX(start) FROM cycles",
            Resource::Recoveries => "SELECT MAX(updated_at) FROM recoveries",
            Resource::Sleeps => "SELECT MAX(start) FROM sleeps",
            Resource::Workouts => "SELECT MAX(start) FROM workouts",
        };
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to query {resource} watermark: {e}")))
    }

    /// Per-table row counts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a count query fails.
    pub async fn stats(&self) -> AppResult<StoreStats> {
        Ok(StoreStats {
            cycles: self.count("SELECT COUNT(*) FROM cycles").await?,
            recoveries: self.count("SELECT COUNT(*) FROM recoveries").await?,
            sleeps: self.count("SELECT COUNT(*) FROM sleeps").await?,
            workouts: self.count("SELECT COUNT(*) FROM workouts").await?,
        })
    }

    async fn count(&self, sql: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count rows: {e}")))
    }
}
