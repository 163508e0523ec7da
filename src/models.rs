// ABOUTME: Typed WHOOP v2 API record structures for cycles, recovery, sleep, and workouts
// ABOUTME: Nested score/stage/zone blocks are optional so unscored records deserialize cleanly
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data models for the WHOOP v2 developer API.
//!
//! Every collection record carries a `score_state` and an optional nested
//! `score` block. A record whose metrics have not finished computing
//! upstream (`PENDING_SCORE` / `UNSCORABLE`) arrives without the block;
//! that is a valid typed case, never a deserialization error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a record's derived metrics have finished computing upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreState {
    /// Metrics are final
    Scored,
    /// Metrics are still being computed; score fields absent
    PendingScore,
    /// The record can never be scored; score fields absent
    Unscorable,
}

impl ScoreState {
    /// Wire representation, also used as the stored TEXT value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scored => "SCORED",
            Self::PendingScore => "PENDING_SCORE",
            Self::Unscorable => "UNSCORABLE",
        }
    }
}

/// One page of a paginated collection response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Records in this page; may be empty on the final page
    #[serde(default)]
    pub records: Vec<T>,
    /// Opaque continuation cursor; absent on the final page
    #[serde(default)]
    pub next_token: Option<String>,
}

/// A physiological day-boundary record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    /// Remote numeric ID (primary key)
    pub id: i64,
    /// Owning WHOOP user
    pub user_id: i64,
    /// When the record was created upstream
    pub created_at: DateTime<Utc>,
    /// When the record was last modified upstream
    pub updated_at: DateTime<Utc>,
    /// Cycle start
    pub start: DateTime<Utc>,
    /// Cycle end; null while the cycle is ongoing
    pub end: Option<DateTime<Utc>>,
    /// User's timezone offset at record time (e.g. `-05:00`)
    pub timezone_offset: Option<String>,
    /// Scoring status
    pub score_state: ScoreState,
    /// Strain metrics; present only when scored
    pub score: Option<CycleScore>,
}

/// Strain metrics for a scored cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleScore {
    /// Cumulative cardiovascular load (0-21 scale)
    pub strain: Option<f64>,
    /// Energy expenditure in kilojoules
    pub kilojoule: Option<f64>,
    /// Average heart rate over the cycle
    pub average_heart_rate: Option<i64>,
    /// Maximum heart rate over the cycle
    pub max_heart_rate: Option<i64>,
}

/// Next-morning readiness record, one-to-one with a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recovery {
    /// Owning cycle ID (primary key; at most one recovery per cycle)
    pub cycle_id: i64,
    /// Sleep the recovery was computed from
    pub sleep_id: String,
    /// Owning WHOOP user
    pub user_id: i64,
    /// When the record was created upstream
    pub created_at: DateTime<Utc>,
    /// When the record was last modified upstream; recoveries mutate after
    /// the cycle closes, so this drives the recovery watermark
    pub updated_at: DateTime<Utc>,
    /// Scoring status
    pub score_state: ScoreState,
    /// Readiness metrics; present only when scored
    pub score: Option<RecoveryScore>,
}

/// Readiness metrics for a scored recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryScore {
    /// True while WHOOP is still calibrating baselines for the user
    pub user_calibrating: Option<bool>,
    /// Recovery percentage (0-100)
    pub recovery_score: Option<f64>,
    /// Resting heart rate in bpm
    pub resting_heart_rate: Option<f64>,
    /// Heart-rate variability (RMSSD) in milliseconds
    pub hrv_rmssd_milli: Option<f64>,
    /// Blood oxygen saturation percentage
    pub spo2_percentage: Option<f64>,
    /// Skin temperature in Celsius
    pub skin_temp_celsius: Option<f64>,
}

/// A sleep activity; naps need not belong to a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sleep {
    /// Opaque remote ID (primary key)
    pub id: String,
    /// Owning cycle, if any
    pub cycle_id: Option<i64>,
    /// Owning WHOOP user
    pub user_id: i64,
    /// When the record was created upstream
    pub created_at: DateTime<Utc>,
    /// When the record was last modified upstream
    pub updated_at: DateTime<Utc>,
    /// Sleep start
    pub start: DateTime<Utc>,
    /// Sleep end; null while ongoing
    pub end: Option<DateTime<Utc>>,
    /// User's timezone offset at record time
    pub timezone_offset: Option<String>,
    /// True for naps
    #[serde(default)]
    pub nap: bool,
    /// Scoring status
    pub score_state: ScoreState,
    /// Sleep metrics; present only when scored
    pub score: Option<SleepScore>,
}

/// Sleep metrics for a scored sleep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleepScore {
    /// Per-stage duration breakdown
    pub stage_summary: Option<SleepStageSummary>,
    /// Respiratory rate in breaths per minute
    pub respiratory_rate: Option<f64>,
    /// Sleep performance percentage
    pub sleep_performance_percentage: Option<f64>,
    /// Sleep consistency percentage
    pub sleep_consistency_percentage: Option<f64>,
    /// Sleep efficiency percentage
    pub sleep_efficiency_percentage: Option<f64>,
}

/// Stage-duration breakdown of a sleep, all durations in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleepStageSummary {
    /// Total time in bed
    pub total_in_bed_time_milli: Option<i64>,
    /// Time awake
    pub total_awake_time_milli: Option<i64>,
    /// Light sleep time
    pub total_light_sleep_time_milli: Option<i64>,
    /// Slow-wave (deep) sleep time
    pub total_slow_wave_sleep_time_milli: Option<i64>,
    /// REM sleep time
    pub total_rem_sleep_time_milli: Option<i64>,
    /// Number of completed sleep cycles
    pub sleep_cycle_count: Option<i64>,
    /// Number of disturbances
    pub disturbance_count: Option<i64>,
}

/// A workout activity with sport classification and zone breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    /// Opaque remote ID (primary key)
    pub id: String,
    /// Owning WHOOP user
    pub user_id: i64,
    /// When the record was created upstream
    pub created_at: DateTime<Utc>,
    /// When the record was last modified upstream
    pub updated_at: DateTime<Utc>,
    /// Workout start
    pub start: DateTime<Utc>,
    /// Workout end; null while ongoing
    pub end: Option<DateTime<Utc>>,
    /// User's timezone offset at record time
    pub timezone_offset: Option<String>,
    /// Sport name (e.g. "running")
    pub sport_name: Option<String>,
    /// Numeric sport classification
    pub sport_id: Option<i64>,
    /// Scoring status
    pub score_state: ScoreState,
    /// Workout metrics; present only when scored
    pub score: Option<WorkoutScore>,
}

/// Workout metrics for a scored workout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkoutScore {
    /// Cardiovascular load for the workout
    pub strain: Option<f64>,
    /// Average heart rate in bpm
    pub average_heart_rate: Option<i64>,
    /// Maximum heart rate in bpm
    pub max_heart_rate: Option<i64>,
    /// Energy expenditure in kilojoules
    pub kilojoule: Option<f64>,
    /// Percentage of the workout with heart-rate data recorded
    pub percent_recorded: Option<f64>,
    /// Distance covered in meters
    pub distance_meter: Option<f64>,
    /// Altitude gained in meters
    pub altitude_gain_meter: Option<f64>,
    /// Net altitude change in meters
    pub altitude_change_meter: Option<f64>,
    /// Six-bucket heart-rate-zone duration breakdown
    pub zone_durations: Option<ZoneDurations>,
}

/// Time spent in each heart-rate zone, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneDurations {
    /// Zone 0 (below 50% max HR)
    pub zone_zero_milli: Option<i64>,
    /// Zone 1
    pub zone_one_milli: Option<i64>,
    /// Zone 2
    pub zone_two_milli: Option<i64>,
    /// Zone 3
    pub zone_three_milli: Option<i64>,
    /// Zone 4
    pub zone_four_milli: Option<i64>,
    /// Zone 5 (above 90% max HR)
    pub zone_five_milli: Option<i64>,
}

/// Basic profile for the authenticated user. Singleton; upsert replaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// WHOOP user ID (primary key)
    pub user_id: i64,
    /// Account email
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
}

/// Body measurement reference data. Singleton; no history retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyMeasurement {
    /// Height in meters
    pub height_meter: Option<f64>,
    /// Weight in kilograms
    pub weight_kilogram: Option<f64>,
    /// Physiological maximum heart rate
    pub max_heart_rate: Option<i64>,
}
