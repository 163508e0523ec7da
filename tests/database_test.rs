// ABOUTME: Integration tests for the SQLite record store
// ABOUTME: Covers upsert idempotence, partial-score tolerance, watermarks, and stats
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use whoop_sync::database::{Database, Resource};
use whoop_sync::models::{
    BodyMeasurement, Cycle, CycleScore, Recovery, RecoveryScore, ScoreState, Sleep, SleepScore,
    SleepStageSummary, UserProfile, Workout, WorkoutScore, ZoneDurations,
};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn cycle(id: i64, start: DateTime<Utc>) -> Cycle {
    Cycle {
        id,
        user_id: 7,
        created_at: start,
        updated_at: start,
        start,
        end: None,
        timezone_offset: Some("-05:00".to_owned()),
        score_state: ScoreState::Scored,
        score: Some(CycleScore {
            strain: Some(12.5),
            kilojoule: Some(8000.0),
            average_heart_rate: Some(70),
            max_heart_rate: Some(150),
        }),
    }
}

fn recovery(cycle_id: i64, updated_at: DateTime<Utc>, score: f64) -> Recovery {
    Recovery {
        cycle_id,
        sleep_id: format!("sleep-{cycle_id}"),
        user_id: 7,
        created_at: updated_at,
        updated_at,
        score_state: ScoreState::Scored,
        score: Some(RecoveryScore {
            user_calibrating: Some(false),
            recovery_score: Some(score),
            resting_heart_rate: Some(52.0),
            hrv_rmssd_milli: Some(45.5),
            spo2_percentage: Some(96.4),
            skin_temp_celsius: Some(33.1),
        }),
    }
}

fn sleep(id: &str, start: DateTime<Utc>) -> Sleep {
    Sleep {
        id: id.to_owned(),
        cycle_id: Some(1),
        user_id: 7,
        created_at: start,
        updated_at: start,
        start,
        end: Some(start + Duration::hours(8)),
        timezone_offset: Some("-05:00".to_owned()),
        nap: false,
        score_state: ScoreState::Scored,
        score: Some(SleepScore {
            stage_summary: Some(SleepStageSummary {
                total_in_bed_time_milli: Some(28_800_000),
                total_awake_time_milli: Some(1_200_000),
                total_light_sleep_time_milli: Some(14_000_000),
                total_slow_wave_sleep_time_milli: Some(6_000_000),
                total_rem_sleep_time_milli: Some(7_600_000),
                sleep_cycle_count: Some(5),
                disturbance_count: Some(8),
            }),
            respiratory_rate: Some(14.8),
            sleep_performance_percentage: Some(88.0),
            sleep_consistency_percentage: Some(74.0),
            sleep_efficiency_percentage: Some(92.0),
        }),
    }
}

fn workout(id: &str, start: DateTime<Utc>) -> Workout {
    Workout {
        id: id.to_owned(),
        user_id: 7,
        created_at: start,
        updated_at: start,
        start,
        end: Some(start + Duration::hours(1)),
        timezone_offset: Some("-05:00".to_owned()),
        sport_name: Some("running".to_owned()),
        sport_id: Some(0),
        score_state: ScoreState::Scored,
        score: Some(WorkoutScore {
            strain: Some(10.2),
            average_heart_rate: Some(140),
            max_heart_rate: Some(175),
            kilojoule: Some(2500.0),
            percent_recorded: Some(100.0),
            distance_meter: Some(8000.0),
            altitude_gain_meter: Some(120.0),
            altitude_change_meter: Some(5.0),
            zone_durations: Some(ZoneDurations {
                zone_zero_milli: Some(60_000),
                zone_one_milli: Some(300_000),
                zone_two_milli: Some(900_000),
                zone_three_milli: Some(1_200_000),
                zone_four_milli: Some(600_000),
                zone_five_milli: Some(120_000),
            }),
        }),
    }
}

#[tokio::test]
async fn upserting_the_same_cycle_twice_is_idempotent() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let record = cycle(1, at(1, 4));

    db.upsert_cycle(&record).await.unwrap();
    db.upsert_cycle(&record).await.unwrap();

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.cycles, 1);

    let strain: Option<f64> = sqlx::query_scalar("SELECT strain FROM cycles WHERE id = 1")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(strain, Some(12.5));
}

#[tokio::test]
async fn reingesting_a_cycle_overwrites_in_place() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let mut pending = cycle(1, at(1, 4));
    pending.score_state = ScoreState::PendingScore;
    pending.score = None;
    db.upsert_cycle(&pending).await.unwrap();

    // Score finalized upstream; the same ID is delivered again.
    db.upsert_cycle(&cycle(1, at(1, 4))).await.unwrap();

    assert_eq!(db.stats().await.unwrap().cycles, 1);
    let (state, strain): (String, Option<f64>) =
        sqlx::query_as("SELECT score_state, strain FROM cycles WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(state, "SCORED");
    assert_eq!(strain, Some(12.5));
}

#[tokio::test]
async fn pending_score_cycle_stores_null_score_fields() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let mut record = cycle(2, at(2, 4));
    record.score_state = ScoreState::PendingScore;
    record.score = None;
    db.upsert_cycle(&record).await.unwrap();

    let (state, strain, kilojoule, avg_hr): (String, Option<f64>, Option<f64>, Option<i64>) =
        sqlx::query_as(
            "SELECT score_state, strain, kilojoule, average_heart_rate FROM cycles WHERE id = 2",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(state, "PENDING_SCORE");
    assert_eq!(strain, None);
    assert_eq!(kilojoule, None);
    assert_eq!(avg_hr, None);
}

#[tokio::test]
async fn recovery_is_one_to_one_with_its_cycle() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    db.upsert_recovery(&recovery(1, at(1, 8), 50.0)).await.unwrap();
    // Re-delivery for the same cycle: last write wins, still one row.
    db.upsert_recovery(&recovery(1, at(1, 12), 67.0)).await.unwrap();

    assert_eq!(db.stats().await.unwrap().recoveries, 1);
    let score: Option<f64> =
        sqlx::query_scalar("SELECT recovery_score FROM recoveries WHERE cycle_id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(score, Some(67.0));
}

#[tokio::test]
async fn sleep_stage_summary_flattens_into_columns() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.upsert_sleep(&sleep("sleep-1", at(1, 22))).await.unwrap();

    let (rem, cycles): (Option<i64>, Option<i64>) = sqlx::query_as(
        "SELECT total_rem_sleep_time_milli, sleep_cycle_count FROM sleeps WHERE id = 'sleep-1'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(rem, Some(7_600_000));
    assert_eq!(cycles, Some(5));
}

#[tokio::test]
async fn sleep_without_stage_summary_stores_nulls() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let mut nap = sleep("nap-1", at(1, 13));
    nap.nap = true;
    nap.cycle_id = None;
    nap.score = Some(SleepScore {
        stage_summary: None,
        respiratory_rate: Some(15.0),
        ..SleepScore::default()
    });
    db.upsert_sleep(&nap).await.unwrap();

    let (cycle_id, in_bed, resp): (Option<i64>, Option<i64>, Option<f64>) = sqlx::query_as(
        "SELECT cycle_id, total_in_bed_time_milli, respiratory_rate FROM sleeps WHERE id = 'nap-1'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(cycle_id, None);
    assert_eq!(in_bed, None);
    assert_eq!(resp, Some(15.0));
}

#[tokio::test]
async fn workout_zone_durations_flatten_into_columns() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.upsert_workout(&workout("workout-1", at(3, 17))).await.unwrap();

    let (zone_two, distance): (Option<i64>, Option<f64>) = sqlx::query_as(
        "SELECT zone_two_milli, distance_meter FROM workouts WHERE id = 'workout-1'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(zone_two, Some(900_000));
    assert_eq!(distance, Some(8000.0));
}

#[tokio::test]
async fn watermark_is_the_maximum_start() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    assert_eq!(db.latest_date(Resource::Cycles).await.unwrap(), None);

    // Out-of-order delivery still yields the maximum.
    db.upsert_cycle(&cycle(2, at(2, 4))).await.unwrap();
    db.upsert_cycle(&cycle(3, at(3, 4))).await.unwrap();
    db.upsert_cycle(&cycle(1, at(1, 4))).await.unwrap();

    assert_eq!(db.latest_date(Resource::Cycles).await.unwrap(), Some(at(3, 4)));
}

#[tokio::test]
async fn recovery_watermark_uses_updated_at() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let mut early = recovery(1, at(1, 8), 50.0);
    early.created_at = at(1, 6);
    db.upsert_recovery(&early).await.unwrap();
    db.upsert_recovery(&recovery(2, at(2, 8), 60.0)).await.unwrap();

    // Recovery 1 mutates after its cycle closed.
    db.upsert_recovery(&recovery(1, at(5, 8), 70.0)).await.unwrap();

    assert_eq!(
        db.latest_date(Resource::Recoveries).await.unwrap(),
        Some(at(5, 8))
    );
}

#[tokio::test]
async fn profile_and_body_measurement_are_singletons() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let profile = UserProfile {
        user_id: 7,
        email: "user@example.com".to_owned(),
        first_name: "Ada".to_owned(),
        last_name: "Lovelace".to_owned(),
    };
    db.upsert_profile(&profile).await.unwrap();
    let mut renamed = profile.clone();
    renamed.email = "new@example.com".to_owned();
    db.upsert_profile(&renamed).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_profile")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
    let email: String = sqlx::query_scalar("SELECT email FROM user_profile WHERE user_id = 7")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(email, "new@example.com");

    let measurement = BodyMeasurement {
        height_meter: Some(1.75),
        weight_kilogram: Some(70.5),
        max_heart_rate: Some(192),
    };
    db.upsert_body_measurement(&measurement).await.unwrap();
    db.upsert_body_measurement(&measurement).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM body_measurement")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn stats_report_per_table_counts() {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    db.upsert_cycle(&cycle(1, at(1, 4))).await.unwrap();
    db.upsert_cycle(&cycle(2, at(2, 4))).await.unwrap();
    db.upsert_recovery(&recovery(1, at(1, 8), 67.0)).await.unwrap();
    db.upsert_sleep(&sleep("sleep-1", at(1, 22))).await.unwrap();

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.recoveries, 1);
    assert_eq!(stats.sleeps, 1);
    assert_eq!(stats.workouts, 0);
    assert_eq!(
        stats.as_pairs(),
        [("cycles", 2), ("recoveries", 1), ("sleeps", 1), ("workouts", 0)]
    );
}
