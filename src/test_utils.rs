//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seeded lifts, maxes, programs and progressions
//! - Time helpers

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::lift::{self, Lift, MaxKind, NewLift};
use crate::models::program::{
  self, LoadStrategy, NewDaySlot, NewPrescription, NewProgram, PercentSource, Program,
  SetScheme,
};
use crate::progression::{self, NewProgression, Progression, ProgressionRule, Trigger};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// Seed Helpers
/// ---------------------------------------------------------------------------

/// Seed one lift; the slug doubles as the display name.
pub async fn seed_test_lift(pool: &SqlitePool, slug: &str) -> Lift {
  lift::create_lift(
    pool,
    &NewLift {
      name: slug.to_string(),
      slug: slug.to_string(),
      is_competition_lift: matches!(slug, "squat" | "bench" | "deadlift"),
    },
  )
  .await
  .expect("Failed to seed lift")
}

/// Seed a reference max effective `days_ago` days in the past.
pub async fn seed_test_max(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
  kind: MaxKind,
  value: Decimal,
  days_ago: i64,
) {
  lift::record_max(pool, user_id, lift_id, kind, value, datetime_days_ago(days_ago))
    .await
    .expect("Failed to seed max");
}

/// A small seeded program: two weeks of two days.
///
/// day-a: squat 75% of training max 5x5, bench 70% of training max 3x5+
/// day-b: deadlift top single-ish at 90%, then a backoff slot at 80% of the
///        top weight (exercising RelativeTo)
pub struct SeededProgram {
  pub program: Program,
  pub squat: Lift,
  pub bench: Lift,
  pub deadlift: Lift,
}

pub async fn seed_test_program(pool: &SqlitePool) -> SeededProgram {
  let squat = seed_test_lift(pool, "squat").await;
  let bench = seed_test_lift(pool, "bench").await;
  let deadlift = seed_test_lift(pool, "deadlift").await;

  let squat_work = program::create_prescription(
    pool,
    &NewPrescription {
      lift_id: squat.id,
      load_strategy: LoadStrategy::PercentOf {
        reference: MaxKind::TrainingMax,
        percentage: PercentSource::Literal { value: dec!(0.75) },
      },
      set_scheme: SetScheme::Fixed { sets: 5, reps: 5 },
      notes: None,
      rest_seconds: Some(180),
    },
  )
  .await
  .expect("Failed to seed prescription");

  let bench_work = program::create_prescription(
    pool,
    &NewPrescription {
      lift_id: bench.id,
      load_strategy: LoadStrategy::PercentOf {
        reference: MaxKind::TrainingMax,
        percentage: PercentSource::Literal { value: dec!(0.7) },
      },
      set_scheme: SetScheme::Amrap { sets: 3, min_reps: 5 },
      notes: Some("pause the last rep".to_string()),
      rest_seconds: Some(120),
    },
  )
  .await
  .expect("Failed to seed prescription");

  let deadlift_top = program::create_prescription(
    pool,
    &NewPrescription {
      lift_id: deadlift.id,
      load_strategy: LoadStrategy::PercentOf {
        reference: MaxKind::TrainingMax,
        percentage: PercentSource::Literal { value: dec!(0.9) },
      },
      set_scheme: SetScheme::Fixed { sets: 1, reps: 3 },
      notes: None,
      rest_seconds: Some(240),
    },
  )
  .await
  .expect("Failed to seed prescription");

  let deadlift_backoff = program::create_prescription(
    pool,
    &NewPrescription {
      lift_id: deadlift.id,
      load_strategy: LoadStrategy::RelativeTo {
        source_slot: "top".to_string(),
        percentage: dec!(0.8),
      },
      set_scheme: SetScheme::Fixed { sets: 3, reps: 5 },
      notes: None,
      rest_seconds: Some(180),
    },
  )
  .await
  .expect("Failed to seed prescription");

  let day_a = program::create_day(
    pool,
    "day-a",
    "Day A",
    &[
      NewDaySlot { slot_ref: "squat".to_string(), prescription_id: squat_work.id },
      NewDaySlot { slot_ref: "bench".to_string(), prescription_id: bench_work.id },
    ],
  )
  .await
  .expect("Failed to seed day");

  let day_b = program::create_day(
    pool,
    "day-b",
    "Day B",
    &[
      NewDaySlot { slot_ref: "top".to_string(), prescription_id: deadlift_top.id },
      NewDaySlot { slot_ref: "backoff".to_string(), prescription_id: deadlift_backoff.id },
    ],
  )
  .await
  .expect("Failed to seed day");

  let prog = program::create_program(
    pool,
    &NewProgram {
      name: "Test Block".to_string(),
      slug: "test-block".to_string(),
      weeks_per_cycle: 2,
      rounding_increment: dec!(2.5),
      weekly_lookup_id: None,
      daily_lookup_id: None,
    },
  )
  .await
  .expect("Failed to seed program");

  for week in 1..=2 {
    program::assign_day(pool, prog.id, week, 0, day_a.id)
      .await
      .expect("Failed to assign day");
    program::assign_day(pool, prog.id, week, 1, day_b.id)
      .await
      .expect("Failed to assign day");
  }

  SeededProgram { program: prog, squat, bench, deadlift }
}

/// A one-day program whose squat percentage comes from a weekly lookup:
/// week 1 waves to 85%, week 2 to 90%.
pub struct SeededWaveProgram {
  pub program: Program,
  pub squat: Lift,
}

pub async fn seed_test_wave_program(pool: &SqlitePool) -> SeededWaveProgram {
  let squat = seed_test_lift(pool, "squat").await;

  let lookup_id = crate::lookup::create_weekly_lookup(
    pool,
    "two-week wave",
    &[
      (1, vec![dec!(0.65), dec!(0.75), dec!(0.85)]),
      (2, vec![dec!(0.70), dec!(0.80), dec!(0.90)]),
    ],
  )
  .await
  .expect("Failed to seed weekly lookup");

  let wave_work = program::create_prescription(
    pool,
    &NewPrescription {
      lift_id: squat.id,
      load_strategy: LoadStrategy::PercentOf {
        reference: MaxKind::TrainingMax,
        percentage: PercentSource::WeeklyLookup,
      },
      set_scheme: SetScheme::Fixed { sets: 3, reps: 5 },
      notes: None,
      rest_seconds: Some(180),
    },
  )
  .await
  .expect("Failed to seed prescription");

  let day = program::create_day(
    pool,
    "wave",
    "Wave Day",
    &[NewDaySlot { slot_ref: "squat".to_string(), prescription_id: wave_work.id }],
  )
  .await
  .expect("Failed to seed day");

  let prog = program::create_program(
    pool,
    &NewProgram {
      name: "Wave Block".to_string(),
      slug: "wave-block".to_string(),
      weeks_per_cycle: 2,
      rounding_increment: dec!(2.5),
      weekly_lookup_id: Some(lookup_id),
      daily_lookup_id: None,
    },
  )
  .await
  .expect("Failed to seed program");

  for week in 1..=2 {
    program::assign_day(pool, prog.id, week, 0, day.id)
      .await
      .expect("Failed to assign day");
  }

  SeededWaveProgram { program: prog, squat }
}

/// A weekly linear progression (+2.5 on the training max) targeting the
/// given lifts.
pub async fn seed_test_linear_progression(
  pool: &SqlitePool,
  program_id: Uuid,
  targets: &[Uuid],
) -> Progression {
  let prog = progression::create_progression(
    pool,
    &NewProgression {
      program_id,
      name: "weekly linear".to_string(),
      rule: ProgressionRule::Linear { increment: dec!(2.5), frequency: 1 },
      trigger: Trigger::AfterWeek,
      target_kind: MaxKind::TrainingMax,
    },
  )
  .await
  .expect("Failed to seed progression");

  for lift_id in targets {
    progression::add_target(pool, prog.id, *lift_id)
      .await
      .expect("Failed to seed progression target");
  }

  prog
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

/// Create a DateTime N days ago from now
pub fn datetime_days_ago(days: i64) -> DateTime<Utc> {
  Utc::now() - Duration::days(days)
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('lifts', 'lift_maxes', 'programs', 'progression_history')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert!(tables.len() >= 4, "Expected at least 4 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_program_is_resolvable_shape() {
    let pool = setup_test_db().await;
    let seeded = seed_test_program(&pool).await;

    let shape = program::program_shape(&pool, &seeded.program)
      .await
      .expect("Failed to load shape");
    assert_eq!(shape.weeks_per_cycle, 2);
    assert_eq!(shape.days_per_week, vec![2, 2]);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_datetime_helper_produces_past_dates() {
    let past = datetime_days_ago(7);
    let diff = Utc::now() - past;
    assert!(diff.num_days() >= 6 && diff.num_days() <= 8,
            "Expected ~7 days difference, got {}", diff.num_days());
  }
}
