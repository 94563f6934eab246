//! Caller-facing workout resolution entry points

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::program;
use crate::models::workout::Workout;
use crate::resolve::resolve_day;
use crate::state;

/// Resolve today's workout from the athlete's live program position.
pub async fn get_current_workout(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Workout, EngineError> {
    let state = state::get_state(pool, user_id)
        .await?
        .ok_or(EngineError::NotEnrolled)?;
    let prog = program::get_program(pool, state.program_id).await?;
    let day = program::day_for(pool, prog.id, state.current_week, state.day_index).await?;

    resolve_day(pool, user_id, &prog, state.current_week, &day).await
}

/// Resolve an arbitrary (week, day) of the athlete's program for look-ahead.
/// The enrollment is read only to find the program; the position comes
/// entirely from the arguments and nothing is mutated.
pub async fn preview_workout(
    pool: &SqlitePool,
    user_id: Uuid,
    week_number: u32,
    day_slug: &str,
) -> Result<Workout, EngineError> {
    let state = state::get_state(pool, user_id)
        .await?
        .ok_or(EngineError::NotEnrolled)?;
    let prog = program::get_program(pool, state.program_id).await?;
    let day = program::day_by_slug(pool, prog.id, week_number, day_slug).await?;

    resolve_day(pool, user_id, &prog, week_number, &day).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lift::MaxKind;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_current_workout_follows_state() {
        let pool = crate::test_utils::setup_test_db().await;
        let seeded = crate::test_utils::seed_test_program(&pool).await;
        let user = Uuid::new_v4();
        crate::state::enroll(&pool, user, seeded.program.id).await.unwrap();
        crate::test_utils::seed_test_max(
            &pool, user, seeded.squat.id, MaxKind::TrainingMax, dec!(200), 10,
        )
        .await;
        crate::test_utils::seed_test_max(
            &pool, user, seeded.bench.id, MaxKind::TrainingMax, dec!(120), 10,
        )
        .await;

        let workout = get_current_workout(&pool, user).await.expect("Should resolve");
        assert_eq!(workout.week_number, 1);
        assert_eq!(workout.day_slug, "day-a");

        crate::test_utils::teardown_test_db(pool).await;
    }

    #[tokio::test]
    async fn test_current_workout_without_enrollment() {
        let pool = crate::test_utils::setup_test_db().await;
        crate::test_utils::seed_test_program(&pool).await;

        let result = get_current_workout(&pool, Uuid::new_v4()).await;
        assert!(matches!(result, Err(EngineError::NotEnrolled)));

        crate::test_utils::teardown_test_db(pool).await;
    }

    #[tokio::test]
    async fn test_preview_does_not_move_state() {
        let pool = crate::test_utils::setup_test_db().await;
        let seeded = crate::test_utils::seed_test_program(&pool).await;
        let user = Uuid::new_v4();
        crate::state::enroll(&pool, user, seeded.program.id).await.unwrap();
        crate::test_utils::seed_test_max(
            &pool, user, seeded.deadlift.id, MaxKind::TrainingMax, dec!(220), 10,
        )
        .await;

        let workout = preview_workout(&pool, user, 2, "day-b").await.expect("Should resolve");
        assert_eq!(workout.week_number, 2);
        assert_eq!(workout.day_slug, "day-b");

        let state = crate::state::get_state(&pool, user).await.unwrap().unwrap();
        assert_eq!(state.current_week, 1, "Preview must not advance the athlete");
        assert_eq!(state.day_index, 0);

        crate::test_utils::teardown_test_db(pool).await;
    }
}
