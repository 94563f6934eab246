//! Caller-facing enrollment and state entry points

use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::program;
use crate::state::{self, AdvanceKind, UserProgramState};

/// Result of an enrollment. `replaced` flags the destructive case: the user
/// was already enrolled and their old position was reset.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollOutcome {
    pub state: UserProgramState,
    pub replaced: bool,
}

/// Enroll the user in a program at week 1, day 0, iteration 1. Re-enrolling
/// (in any program, including the current one) replaces the old state.
pub async fn enroll(
    pool: &SqlitePool,
    user_id: Uuid,
    program_id: Uuid,
) -> Result<EnrollOutcome, EngineError> {
    // Fail before touching state if the program does not exist
    program::get_program(pool, program_id).await?;
    let (state, replaced) = state::enroll(pool, user_id, program_id).await?;
    Ok(EnrollOutcome { state, replaced })
}

/// Delete the user's enrollment and position.
pub async fn unenroll(pool: &SqlitePool, user_id: Uuid) -> Result<(), EngineError> {
    if !state::unenroll(pool, user_id).await? {
        return Err(EngineError::NotEnrolled);
    }
    tracing::info!(user = %user_id, "unenrolled");
    Ok(())
}

/// Advance the athlete a day (wrapping weeks and cycles) or jump to the
/// next week, forfeiting the rest of the current one.
pub async fn advance_state(
    pool: &SqlitePool,
    user_id: Uuid,
    kind: AdvanceKind,
) -> Result<UserProgramState, EngineError> {
    let current = state::get_state(pool, user_id)
        .await?
        .ok_or(EngineError::NotEnrolled)?;
    let prog = program::get_program(pool, current.program_id).await?;
    let shape = program::program_shape(pool, &prog).await?;

    let next = state::advance(&current, &shape, kind)?;
    state::save_state(pool, &next).await?;

    tracing::debug!(
        user = %user_id,
        week = next.current_week,
        day = next.day_index,
        iteration = next.cycle_iteration,
        "state advanced"
    );
    Ok(next)
}
