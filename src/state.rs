//! Program state machine
//!
//! One row per user tracking where they are in their program: week, day
//! index, cycle iteration. `advance` is the only mutator; enrollment
//! replaces the row wholesale and unenrollment deletes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::program::ProgramShape;
use crate::models::{parse_timestamp, parse_uuid};

// ---------------------------------------------------------------------------
/// Enrollment Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Mid-cycle, mid-week
    #[default]
    Active,
    /// Momentary week-rollover state; an advance that wraps a week lands
    /// back on Active in the same step
    BetweenWeeks,
    /// Finished a cycle; the next advance returns to Active
    BetweenCycles,
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::BetweenWeeks => write!(f, "between_weeks"),
            Self::BetweenCycles => write!(f, "between_cycles"),
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "between_weeks" => Ok(Self::BetweenWeeks),
            "between_cycles" => Ok(Self::BetweenCycles),
            _ => Err(format!("Unknown enrollment status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
/// User Program State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgramState {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub current_week: u32,
    pub day_index: u32,
    pub cycle_iteration: u32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgramState {
    /// Fresh state at the top of a program.
    pub fn initial(user_id: Uuid, program_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            program_id,
            current_week: 1,
            day_index: 0,
            cycle_iteration: 1,
            status: EnrollmentStatus::Active,
            enrolled_at: now,
            updated_at: now,
        }
    }

    /// Absolute week ordinal across cycle iterations, 1-based. Week 2 of
    /// iteration 3 on a 4-week cycle is ordinal 10.
    pub fn week_ordinal(&self, weeks_per_cycle: u32) -> u32 {
        (self.cycle_iteration.saturating_sub(1)) * weeks_per_cycle + self.current_week
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceKind {
    /// Next day, wrapping into the next week when this week is done
    Day,
    /// Jump to day 0 of the next week, forfeiting the rest of this week
    Week,
}

// ---------------------------------------------------------------------------
/// Advance: the only mutator
// ---------------------------------------------------------------------------

pub fn advance(
    state: &UserProgramState,
    shape: &ProgramShape,
    kind: AdvanceKind,
) -> Result<UserProgramState, EngineError> {
    let days_this_week = shape.days_in(state.current_week);
    if days_this_week == 0 {
        return Err(EngineError::InvalidAdvance(format!(
            "week {} has no days",
            state.current_week
        )));
    }

    let mut next = state.clone();
    next.updated_at = Utc::now();

    match kind {
        AdvanceKind::Day if state.day_index + 1 < days_this_week => {
            next.day_index += 1;
            next.status = EnrollmentStatus::Active;
            return Ok(next);
        }
        // Exhausted the week (or explicitly forfeiting it): roll forward
        AdvanceKind::Day | AdvanceKind::Week => {}
    }

    next.day_index = 0;
    if state.current_week < shape.weeks_per_cycle {
        next.current_week += 1;
        next.status = EnrollmentStatus::Active;
    } else {
        next.current_week = 1;
        next.cycle_iteration += 1;
        next.status = EnrollmentStatus::BetweenCycles;
    }

    if shape.days_in(next.current_week) == 0 {
        return Err(EngineError::InvalidAdvance(format!(
            "week {} has no days",
            next.current_week
        )));
    }

    Ok(next)
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

fn row_to_state(row: &sqlx::sqlite::SqliteRow) -> Result<UserProgramState, EngineError> {
    let user_id: String = row.get("user_id");
    let program_id: String = row.get("program_id");
    let current_week: i64 = row.get("current_week");
    let day_index: i64 = row.get("day_index");
    let cycle_iteration: i64 = row.get("cycle_iteration");
    let status: String = row.get("status");
    let enrolled_at: String = row.get("enrolled_at");
    let updated_at: String = row.get("updated_at");
    Ok(UserProgramState {
        user_id: parse_uuid(&user_id)?,
        program_id: parse_uuid(&program_id)?,
        current_week: current_week as u32,
        day_index: day_index as u32,
        cycle_iteration: cycle_iteration as u32,
        status: status.parse().map_err(EngineError::Decode)?,
        enrolled_at: parse_timestamp(&enrolled_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub async fn get_state(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Option<UserProgramState>, EngineError> {
    let row = sqlx::query("SELECT * FROM user_program_state WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_state).transpose()
}

pub async fn save_state(pool: &SqlitePool, state: &UserProgramState) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        UPDATE user_program_state
        SET program_id = ?,
            current_week = ?,
            day_index = ?,
            cycle_iteration = ?,
            status = ?,
            updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(state.program_id.to_string())
    .bind(state.current_week as i64)
    .bind(state.day_index as i64)
    .bind(state.cycle_iteration as i64)
    .bind(state.status.to_string())
    .bind(state.updated_at.to_rfc3339())
    .bind(state.user_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Create or replace the user's enrollment. Returns the fresh state and
/// whether an existing enrollment was destroyed -- callers must surface
/// that, a re-enrollment silently resetting progress is not acceptable.
pub async fn enroll(
    pool: &SqlitePool,
    user_id: Uuid,
    program_id: Uuid,
) -> Result<(UserProgramState, bool), EngineError> {
    let replaced = get_state(pool, user_id).await?.is_some();
    let state = UserProgramState::initial(user_id, program_id);

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO user_program_state (
            user_id, program_id, current_week, day_index, cycle_iteration,
            status, enrolled_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(state.user_id.to_string())
    .bind(state.program_id.to_string())
    .bind(state.current_week as i64)
    .bind(state.day_index as i64)
    .bind(state.cycle_iteration as i64)
    .bind(state.status.to_string())
    .bind(state.enrolled_at.to_rfc3339())
    .bind(state.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    if replaced {
        tracing::warn!(user = %user_id, program = %program_id, "re-enrollment replaced existing program state");
    }

    Ok((state, replaced))
}

/// Delete the user's enrollment. Returns whether a row existed.
pub async fn unenroll(pool: &SqlitePool, user_id: Uuid) -> Result<bool, EngineError> {
    let result = sqlx::query("DELETE FROM user_program_state WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
